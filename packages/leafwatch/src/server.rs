//! HTTP front end: the dashboard page, the annotated MJPEG stream and the
//! sensor/status JSON endpoints.
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use leafwatch_vision::{OnnxClassifier, OnnxClassifierOptions, Region};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info, warn};

use crate::annotator::{RegionAnnotator, RegionStatus};
use crate::capture::CameraSource;
use crate::pipeline::{self, mjpeg_part, FramePacket, PipelineOptions, BOUNDARY};
use crate::sensor::{sensor_json, SensorSource, SerialSensor, SerialSensorOptions};

const INDEX_HTML: &str = include_str!("../static/index.html");
const SCRIPT_JS: &str = include_str!("../static/js/script.js");

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_CAMERA: &str = "http://192.168.18.7:8080/video";
pub const DEFAULT_REFRESH_INTERVAL: u64 = 30;

/// The two leaf positions sampled when no `--region` is given.
pub fn default_regions() -> Vec<Region> {
    vec![Region::new(250, 250, 500, 500), Region::new(1150, 250, 500, 500)]
}

pub struct ServeOptions {
    pub bind: SocketAddr,
    pub camera: CameraSource,
    pub model: OnnxClassifierOptions,
    pub regions: Vec<Region>,
    pub refresh_interval: u64,
    pub pipeline: PipelineOptions,
    pub sensor: SerialSensorOptions,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            camera: CameraSource::Mjpeg(DEFAULT_CAMERA.to_string()),
            model: OnnxClassifierOptions::default(),
            regions: default_regions(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            pipeline: PipelineOptions::default(),
            sensor: SerialSensorOptions::default(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    frames: watch::Receiver<Option<FramePacket>>,
    sensor: Arc<Mutex<Box<dyn SensorSource>>>,
    regions: Arc<[Region]>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        frames: watch::Receiver<Option<FramePacket>>,
        sensor: Box<dyn SensorSource>,
        regions: Vec<Region>,
    ) -> Self {
        Self {
            frames,
            sensor: Arc::new(Mutex::new(sensor)),
            regions: regions.into(),
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub started_at: DateTime<Utc>,
    pub frame_index: u64,
    pub regions: Vec<RegionStatus>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/static/js/script.js", get(script))
        .route("/video_feed", get(video_feed))
        .route("/sensor_data", get(sensor_data))
        .route("/status", get(status))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], SCRIPT_JS)
}

async fn video_feed(State(state): State<AppState>) -> Response {
    let parts = WatchStream::new(state.frames.clone()).filter_map(|packet| async move {
        packet.map(|packet| Ok::<_, Infallible>(mjpeg_part(&packet.jpeg)))
    });

    (
        [
            (
                header::CONTENT_TYPE,
                format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
            ),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}

async fn sensor_data(State(state): State<AppState>) -> Json<Value> {
    let result = state.sensor.lock().await.read_latest().await;
    if let Err(e) = &result {
        warn!("Sensor read failed: {e}");
    }
    Json(sensor_json(&result))
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    let latest = state.frames.borrow().clone();
    let (frame_index, regions) = match latest {
        Some(packet) => (packet.frame_index, packet.regions),
        None => (
            0,
            state
                .regions
                .iter()
                .enumerate()
                .map(|(idx, region)| RegionStatus {
                    number: idx + 1,
                    x: region.x,
                    y: region.y,
                    width: region.width,
                    height: region.height,
                    prediction: None,
                })
                .collect(),
        ),
    };

    Json(StatusReport {
        started_at: state.started_at,
        frame_index,
        regions,
    })
}

/// Loads the model, starts the frame loop and the sensor reader, then serves
/// HTTP until the process is stopped.
pub async fn serve(options: ServeOptions) -> Result<()> {
    let model_path = options.model.model_path.clone();
    let classifier = OnnxClassifier::new(options.model)
        .with_context(|| format!("Failed to load model {}", model_path.display()))?;

    let annotator = RegionAnnotator::new(
        options.regions.clone(),
        classifier,
        options.refresh_interval,
    );
    info!(
        "Sampling {} region(s) every {} frame(s) from {}",
        options.regions.len(),
        options.refresh_interval.max(1),
        options.camera
    );
    let (frames, frame_loop) = pipeline::spawn(options.camera, annotator, options.pipeline);

    tokio::spawn(async move {
        match frame_loop.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Frame loop failed: {e:#}"),
            Err(e) => error!("Frame loop panicked: {e}"),
        }
    });

    let sensor = SerialSensor::connect(options.sensor).await;
    let state = AppState::new(frames, Box::new(sensor), options.regions);

    let listener = tokio::net::TcpListener::bind(options.bind)
        .await
        .with_context(|| format!("Failed to bind {}", options.bind))?;
    info!("Serving dashboard on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .await
        .context("HTTP server stopped")?;
    Ok(())
}
