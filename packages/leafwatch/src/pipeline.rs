//! The frame loop: pull a frame, annotate it, encode it, publish it.
//!
//! The loop runs on one blocking task that owns the frame source and the
//! annotator. Consumers only ever see the latest encoded frame through a
//! `watch` channel.
use anyhow::{Context, Result};
use bytes::{BufMut, Bytes, BytesMut};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, imageops::FilterType, RgbImage};
use leafwatch_vision::Classifier;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::annotator::{RegionAnnotator, RegionStatus};
use crate::capture::{CameraSource, FrameSource};

/// Multipart boundary used by `/video_feed`.
pub const BOUNDARY: &str = "frame";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Resize every frame to this size before annotating.
    pub frame_size: Option<(u32, u32)>,
    pub jpeg_quality: u8,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            frame_size: None,
            jpeg_quality: 80,
        }
    }
}

/// One annotated, encoded frame.
#[derive(Debug, Clone)]
pub struct FramePacket {
    pub jpeg: Bytes,
    pub frame_index: u64,
    pub regions: Vec<RegionStatus>,
}

pub struct FramePipeline<S, C> {
    source: S,
    annotator: RegionAnnotator<C>,
    options: PipelineOptions,
}

impl<S: FrameSource, C: Classifier> FramePipeline<S, C> {
    pub fn new(source: S, annotator: RegionAnnotator<C>, options: PipelineOptions) -> Self {
        Self {
            source,
            annotator,
            options,
        }
    }

    /// Produces the next annotated frame. Frames that fail to decode or
    /// encode are skipped; `None` means the source is finished.
    pub fn next_packet(&mut self) -> Option<FramePacket> {
        loop {
            let mut frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Frame source exhausted");
                    return None;
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping frame: {e}");
                    continue;
                }
                Err(e) => {
                    error!("Frame source failed: {e}");
                    return None;
                }
            };

            if let Some((width, height)) = self.options.frame_size {
                if frame.dimensions() != (width, height) {
                    frame = imageops::resize(&frame, width, height, FilterType::Triangle);
                }
            }

            let frame_index = self.annotator.annotate(&mut frame);

            match encode_jpeg(&frame, self.options.jpeg_quality) {
                Ok(jpeg) => {
                    return Some(FramePacket {
                        jpeg: Bytes::from(jpeg),
                        frame_index,
                        regions: self.annotator.snapshot(),
                    })
                }
                Err(e) => warn!(frame = frame_index, "Skipping frame, JPEG encode failed: {e}"),
            }
        }
    }

    /// Publishes frames until the source ends. Returns the number of frames
    /// published.
    pub fn run(mut self, publisher: &watch::Sender<Option<FramePacket>>) -> u64 {
        let mut published = 0;
        while let Some(packet) = self.next_packet() {
            publisher.send_replace(Some(packet));
            published += 1;
        }
        published
    }
}

/// Opens `camera` and runs the frame loop on a blocking task.
pub fn spawn<C>(
    camera: CameraSource,
    annotator: RegionAnnotator<C>,
    options: PipelineOptions,
) -> (watch::Receiver<Option<FramePacket>>, JoinHandle<Result<u64>>)
where
    C: Classifier + 'static,
{
    let (publisher, frames) = watch::channel(None);
    let handle = tokio::task::spawn_blocking(move || {
        let source = camera
            .open()
            .with_context(|| format!("Failed to open camera source {camera}"))?;
        let published = FramePipeline::new(source, annotator, options).run(&publisher);
        info!("Frame loop finished after {} frames", published);
        Ok(published)
    });
    (frames, handle)
}

pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(frame)?;
    Ok(buf)
}

/// Frames one JPEG as a part of the `multipart/x-mixed-replace` response.
pub fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let header = format!("--{BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut part = BytesMut::with_capacity(header.len() + jpeg.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}
