//! # leafwatch
//!
//! Watches tomato plants through a network camera, labels fixed leaf regions
//! with a disease classifier, and serves the annotated video next to live
//! readings from a serial-attached sensor board.
//!
//! ## Features
//!
//! - **Region annotation**: classify fixed regions of interest at a configurable
//!   frame interval and redraw the last known label on every frame
//! - **Frame sources**: MJPEG over HTTP, or a directory of still images for replay
//! - **MJPEG streaming**: annotated frames served as `multipart/x-mixed-replace`
//! - **Sensor readings**: `key: value` lines from a serial port exposed as JSON
//! - **Batch classification**: run the model over image files from the command line
//!
//! ## Quick Start
//!
//! ```ignore
//! use leafwatch::prelude::*;
//!
//! let classifier = OnnxClassifier::new(OnnxClassifierOptions::default())?;
//! let mut annotator = RegionAnnotator::new(vec![Region::new(250, 250, 500, 500)], classifier, 30);
//!
//! let mut source = CameraSource::from_str("http://192.168.18.7:8080/video")?.open()?;
//! while let Some(mut frame) = source.next_frame()? {
//!     let index = annotator.annotate(&mut frame);
//!     println!("frame {index}: {:?}", annotator.cached(0));
//! }
//! ```

pub mod annotator;
pub mod batch;
pub mod capture;
pub mod overlay;
pub mod pipeline;
pub mod sensor;
pub mod server;

// Re-export commonly used types at the root level
pub use annotator::{CachedPrediction, RegionAnnotator, RegionStatus};
pub use batch::{BatchReport, ClassifyOptions, ImageReport};
pub use capture::{CameraSource, CaptureError, FrameSource, HttpMjpegSource, ImageDirSource, JpegScanner};
pub use pipeline::{FramePacket, FramePipeline, PipelineOptions};
pub use sensor::{parse_lines, SensorError, SensorReadings, SensorSource, SerialSensor, SerialSensorOptions};
pub use server::{AppState, ServeOptions, StatusReport};

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```ignore
/// use leafwatch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        parse_lines, BatchReport, CachedPrediction, CameraSource, CaptureError, ClassifyOptions, FramePacket,
        FramePipeline, FrameSource, HttpMjpegSource, ImageDirSource, ImageReport, JpegScanner, PipelineOptions,
        RegionAnnotator, RegionStatus, SensorError, SensorReadings, SensorSource, SerialSensor, SerialSensorOptions,
        ServeOptions, StatusReport,
    };
    pub use leafwatch_vision::{
        ClassScore, Classifier, ClassifyError, OnnxClassifier, OnnxClassifierOptions, Prediction, Region,
        TensorLayout,
    };
}
