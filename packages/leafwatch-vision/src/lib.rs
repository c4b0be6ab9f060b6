//! Region geometry and leaf classification backends used by the leafwatch service.

pub mod engine;
pub mod labels;
pub mod onnx;
pub mod region;

pub use engine::{ClassScore, Classifier, ClassifyError, Prediction};
pub use labels::{default_labels, TOMATO_LEAF_LABELS};
pub use onnx::{OnnxClassifier, OnnxClassifierOptions, TensorLayout};
pub use region::{ParseRegionError, Region};
