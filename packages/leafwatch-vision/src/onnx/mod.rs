mod engine;
mod tensor;

pub use engine::{OnnxClassifier, OnnxClassifierOptions};
pub use tensor::TensorLayout;
