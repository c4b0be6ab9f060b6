use std::path::{Path, PathBuf};

use image::RgbImage;
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::{debug, info};

use crate::engine::{Classifier, ClassifyError, Prediction};
use crate::labels::default_labels;

use super::tensor::{image_to_tensor, TensorLayout};

pub struct OnnxClassifierOptions {
    pub model_path: PathBuf,
    pub labels: Vec<String>,
    /// Side length of the square model input.
    pub input_size: u32,
    pub layout: TensorLayout,
    pub intra_threads: usize,
}

impl Default for OnnxClassifierOptions {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/model.onnx"),
            labels: default_labels(),
            input_size: 224,
            layout: TensorLayout::Nhwc,
            intra_threads: 4,
        }
    }
}

/// Leaf classifier running an exported image model through ONNX Runtime.
pub struct OnnxClassifier {
    session: Session,
    input_name: String,
    labels: Vec<String>,
    input_size: u32,
    layout: TensorLayout,
}

impl OnnxClassifier {
    pub fn new(options: OnnxClassifierOptions) -> Result<Self, ClassifyError> {
        if !options.model_path.exists() {
            return Err(ClassifyError::ModelNotFound(options.model_path));
        }

        info!("Loading classifier model from {}", options.model_path.display());
        let session = load_session(&options.model_path, options.intra_threads)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| ClassifyError::ModelLoad("model declares no inputs".into()))?;
        debug!("Model input {:?}, {} labels", input_name, options.labels.len());

        Ok(Self {
            session,
            input_name,
            labels: options.labels,
            input_size: options.input_size,
            layout: options.layout,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

fn load_session(path: &Path, intra_threads: usize) -> Result<Session, ClassifyError> {
    let load_err = |e: ort::Error| ClassifyError::ModelLoad(e.to_string());
    let builder = Session::builder()
        .map_err(load_err)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(load_err)?
        .with_intra_threads(intra_threads)
        .map_err(load_err)?;

    #[cfg(feature = "coreml")]
    let builder = builder
        .with_execution_providers([
            ort::execution_providers::CoreMLExecutionProvider::default().build(),
        ])
        .map_err(load_err)?;

    builder.commit_from_file(path).map_err(load_err)
}

impl Classifier for OnnxClassifier {
    fn predict(&mut self, image: &RgbImage) -> Result<Prediction, ClassifyError> {
        let engine_err = |e: ort::Error| ClassifyError::EngineError(e.to_string());

        let (shape, data) = image_to_tensor(image, self.input_size, self.layout)?;
        let input_value =
            ort::value::Value::from_array((shape.as_slice(), data.into_boxed_slice()))
                .map_err(engine_err)?;

        let scores = {
            let outputs = self
                .session
                .run(ort::inputs![self.input_name.as_str() => input_value])
                .map_err(engine_err)?;
            let (_, data) = outputs[0].try_extract_tensor::<f32>().map_err(engine_err)?;
            data.to_vec()
        };

        Prediction::from_probabilities(&self.labels, &scores)
    }
}
