use std::path::PathBuf;

use image::RgbImage;
use thiserror::Error;

/// Probability assigned to a single class, in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScore {
    pub label: String,
    pub probability: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    /// Probability of `label`, in percent.
    pub confidence: f32,
    /// Every class in label order.
    pub distribution: Vec<ClassScore>,
}

impl Prediction {
    /// Builds a prediction from raw per-class probabilities (0..=1) aligned
    /// with `labels`.
    pub fn from_probabilities<S: AsRef<str>>(
        labels: &[S],
        probabilities: &[f32],
    ) -> Result<Self, ClassifyError> {
        if labels.is_empty() || labels.len() != probabilities.len() {
            return Err(ClassifyError::EngineError(format!(
                "model produced {} scores for {} labels",
                probabilities.len(),
                labels.len()
            )));
        }

        let distribution: Vec<ClassScore> = labels
            .iter()
            .zip(probabilities)
            .map(|(label, p)| ClassScore {
                label: label.as_ref().to_string(),
                probability: p * 100.0,
            })
            .collect();

        let best = distribution
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.probability.total_cmp(&b.probability))
            .map(|(idx, _)| idx)
            .unwrap_or(0);

        Ok(Self {
            label: distribution[best].label.clone(),
            confidence: distribution[best].probability,
            distribution,
        })
    }

    /// The `n` most probable classes, highest first.
    pub fn top(&self, n: usize) -> Vec<&ClassScore> {
        let mut ranked: Vec<&ClassScore> = self.distribution.iter().collect();
        ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        ranked.truncate(n);
        ranked
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("model file not found: {0}")]
    ModelNotFound(PathBuf),
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("prediction failed: {0}")]
    EngineError(String),
}

/// Anything that can label a crop of a frame.
pub trait Classifier: Send {
    fn predict(&mut self, image: &RgbImage) -> Result<Prediction, ClassifyError>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn predict(&mut self, image: &RgbImage) -> Result<Prediction, ClassifyError> {
        (**self).predict(image)
    }
}
