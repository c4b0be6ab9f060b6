//! Offline classification of image files, used to check a model against
//! labelled photos without a camera.
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use leafwatch_vision::{Classifier, OnnxClassifier, OnnxClassifierOptions, Prediction};
use tracing::{info, warn};

use crate::capture::list_images;

pub const DEFAULT_TOP: usize = 3;

pub struct ClassifyOptions {
    /// An image file, or a directory whose images are classified in name order.
    pub input: PathBuf,
    pub model: OnnxClassifierOptions,
    /// Number of classes listed per image.
    pub top: usize,
}

#[derive(Debug)]
pub struct ImageReport {
    pub path: PathBuf,
    pub prediction: Prediction,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub images: Vec<ImageReport>,
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn render(&self, top: usize) -> String {
        let mut out = String::new();
        for report in &self.images {
            let p = &report.prediction;
            let _ = writeln!(out, "{}", report.path.display());
            let _ = writeln!(out, "  Predicted class: {}", p.label);
            let _ = writeln!(out, "  Confidence: {:.2}%", p.confidence);
            if top > 0 && !p.distribution.is_empty() {
                let _ = writeln!(out, "  Top {top}:");
                for score in p.top(top) {
                    let _ = writeln!(out, "    {}: {:.2}%", score.label, score.probability);
                }
            }
        }
        for (path, reason) in &self.failures {
            let _ = writeln!(out, "{}: failed ({reason})", path.display());
        }
        out
    }
}

/// Expands `input` into the list of images to classify.
pub fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_dir() {
        let files = list_images(input)
            .with_context(|| format!("Failed to list images in {}", input.display()))?;
        if files.is_empty() {
            bail!("No images found in {}", input.display());
        }
        Ok(files)
    } else if input.is_file() {
        Ok(vec![input.to_path_buf()])
    } else {
        bail!("Input path does not exist: {}", input.display())
    }
}

pub fn classify_image<C: Classifier>(classifier: &mut C, path: &Path) -> Result<Prediction> {
    let image = image::open(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?
        .to_rgb8();
    Ok(classifier.predict(&image)?)
}

/// Classifies every path, collecting failures instead of stopping at the
/// first one.
pub fn classify_paths<C: Classifier>(classifier: &mut C, paths: &[PathBuf]) -> BatchReport {
    let mut report = BatchReport::default();
    for path in paths {
        match classify_image(classifier, path) {
            Ok(prediction) => {
                info!(
                    "{}: {} ({:.2}%)",
                    path.display(),
                    prediction.label,
                    prediction.confidence
                );
                report.images.push(ImageReport {
                    path: path.clone(),
                    prediction,
                });
            }
            Err(e) => {
                warn!("Failed to process {}: {e:#}", path.display());
                report.failures.push((path.clone(), format!("{e:#}")));
            }
        }
    }
    report
}

pub fn run(options: ClassifyOptions) -> Result<BatchReport> {
    let paths = collect_inputs(&options.input)?;
    let model_path = options.model.model_path.clone();
    let mut classifier = OnnxClassifier::new(options.model)
        .with_context(|| format!("Failed to load model {}", model_path.display()))?;
    Ok(classify_paths(&mut classifier, &paths))
}
