//! Periodic region classification with a per-region label cache.
//!
//! Inference runs at most once every `refresh_interval` frames, while the last
//! known label of every region is drawn on every frame. A failed inference
//! leaves the region's previous label in place.
use image::RgbImage;
use leafwatch_vision::{Classifier, ClassifyError, Region};
use serde::Serialize;
use tracing::{debug, warn};

use crate::overlay::{draw_region_box, draw_text, BOX_THICKNESS, LABEL_COLOR, TEXT_SCALE};

/// Gap between the top edge of a region and the baseline of its label.
const LABEL_OFFSET: i64 = 10;

/// Last successful prediction for a region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedPrediction {
    pub label: String,
    /// Percent, 0..=100.
    pub confidence: f32,
    /// Frame index of the inference that produced this entry.
    pub refreshed_at: u64,
}

impl CachedPrediction {
    fn caption(&self, region_number: usize) -> String {
        format!("{} ({:.2}%) {}", self.label, self.confidence, region_number)
    }
}

/// A region together with whatever is cached for it, as reported by `/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionStatus {
    /// 1-based, matching the number drawn on the frame.
    pub number: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub prediction: Option<CachedPrediction>,
}

pub struct RegionAnnotator<C> {
    regions: Vec<Region>,
    classifier: C,
    refresh_interval: u64,
    frame_index: u64,
    last_refresh: u64,
    cache: Vec<Option<CachedPrediction>>,
}

impl<C: Classifier> RegionAnnotator<C> {
    /// `refresh_interval` is clamped to at least one frame.
    pub fn new(regions: Vec<Region>, classifier: C, refresh_interval: u64) -> Self {
        let cache = vec![None; regions.len()];
        Self {
            regions,
            classifier,
            refresh_interval: refresh_interval.max(1),
            frame_index: 0,
            last_refresh: 0,
            cache,
        }
    }

    /// Advances the frame counter, classifies the regions if the refresh
    /// interval has elapsed, and draws every cached label onto `frame`.
    /// Returns the index of this frame (the first frame is 1).
    pub fn annotate(&mut self, frame: &mut RgbImage) -> u64 {
        self.frame_index += 1;

        if self.frame_index - self.last_refresh >= self.refresh_interval {
            self.refresh(frame);
        }

        self.draw(frame);
        self.frame_index
    }

    fn refresh(&mut self, frame: &RgbImage) {
        let mut refreshed = false;

        for (idx, region) in self.regions.iter().enumerate() {
            let result = match region.crop(frame) {
                Some(crop) => self.classifier.predict(&crop),
                None => Err(ClassifyError::InvalidInput(format!(
                    "region {} lies outside the {}x{} frame",
                    region,
                    frame.width(),
                    frame.height()
                ))),
            };

            match result {
                Ok(prediction) => {
                    debug!(
                        region = idx + 1,
                        frame = self.frame_index,
                        "{} ({:.2}%)",
                        prediction.label,
                        prediction.confidence
                    );
                    self.cache[idx] = Some(CachedPrediction {
                        label: prediction.label,
                        confidence: prediction.confidence,
                        refreshed_at: self.frame_index,
                    });
                    refreshed = true;
                }
                Err(e) => {
                    warn!(
                        region = idx + 1,
                        frame = self.frame_index,
                        "inference failed, keeping previous label: {e}"
                    );
                }
            }
        }

        if refreshed {
            self.last_refresh = self.frame_index;
        }
    }

    fn draw(&self, frame: &mut RgbImage) {
        for (idx, (region, cached)) in self.regions.iter().zip(&self.cache).enumerate() {
            let Some(cached) = cached else {
                continue;
            };
            draw_region_box(frame, region, LABEL_COLOR, BOX_THICKNESS);
            draw_text(
                frame,
                region.x as i64,
                region.y as i64 - LABEL_OFFSET,
                &cached.caption(idx + 1),
                LABEL_COLOR,
                TEXT_SCALE,
            );
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn cached(&self, region_index: usize) -> Option<&CachedPrediction> {
        self.cache.get(region_index).and_then(Option::as_ref)
    }

    pub fn snapshot(&self) -> Vec<RegionStatus> {
        self.regions
            .iter()
            .zip(&self.cache)
            .enumerate()
            .map(|(idx, (region, cached))| RegionStatus {
                number: idx + 1,
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                prediction: cached.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgb;
    use leafwatch_vision::Prediction;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Replays a fixed list of outcomes, one per `predict` call.
    pub(crate) struct ScriptedClassifier {
        outcomes: VecDeque<Result<&'static str, &'static str>>,
        pub(crate) calls: Arc<AtomicUsize>,
    }

    impl ScriptedClassifier {
        pub(crate) fn new(outcomes: Vec<Result<&'static str, &'static str>>) -> Self {
            Self {
                outcomes: outcomes.into(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Succeeds forever with the same label.
        pub(crate) fn always(label: &'static str) -> Self {
            Self::new(vec![Ok(label); 1024])
        }
    }

    impl Classifier for ScriptedClassifier {
        fn predict(&mut self, _image: &RgbImage) -> Result<Prediction, ClassifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcomes.pop_front() {
                Some(Ok(label)) => Ok(Prediction {
                    label: label.to_string(),
                    confidence: 87.5,
                    distribution: Vec::new(),
                }),
                Some(Err(msg)) => Err(ClassifyError::EngineError(msg.to_string())),
                None => Err(ClassifyError::EngineError("script exhausted".into())),
            }
        }
    }

    fn two_regions() -> Vec<Region> {
        vec![Region::new(4, 30, 20, 20), Region::new(40, 30, 20, 20)]
    }

    fn blank() -> RgbImage {
        RgbImage::new(64, 64)
    }

    fn label(annotator: &RegionAnnotator<ScriptedClassifier>, idx: usize) -> Option<&str> {
        annotator.cached(idx).map(|c| c.label.as_str())
    }

    #[test]
    fn test_frame_index_starts_at_one() {
        let mut annotator = RegionAnnotator::new(two_regions(), ScriptedClassifier::always("x"), 5);
        assert_eq!(annotator.frame_index(), 0);
        assert_eq!(annotator.annotate(&mut blank()), 1);
        assert_eq!(annotator.annotate(&mut blank()), 2);
    }

    #[test]
    fn test_unclassified_regions_are_not_drawn() {
        let mut annotator = RegionAnnotator::new(two_regions(), ScriptedClassifier::always("x"), 5);
        for _ in 0..4 {
            let mut frame = blank();
            annotator.annotate(&mut frame);
            assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
        }
        assert!(annotator.cached(0).is_none());
        assert!(annotator.cached(1).is_none());
    }

    #[test]
    fn test_inference_runs_once_per_interval() {
        let classifier = ScriptedClassifier::new(vec![Ok("a"), Ok("b"), Ok("c")]);
        let calls = classifier.calls.clone();
        let mut annotator = RegionAnnotator::new(vec![Region::new(0, 0, 8, 8)], classifier, 3);

        let mut history = Vec::new();
        for _ in 0..9 {
            annotator.annotate(&mut blank());
            history.push(label(&annotator, 0).map(str::to_string));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let expected = [None, None, Some("a"), Some("a"), Some("a"), Some("b"), Some("b"), Some("b"), Some("c")];
        let expected: Vec<Option<String>> = expected.iter().map(|l| l.map(str::to_string)).collect();
        assert_eq!(history, expected);
        assert_eq!(annotator.cached(0).unwrap().refreshed_at, 9);
    }

    #[test]
    fn test_interval_of_one_classifies_every_frame() {
        let classifier = ScriptedClassifier::always("leaf");
        let calls = classifier.calls.clone();
        let mut annotator = RegionAnnotator::new(two_regions(), classifier, 0);
        for _ in 0..4 {
            annotator.annotate(&mut blank());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_failed_region_keeps_previous_label() {
        // frame 4: both succeed, frame 8: first region fails
        let classifier = ScriptedClassifier::new(vec![Ok("a"), Ok("b"), Err("backend down"), Ok("c")]);
        let mut annotator = RegionAnnotator::new(two_regions(), classifier, 4);

        for _ in 0..8 {
            annotator.annotate(&mut blank());
        }

        let first = annotator.cached(0).unwrap();
        assert_eq!(first.label, "a");
        assert_eq!(first.refreshed_at, 4);
        let second = annotator.cached(1).unwrap();
        assert_eq!(second.label, "c");
        assert_eq!(second.refreshed_at, 8);
    }

    #[test]
    fn test_failure_at_interval_holds_cache_from_before() {
        let interval = 3;
        let classifier = ScriptedClassifier::new(vec![Ok("first"), Err("corrupt crop"), Ok("later")]);
        let mut annotator = RegionAnnotator::new(vec![Region::new(0, 0, 8, 8)], classifier, interval);

        for _ in 0..interval {
            annotator.annotate(&mut blank());
        }
        let before = annotator.cached(0).cloned();
        assert_eq!(before.as_ref().map(|c| c.label.as_str()), Some("first"));

        // frames I+1..2I: the failure lands on frame 2I
        for _ in 0..interval {
            annotator.annotate(&mut blank());
        }
        assert_eq!(annotator.cached(0).cloned(), before);

        // a round where every region failed is attempted again on the next frame
        annotator.annotate(&mut blank());
        assert_eq!(label(&annotator, 0), Some("later"));
        assert_eq!(annotator.cached(0).unwrap().refreshed_at, 2 * interval + 1);
    }

    #[test]
    fn test_labels_are_drawn_on_frames_without_inference() {
        let classifier = ScriptedClassifier::always("Tomato___Healthy");
        let calls = classifier.calls.clone();
        let mut annotator = RegionAnnotator::new(two_regions(), classifier, 2);

        for frame_no in 1..=5u64 {
            let mut frame = blank();
            annotator.annotate(&mut frame);
            let boxed = *frame.get_pixel(4, 30) == LABEL_COLOR;
            assert_eq!(boxed, frame_no >= 2, "frame {frame_no}");
        }
        // frames 2 and 4, two regions each
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_only_labelled_region_is_drawn() {
        let classifier = ScriptedClassifier::new(vec![Err("nope"), Ok("b")]);
        let mut annotator = RegionAnnotator::new(two_regions(), classifier, 1);
        let mut frame = blank();
        annotator.annotate(&mut frame);

        assert_eq!(frame.get_pixel(4, 30), &Rgb([0, 0, 0]));
        assert_eq!(frame.get_pixel(40, 30), &LABEL_COLOR);
        assert_eq!(frame.get_pixel(59, 49), &LABEL_COLOR);
    }

    #[test]
    fn test_region_outside_frame_is_isolated() {
        let classifier = ScriptedClassifier::always("inside");
        let calls = classifier.calls.clone();
        let regions = vec![Region::new(500, 500, 10, 10), Region::new(0, 0, 10, 10)];
        let mut annotator = RegionAnnotator::new(regions, classifier, 1);

        annotator.annotate(&mut blank());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(annotator.cached(0).is_none());
        assert_eq!(label(&annotator, 1), Some("inside"));
    }

    #[test]
    fn test_snapshot_reports_every_region() {
        let classifier = ScriptedClassifier::new(vec![Ok("a"), Err("x")]);
        let mut annotator = RegionAnnotator::new(two_regions(), classifier, 1);
        annotator.annotate(&mut blank());

        let snapshot = annotator.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].number, 1);
        assert_eq!(snapshot[0].prediction.as_ref().unwrap().label, "a");
        assert_eq!((snapshot[1].x, snapshot[1].width), (40, 20));
        assert!(snapshot[1].prediction.is_none());
    }

    #[test]
    fn test_caption_format() {
        let cached = CachedPrediction {
            label: "Tomato___Early_blight".into(),
            confidence: 97.3219,
            refreshed_at: 1,
        };
        assert_eq!(cached.caption(2), "Tomato___Early_blight (97.32%) 2");
    }
}
