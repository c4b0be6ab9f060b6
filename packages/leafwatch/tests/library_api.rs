//! Integration tests for the leafwatch library API

use std::collections::VecDeque;

#[test]
fn test_prelude_imports() {
    use leafwatch::prelude::*;

    let region: Region = "250,250,500,500".parse().unwrap();
    assert_eq!(region, Region::new(250, 250, 500, 500));

    let readings = parse_lines(["Temperature: 25.5", "Humidity: 61"]).unwrap();
    assert_eq!(readings.len(), 2);

    assert_eq!(
        "http://192.168.18.7:8080/video".parse::<CameraSource>().unwrap(),
        CameraSource::Mjpeg("http://192.168.18.7:8080/video".into())
    );
}

#[test]
fn test_sensor_errors_render_as_json() {
    use leafwatch::sensor::{parse_lines, sensor_json};

    let body = sensor_json(&parse_lines(Vec::<&str>::new()));
    assert_eq!(body, serde_json::json!({ "error": "No data available" }));

    let body = sensor_json(&parse_lines(["Moisture: 41.35", "???"]));
    assert_eq!(body, serde_json::json!({ "Moisture": 41.35 }));
}

struct FixedClassifier(&'static str);

impl leafwatch_vision::Classifier for FixedClassifier {
    fn predict(
        &mut self,
        _image: &image::RgbImage,
    ) -> Result<leafwatch_vision::Prediction, leafwatch_vision::ClassifyError> {
        leafwatch_vision::Prediction::from_probabilities(&[self.0, "other"], &[0.9, 0.1])
    }
}

struct StillFrames(VecDeque<image::RgbImage>);

impl leafwatch::FrameSource for StillFrames {
    fn next_frame(&mut self) -> Result<Option<image::RgbImage>, leafwatch::CaptureError> {
        Ok(self.0.pop_front())
    }
}

#[test]
fn test_custom_classifier_and_source() {
    use leafwatch::prelude::*;

    let frames = (0..4)
        .map(|_| image::RgbImage::from_pixel(64, 48, image::Rgb([40, 120, 40])))
        .collect();
    let annotator = RegionAnnotator::new(
        vec![Region::new(8, 20, 16, 16)],
        FixedClassifier("Tomato___Healthy"),
        3,
    );
    let mut pipeline = FramePipeline::new(StillFrames(frames), annotator, PipelineOptions::default());

    let mut packets = Vec::new();
    while let Some(packet) = pipeline.next_packet() {
        packets.push(packet);
    }
    assert_eq!(packets.len(), 4);

    // first refresh happens on frame 3
    assert!(packets[1].regions[0].prediction.is_none());
    let cached = packets[3].regions[0].prediction.as_ref().unwrap();
    assert_eq!(cached.label, "Tomato___Healthy");
    assert_eq!(cached.refreshed_at, 3);
    assert!((cached.confidence - 90.0).abs() < 1e-3);
}
