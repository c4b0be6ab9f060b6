//! Integration tests for the CLI commands

use assert_cmd::cargo::cargo_bin_cmd;
use image::{Rgb, RgbImage};
use predicates::prelude::*;

#[test]
fn test_version_command() {
    let mut cmd = cargo_bin_cmd!("leafwatch");
    cmd.arg("version");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("leafwatch "));
}

#[test]
fn test_version_flag() {
    let mut cmd = cargo_bin_cmd!("leafwatch");
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("leafwatch "));
}

#[test]
fn test_version_short_flag() {
    let mut cmd = cargo_bin_cmd!("leafwatch");
    cmd.arg("-V");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("leafwatch "));
}

#[test]
fn test_classify_without_model_fails() {
    let dir = tempfile::tempdir().unwrap();
    RgbImage::from_pixel(32, 32, Rgb([30, 140, 40]))
        .save(dir.path().join("leaf.png"))
        .unwrap();

    let mut cmd = cargo_bin_cmd!("leafwatch");
    cmd.arg("classify")
        .arg(dir.path())
        .arg("--model")
        .arg(dir.path().join("missing.onnx"));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("model file not found"));
}

#[test]
fn test_classify_missing_input_fails() {
    let mut cmd = cargo_bin_cmd!("leafwatch");
    cmd.args(["classify", "/no/such/leaf.jpg"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Input path does not exist"));
}

#[test]
fn test_serve_rejects_malformed_region() {
    let mut cmd = cargo_bin_cmd!("leafwatch");
    cmd.args(["serve", "--region", "10,10,0,5"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid region"));
}
