//! Command line arguments backing the `leafwatch` binary.
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use leafwatch::batch::{ClassifyOptions, DEFAULT_TOP};
use leafwatch::capture::CameraSource;
use leafwatch::pipeline::PipelineOptions;
use leafwatch::prelude::*;
use leafwatch::sensor::SerialSensorOptions;
use leafwatch::server::{
  default_regions, ServeOptions, DEFAULT_BIND, DEFAULT_CAMERA, DEFAULT_REFRESH_INTERVAL,
};

#[derive(Parser, Debug)]
#[command(
  name = "leafwatch",
  about = "Live tomato leaf disease detection on a camera feed, with greenhouse sensor readings",
  version
)]
pub struct Args {
  /// Log at debug level
  #[arg(long, short = 'v', global = true)]
  pub verbose: bool,

  #[command(subcommand)]
  pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
  /// Print version information
  Version,
  /// Serve the dashboard, the annotated video feed and sensor data
  Serve(ServeArgs),
  /// Classify an image file or a directory of images
  Classify(ClassifyArgs),
}

#[derive(clap::Args, Debug)]
pub struct ModelArgs {
  /// Path to the ONNX model
  #[arg(long, short = 'm', default_value = "models/model.onnx")]
  pub model: PathBuf,

  /// Model expects channels-first (NCHW) input
  #[arg(long)]
  pub nchw: bool,
}

impl ModelArgs {
  fn options(self) -> OnnxClassifierOptions {
    OnnxClassifierOptions {
      model_path: self.model,
      layout: if self.nchw { TensorLayout::Nchw } else { TensorLayout::Nhwc },
      ..Default::default()
    }
  }
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
  /// Address to listen on
  #[arg(long, short = 'b', default_value = DEFAULT_BIND)]
  pub bind: SocketAddr,

  /// MJPEG stream URL, or a directory of images to replay
  #[arg(long, short = 'c', default_value = DEFAULT_CAMERA)]
  pub camera: CameraSource,

  /// Serial device of the sensor board
  #[arg(long, default_value = "/dev/ttyACM0")]
  pub serial_port: PathBuf,

  /// Attempts to open the serial device before giving up
  #[arg(long, default_value_t = 3)]
  pub sensor_attempts: u32,

  #[command(flatten)]
  pub model: ModelArgs,

  /// Region to classify as x,y,width,height (repeatable)
  #[arg(long = "region", value_name = "X,Y,W,H")]
  pub regions: Vec<Region>,

  /// Frames between classification rounds
  #[arg(long, short = 'r', default_value_t = DEFAULT_REFRESH_INTERVAL)]
  pub refresh_interval: u64,

  /// Resize frames to this width (requires --frame-height)
  #[arg(long, requires = "frame_height", value_parser = clap::value_parser!(u32).range(1..))]
  pub frame_width: Option<u32>,

  /// Resize frames to this height (requires --frame-width)
  #[arg(long, requires = "frame_width", value_parser = clap::value_parser!(u32).range(1..))]
  pub frame_height: Option<u32>,

  /// JPEG quality of the streamed frames (1-100)
  #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(1..=100))]
  pub jpeg_quality: u8,
}

impl ServeArgs {
  pub fn into_options(self) -> ServeOptions {
    let regions = if self.regions.is_empty() {
      default_regions()
    } else {
      self.regions
    };

    ServeOptions {
      bind: self.bind,
      camera: self.camera,
      model: self.model.options(),
      regions,
      refresh_interval: self.refresh_interval,
      pipeline: PipelineOptions {
        frame_size: self.frame_width.zip(self.frame_height),
        jpeg_quality: self.jpeg_quality,
      },
      sensor: SerialSensorOptions {
        port: self.serial_port,
        connect_attempts: self.sensor_attempts,
        retry_delay: Duration::from_secs(1),
        ..Default::default()
      },
    }
  }
}

#[derive(clap::Args, Debug)]
pub struct ClassifyArgs {
  /// Image file or directory of images
  pub path: PathBuf,

  #[command(flatten)]
  pub model: ModelArgs,

  /// Number of top classes to print per image
  #[arg(long, short = 'n', default_value_t = DEFAULT_TOP)]
  pub top: usize,
}

impl ClassifyArgs {
  pub fn into_options(self) -> ClassifyOptions {
    ClassifyOptions {
      input: self.path,
      model: self.model.options(),
      top: self.top,
    }
  }
}
