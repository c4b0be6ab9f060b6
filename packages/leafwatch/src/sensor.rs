//! Environmental readings from a serial-attached microcontroller.
//!
//! The board prints one `key: value` line per sensor, e.g.
//! `Temperature: 24` or `Moisture: 41.35`. A background task collects the
//! lines as they arrive into a bounded backlog; [`SensorSource::read_latest`]
//! drains whatever came in since the previous call and parses it into a flat
//! map. When nobody reads, the oldest lines are dropped.
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub type SensorReadings = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    #[error("Serial connection not established")]
    NotConnected,
    #[error("No data available")]
    NoData,
    #[error("No valid data available")]
    NoValidData,
    #[error("Serial port error: {0}")]
    Port(String),
}

#[async_trait]
pub trait SensorSource: Send {
    async fn read_latest(&mut self) -> Result<SensorReadings, SensorError>;
}

/// Parses one `key: value` line. Returns `None` for anything else.
pub fn parse_line(line: &str) -> Option<(String, f64)> {
    let (key, value) = line.trim().split_once(": ")?;
    if key.is_empty() {
        return None;
    }
    let value: f64 = value.trim().parse().ok()?;
    // JSON has no representation for NaN or infinities
    value.is_finite().then(|| (key.to_string(), value))
}

/// Parses a batch of lines, skipping malformed ones. Later lines overwrite
/// earlier readings of the same key.
pub fn parse_lines<I, S>(lines: I) -> Result<SensorReadings, SensorError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = 0usize;
    let mut readings = SensorReadings::new();

    for line in lines {
        seen += 1;
        match parse_line(line.as_ref()) {
            Some((key, value)) => {
                readings.insert(key, value);
            }
            None => debug!("Invalid value format: {:?}", line.as_ref()),
        }
    }

    if seen == 0 {
        Err(SensorError::NoData)
    } else if readings.is_empty() {
        Err(SensorError::NoValidData)
    } else {
        Ok(readings)
    }
}

/// Body returned by `/sensor_data`.
pub fn sensor_json(result: &Result<SensorReadings, SensorError>) -> Value {
    match result {
        Ok(readings) => Value::Object(
            readings
                .iter()
                .map(|(key, value)| (key.clone(), json!(value)))
                .collect(),
        ),
        Err(e) => json!({ "error": e.to_string() }),
    }
}

pub struct SerialSensorOptions {
    pub port: PathBuf,
    /// Attempts to open the port at start-up before giving up.
    pub connect_attempts: u32,
    pub retry_delay: Duration,
    /// Grace period for lines in flight before draining the buffer.
    pub settle_delay: Duration,
    /// Most lines kept between two reads.
    pub backlog: usize,
}

impl Default for SerialSensorOptions {
    fn default() -> Self {
        Self {
            port: PathBuf::from("/dev/ttyACM0"),
            connect_attempts: 3,
            retry_delay: Duration::from_secs(1),
            settle_delay: Duration::from_millis(100),
            backlog: 64,
        }
    }
}

#[derive(Debug, Default)]
struct LineBuffer {
    lines: VecDeque<String>,
    dropped: u64,
    closed: Option<String>,
}

/// Reads lines from a serial device opened as a file. The line settings
/// (baud rate etc.) are whatever the OS has configured for the device.
pub struct SerialSensor {
    port: PathBuf,
    settle_delay: Duration,
    lines: Option<Arc<Mutex<LineBuffer>>>,
    reader: Option<JoinHandle<()>>,
}

impl SerialSensor {
    /// Opens the port, retrying a bounded number of times. A port that never
    /// opens yields a sensor that reports [`SensorError::NotConnected`].
    pub async fn connect(options: SerialSensorOptions) -> Self {
        let attempts = options.connect_attempts.max(1);
        let backlog = options.backlog.max(1);
        let mut sensor = Self {
            port: options.port,
            settle_delay: options.settle_delay,
            lines: None,
            reader: None,
        };

        for attempt in 1..=attempts {
            match OpenOptions::new().read(true).open(&sensor.port).await {
                Ok(file) => {
                    info!("Connected to sensor board on {}", sensor.port.display());
                    let lines = Arc::new(Mutex::new(LineBuffer::default()));
                    sensor.reader = Some(tokio::spawn(read_lines(file, lines.clone(), backlog)));
                    sensor.lines = Some(lines);
                    return sensor;
                }
                Err(e) => {
                    warn!(
                        "Error connecting to {} (attempt {}/{}): {}",
                        sensor.port.display(),
                        attempt,
                        attempts,
                        e
                    );
                    if attempt < attempts {
                        tokio::time::sleep(options.retry_delay).await;
                    }
                }
            }
        }
        sensor
    }

    pub fn is_connected(&self) -> bool {
        self.lines.is_some()
    }

    /// Lines received and not yet read.
    pub async fn buffered(&self) -> usize {
        match &self.lines {
            Some(lines) => lines.lock().await.lines.len(),
            None => 0,
        }
    }

    /// Stops the background reader and releases the port.
    pub fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
            info!("Serial connection to {} closed", self.port.display());
        }
        self.lines = None;
    }
}

impl Drop for SerialSensor {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn read_lines(file: tokio::fs::File, buffer: Arc<Mutex<LineBuffer>>, backlog: usize) {
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                buffer.lock().await.closed = Some("serial port closed".to_string());
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim().to_string();
                debug!("Received raw data: {}", line);
                let mut buffer = buffer.lock().await;
                if buffer.lines.len() >= backlog {
                    buffer.lines.pop_front();
                    buffer.dropped += 1;
                }
                buffer.lines.push_back(line);
            }
            Err(e) => {
                buffer.lock().await.closed = Some(e.to_string());
                break;
            }
        }
    }
}

#[async_trait]
impl SensorSource for SerialSensor {
    async fn read_latest(&mut self) -> Result<SensorReadings, SensorError> {
        if self.lines.is_none() {
            return Err(SensorError::NotConnected);
        }
        tokio::time::sleep(self.settle_delay).await;
        let Some(buffer) = &self.lines else {
            return Err(SensorError::NotConnected);
        };

        let mut buffer = buffer.lock().await;
        if buffer.dropped > 0 {
            debug!("Dropped {} unread sensor lines", buffer.dropped);
            buffer.dropped = 0;
        }
        let lines: Vec<String> = buffer.lines.drain(..).collect();

        if lines.is_empty() {
            if let Some(msg) = &buffer.closed {
                return Err(SensorError::Port(msg.clone()));
            }
        }
        parse_lines(lines)
    }
}
