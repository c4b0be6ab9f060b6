//! Frame sources: an IP camera serving MJPEG over HTTP, or a directory of
//! still images replayed once.
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::{ImageFormat, RgbImage};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Image extensions accepted for replay and batch classification.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Upper bound on a single JPEG while scanning a stream for its end marker.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;
const READ_CHUNK: usize = 64 * 1024;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI_MARKER: u8 = 0xD9;
const SOS_MARKER: u8 = 0xDA;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to connect to camera {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("camera {url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("camera stream read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to list images: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),
    #[error("frame exceeded {0} bytes without an end marker")]
    Oversized(usize),
    #[error("malformed JPEG stream: {0}")]
    Malformed(&'static str),
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
}

impl CaptureError {
    /// Whether the source can keep going after this error. Unrecoverable
    /// errors end the frame sequence.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CaptureError::Decode(_) | CaptureError::Oversized(_) | CaptureError::Malformed(_)
        )
    }
}

/// A lazy, non-restartable sequence of frames.
pub trait FrameSource: Send {
    /// `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        (**self).next_frame()
    }
}

/// Where frames come from, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSource {
    /// `http://` or `https://` URL of an MJPEG stream.
    Mjpeg(String),
    /// Directory of still images.
    Directory(PathBuf),
}

impl FromStr for CameraSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(CameraSource::Mjpeg(s.to_string()))
        } else {
            Ok(CameraSource::Directory(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for CameraSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraSource::Mjpeg(url) => f.write_str(url),
            CameraSource::Directory(dir) => write!(f, "{}", dir.display()),
        }
    }
}

impl CameraSource {
    /// Opens the source. Connecting to a camera blocks.
    pub fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        match self {
            CameraSource::Mjpeg(url) => Ok(Box::new(HttpMjpegSource::connect(url)?)),
            CameraSource::Directory(dir) => Ok(Box::new(ImageDirSource::open(dir)?)),
        }
    }
}

/// Splits a byte stream into JPEG images on their start/end markers.
pub struct JpegScanner {
    buffer: Vec<u8>,
    max_frame_bytes: usize,
}

impl Default for JpegScanner {
    fn default() -> Self {
        Self::new(MAX_FRAME_BYTES)
    }
}

impl JpegScanner {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_bytes,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pops the next complete JPEG out of the buffered bytes, if there is one.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
        let Some(start) = find_marker(&self.buffer, SOI, 0) else {
            // keep a trailing 0xFF, it may be the first half of the next SOI
            let keep = usize::from(self.buffer.last() == Some(&0xFF));
            self.buffer.drain(..self.buffer.len() - keep);
            return Ok(None);
        };
        self.buffer.drain(..start);

        match jpeg_length(&self.buffer) {
            Ok(Some(len)) => Ok(Some(self.buffer.drain(..len).collect())),
            Ok(None) if self.buffer.len() > self.max_frame_bytes => {
                self.buffer.clear();
                Err(CaptureError::Oversized(self.max_frame_bytes))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                // resync on the next start marker
                self.buffer.drain(..SOI.len());
                Err(e)
            }
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn find_marker(haystack: &[u8], marker: [u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == marker)
        .map(|pos| pos + from)
}

/// Length of the JPEG at the start of `data`, or `None` while it is still
/// incomplete. Walks the marker segments so that an end marker inside a
/// segment payload (e.g. an EXIF thumbnail) does not end the frame.
fn jpeg_length(data: &[u8]) -> Result<Option<usize>, CaptureError> {
    let mut pos = SOI.len();
    loop {
        let Some(&prefix) = data.get(pos) else {
            return Ok(None);
        };
        if prefix != 0xFF {
            return Err(CaptureError::Malformed("expected a marker"));
        }
        let Some(&marker) = data.get(pos + 1) else {
            return Ok(None);
        };
        match marker {
            // fill byte
            0xFF => pos += 1,
            EOI_MARKER => return Ok(Some(pos + 2)),
            0x01 | 0xD0..=0xD7 => pos += 2,
            _ => {
                let Some(len) = data.get(pos + 2..pos + 4) else {
                    return Ok(None);
                };
                let len = u16::from_be_bytes([len[0], len[1]]) as usize;
                if len < 2 {
                    return Err(CaptureError::Malformed("bad segment length"));
                }
                pos += 2 + len;
                if marker == SOS_MARKER {
                    match entropy_end(data, pos) {
                        Some(next) => pos = next,
                        None => return Ok(None),
                    }
                }
            }
        }
    }
}

/// Offset of the first marker after entropy-coded scan data starting at
/// `from`. Stuffed `FF 00` bytes and restart markers belong to the scan.
fn entropy_end(data: &[u8], from: usize) -> Option<usize> {
    let mut pos = from;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        match data[pos + 1] {
            0xFF => pos += 1,
            0x00 | 0xD0..=0xD7 => pos += 2,
            _ => return Some(pos),
        }
    }
    None
}

/// Reads an MJPEG stream such as the `/video` endpoint of phone IP-camera apps.
pub struct HttpMjpegSource {
    response: reqwest::blocking::Response,
    scanner: JpegScanner,
    chunk: Vec<u8>,
}

impl HttpMjpegSource {
    pub fn connect(url: &str) -> Result<Self, CaptureError> {
        let connect_err = |source| CaptureError::Connect {
            url: url.to_string(),
            source,
        };
        // the stream never completes, so no overall request timeout
        let client = reqwest::blocking::Client::builder()
            .timeout(None)
            .build()
            .map_err(connect_err)?;
        let response = client.get(url).send().map_err(connect_err)?;

        if !response.status().is_success() {
            return Err(CaptureError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        info!("Connected to camera stream {}", url);

        Ok(Self {
            response,
            scanner: JpegScanner::default(),
            chunk: vec![0; READ_CHUNK],
        })
    }
}

impl FrameSource for HttpMjpegSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        loop {
            if let Some(jpeg) = self.scanner.next_frame()? {
                return decode_jpeg(&jpeg).map(Some);
            }
            let read = self.response.read(&mut self.chunk)?;
            if read == 0 {
                debug!("Camera stream ended with {} bytes buffered", self.scanner.buffered());
                return Ok(None);
            }
            self.scanner.push(&self.chunk[..read]);
        }
    }
}

pub fn decode_jpeg(bytes: &[u8]) -> Result<RgbImage, CaptureError> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?.to_rgb8())
}

/// Replays the images of a directory in file-name order.
pub struct ImageDirSource {
    files: std::vec::IntoIter<PathBuf>,
}

impl ImageDirSource {
    pub fn open(dir: &Path) -> Result<Self, CaptureError> {
        if !dir.is_dir() {
            return Err(CaptureError::NotADirectory(dir.to_path_buf()));
        }
        let files = list_images(dir)?;
        info!("Replaying {} images from {}", files.len(), dir.display());
        Ok(Self {
            files: files.into_iter(),
        })
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        match self.files.next() {
            Some(path) => {
                debug!("Reading frame {}", path.display());
                Ok(Some(image::open(&path)?.to_rgb8()))
            }
            None => Ok(None),
        }
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Images directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_file() && is_image_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
