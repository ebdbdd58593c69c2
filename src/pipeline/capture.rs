//! Capture source: produces one encoded still image per capture action.
//!
//! Two sources: a user-selected local file and a simulated camera that waits a
//! fixed time and yields a fixed payload. `Ok(None)` means the user cancelled;
//! that is a no-op for the scan cycle, not an error.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use thiserror::Error;

/// MIME type assumed when the source does not tell us.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Upper bound on a decoded image (16 MB).
pub const MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid image payload: {0}")]
    InvalidPayload(String),

    #[error("Image payload is empty")]
    Empty,

    #[error("Image payload exceeds {max} bytes ({0} bytes)", max = MAX_IMAGE_BYTES)]
    TooLarge(usize),
}

/// An encoded image (JPEG, PNG, ...) plus its MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    mime_type: String,
    bytes: Vec<u8>,
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Result<Self, CaptureError> {
        if bytes.is_empty() {
            return Err(CaptureError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(CaptureError::TooLarge(bytes.len()));
        }
        Ok(Self {
            mime_type: mime_type.into(),
            bytes,
        })
    }

    /// Decode a data URL (`data:image/png;base64,...`) or a bare base64 string.
    pub fn from_encoded(encoded: &str) -> Result<Self, CaptureError> {
        let (mime_type, data) = split_data_url(encoded.trim());
        let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(CaptureError::Empty);
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| CaptureError::InvalidPayload(format!("base64: {e}")))?;
        Self::new(mime_type, bytes)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Plain base64, no data-URL prefix.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// Split off a `data:<mime>[;param...];base64,` prefix if present.
///
/// Parameters are dropped. Anything without the prefix, or with a non-image
/// media type, is treated as base64 of the default type.
fn split_data_url(input: &str) -> (&str, &str) {
    let Some(rest) = input.strip_prefix("data:") else {
        return (DEFAULT_IMAGE_MIME, input);
    };
    let Some((header, data)) = rest.split_once(',') else {
        return (DEFAULT_IMAGE_MIME, input);
    };
    let mime = header.split(';').next().unwrap_or_default().trim();
    match mime.parse::<mime_guess::mime::Mime>() {
        Ok(parsed) if parsed.type_() == mime_guess::mime::IMAGE => (mime, data),
        _ => (DEFAULT_IMAGE_MIME, data),
    }
}

/// Anything that can hand the pipeline one image per capture action.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// `Ok(None)` when the user backed out without producing an image.
    async fn capture(&self) -> Result<Option<ImagePayload>, CaptureError>;
}

/// Image picked from the local filesystem. `None` path = picker cancelled.
pub struct FileCapture {
    path: Option<PathBuf>,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn cancelled() -> Self {
        Self { path: None }
    }
}

#[async_trait]
impl CaptureSource for FileCapture {
    async fn capture(&self) -> Result<Option<ImagePayload>, CaptureError> {
        let Some(path) = &self.path else {
            tracing::debug!("File capture cancelled");
            return Ok(None);
        };

        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_guess::from_path(path)
            .first()
            .filter(|m| m.type_() == mime_guess::mime::IMAGE)
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());

        tracing::debug!(path = %path.display(), mime = %mime_type, size = bytes.len(), "Image file captured");
        ImagePayload::new(mime_type, bytes).map(Some)
    }
}

/// Stand-in camera: waits for the "focus" delay, then yields a fixed image.
pub struct SimulatedCapture {
    latency: Duration,
    payload: ImagePayload,
}

impl SimulatedCapture {
    pub fn new(payload: ImagePayload, latency: Duration) -> Self {
        Self { latency, payload }
    }
}

#[async_trait]
impl CaptureSource for SimulatedCapture {
    async fn capture(&self) -> Result<Option<ImagePayload>, CaptureError> {
        tokio::time::sleep(self.latency).await;
        Ok(Some(self.payload.clone()))
    }
}
