//! Assets and error types for the generation pipeline

use image::ImageFormat;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Media type used when neither content nor extension identify an image
pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

// ============================================================================
// Errors
// ============================================================================

/// Generation pipeline error types
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid image: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No generated model is ready to download")]
    DownloadPrecondition,

    #[error("Download failed: {0}")]
    Download(#[from] std::io::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, GenerationError>;

impl GenerationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GenerationError::Validation(_) => ErrorCategory::Validation,
            GenerationError::Network(_) => ErrorCategory::Network,
            GenerationError::Service { .. } => ErrorCategory::Service,
            GenerationError::MalformedResponse(_) => ErrorCategory::MalformedResponse,
            GenerationError::DownloadPrecondition => ErrorCategory::DownloadPrecondition,
            GenerationError::Download(_) => ErrorCategory::Download,
        }
    }

    /// HTTP status for service errors
    pub fn status(&self) -> Option<u16> {
        match self {
            GenerationError::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for failures a bounded retry may recover from
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Network(_) => true,
            GenerationError::Service { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Failure category, recoverable from every failed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Network,
    Service,
    MalformedResponse,
    DownloadPrecondition,
    Download,
}

impl ErrorCategory {
    /// Stable machine-readable code
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Network => "network",
            ErrorCategory::Service => "service",
            ErrorCategory::MalformedResponse => "malformed_response",
            ErrorCategory::DownloadPrecondition => "download_precondition",
            ErrorCategory::Download => "download",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Why a generation cycle failed, as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReason {
    pub category: ErrorCategory,
    /// HTTP status, set for service errors
    pub status: Option<u16>,
    /// Human-readable message
    pub message: String,
}

impl From<&GenerationError> for FailureReason {
    fn from(err: &GenerationError) -> Self {
        let prefix = match err.category() {
            ErrorCategory::Validation => "Unsupported file",
            ErrorCategory::Network => "Could not reach the generation service",
            ErrorCategory::Service => "The generation service reported an error",
            ErrorCategory::MalformedResponse => "The generated model could not be read",
            ErrorCategory::DownloadPrecondition => "Nothing to download yet",
            ErrorCategory::Download => "Saving the model failed",
        };
        Self {
            category: err.category(),
            status: err.status(),
            message: format!("{prefix}: {err}"),
        }
    }
}

impl From<GenerationError> for FailureReason {
    fn from(err: GenerationError) -> Self {
        Self::from(&err)
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

// ============================================================================
// Assets
// ============================================================================

/// User-selected source image
///
/// Immutable once created; cloning shares the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    bytes: Arc<[u8]>,
    media_type: String,
    file_name: String,
}

impl ImageAsset {
    /// Create an image asset from raw bytes and their declared media type
    pub fn new(
        bytes: impl Into<Arc<[u8]>>,
        media_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
            file_name: file_name.into(),
        }
    }

    /// Read an image file, identifying its media type from content first and
    /// extension second
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let media_type = sniff_media_type(&bytes, path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self::new(bytes, media_type, file_name))
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Check the submission precondition: non-empty with an `image/*` type
    ///
    /// The image content itself is not inspected.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(GenerationError::Validation(format!(
                "{} is empty",
                self.file_name
            )));
        }
        let is_image = self
            .media_type
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"));
        if !is_image {
            return Err(GenerationError::Validation(format!(
                "{} has media type {}, expected an image",
                self.file_name, self.media_type
            )));
        }
        Ok(())
    }
}

fn sniff_media_type(bytes: &[u8], path: &Path) -> String {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }
    path.extension()
        .and_then(ImageFormat::from_extension)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|| UNKNOWN_MEDIA_TYPE.to_string())
}

/// Generated mesh bytes, opaque to the pipeline
///
/// At most one is live per session: each successful cycle replaces the
/// previous one in [`crate::PipelineState::Ready`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshAsset {
    bytes: Arc<[u8]>,
    sequence: u64,
}

impl MeshAsset {
    pub fn new(bytes: impl Into<Arc<[u8]>>, sequence: u64) -> Self {
        Self {
            bytes: bytes.into(),
            sequence,
        }
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    /// Generation cycle that produced this mesh
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_validate_accepts_images() {
        let image = ImageAsset::new(PNG_MAGIC.to_vec(), "image/png", "a.png");
        assert!(image.validate().is_ok());
    }

    #[test]
    fn test_validate_ignores_media_type_case() {
        let image = ImageAsset::new(PNG_MAGIC.to_vec(), "IMAGE/PNG", "a.png");
        assert!(image.validate().is_ok());
        let image = ImageAsset::new(PNG_MAGIC.to_vec(), "Image/Jpeg", "a.jpg");
        assert!(image.validate().is_ok());
        // Shorter than the prefix and multi-byte around its end
        assert!(ImageAsset::new(PNG_MAGIC.to_vec(), "img", "a").validate().is_err());
        assert!(ImageAsset::new(PNG_MAGIC.to_vec(), "imagé/png", "a").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty() {
        let image = ImageAsset::new(Vec::<u8>::new(), "image/png", "a.png");
        let err = image.validate().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_validate_rejects_non_image() {
        let image = ImageAsset::new(b"hello".to_vec(), "text/plain", "a.txt");
        let err = image.validate().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(err.to_string().contains("text/plain"));
    }

    #[test]
    fn test_from_path_sniffs_content() {
        let dir = tempfile::tempdir().unwrap();
        // Misleading extension: content wins
        let path = dir.path().join("photo.txt");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let image = ImageAsset::from_path(&path).unwrap();
        assert_eq!(image.media_type(), "image/png");
        assert_eq!(image.file_name(), "photo.txt");
    }

    #[test]
    fn test_from_path_falls_back_to_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.webp");
        std::fs::write(&path, b"not really").unwrap();
        assert_eq!(ImageAsset::from_path(&path).unwrap().media_type(), "image/webp");

        let path = dir.path().join("notes.md");
        std::fs::write(&path, b"# hi").unwrap();
        assert_eq!(
            ImageAsset::from_path(&path).unwrap().media_type(),
            UNKNOWN_MEDIA_TYPE
        );
    }

    #[test]
    fn test_failure_reason_keeps_category_and_status() {
        let reason = FailureReason::from(GenerationError::Service {
            status: 500,
            message: "boom".to_string(),
        });
        assert_eq!(reason.category, ErrorCategory::Service);
        assert_eq!(reason.status, Some(500));
        assert!(reason.message.contains("500"));
        assert!(reason.to_string().starts_with("[service]"));
    }

    #[test]
    fn test_failure_messages_are_distinct() {
        let errors = [
            GenerationError::Validation("x".into()),
            GenerationError::Network("x".into()),
            GenerationError::Service {
                status: 502,
                message: "x".into(),
            },
            GenerationError::MalformedResponse("x".into()),
            GenerationError::DownloadPrecondition,
        ];
        let messages: std::collections::HashSet<String> = errors
            .iter()
            .map(|e| FailureReason::from(e).message)
            .collect();
        assert_eq!(messages.len(), errors.len());
    }

    #[test]
    fn test_retryable() {
        assert!(GenerationError::Network("reset".into()).is_retryable());
        assert!(GenerationError::Service {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(!GenerationError::Service {
            status: 400,
            message: String::new()
        }
        .is_retryable());
        assert!(!GenerationError::MalformedResponse(String::new()).is_retryable());
    }
}
