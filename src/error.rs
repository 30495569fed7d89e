//! Error types for video generation.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum number of characters of a remote error body kept for display.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// The local validation constraint an input violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidInput {
    /// The image file does not exist or is not a regular file.
    NotFound(PathBuf),
    /// The file extension is not in the allowed set.
    UnsupportedFormat {
        /// Offending extension (lowercased, may be empty).
        extension: String,
        /// Extensions that would have been accepted.
        supported: Vec<String>,
    },
    /// The file is larger than the configured maximum.
    TooLarge {
        /// File size in bytes.
        size: u64,
        /// Configured maximum in bytes.
        max: u64,
    },
    /// Neither an image nor a prompt was supplied, or too many images.
    ImageCount(usize),
}

impl fmt::Display for InvalidInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "image file not found: {}", path.display()),
            Self::UnsupportedFormat {
                extension,
                supported,
            } => {
                let ext = if extension.is_empty() {
                    "(none)"
                } else {
                    extension
                };
                write!(
                    f,
                    "unsupported image format: {ext} (supported: {})",
                    supported.join(", ")
                )
            }
            Self::TooLarge { size, max } => write!(
                f,
                "image file too large: {:.2} MB ({size} bytes), max {:.0} MB ({max} bytes)",
                *size as f64 / (1024.0 * 1024.0),
                *max as f64 / (1024.0 * 1024.0),
            ),
            Self::ImageCount(n) => write!(f, "expected 1-2 images, got {n}"),
        }
    }
}

/// Errors that can occur during video generation.
#[derive(Debug, thiserror::Error)]
pub enum GenVideoError {
    /// A local input failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(InvalidInput),

    /// The prompt is missing or empty.
    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),

    /// Requested model does not exist in the catalog.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Required configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Server answered with a 4xx/5xx status.
    #[error("API error: {status} - {body}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request exceeded its time budget.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Request was cancelled before completion.
    #[error("request cancelled")]
    Cancelled,

    /// Malformed or incomplete in-flight data.
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Writing the video to disk failed.
    #[error("failed to save video to {}: {source}", .path.display())]
    Save {
        /// Path being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error outside of saving (e.g., reading a prompt or catalog file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of [`GenVideoError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local validation or usage problem.
    InvalidInput,
    /// Non-2xx status from the service.
    Remote,
    /// Network, timeout or cancellation.
    Transport,
    /// Malformed stream.
    Streaming,
    /// Disk failure.
    Save,
}

impl ErrorKind {
    /// Process exit code for this kind of failure.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::InvalidInput => 1,
            Self::Remote => 2,
            Self::Transport | Self::Streaming => 3,
            Self::Save => 4,
        }
    }
}

impl GenVideoError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidPrompt(_)
            | Self::ModelNotFound(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Json(_) => ErrorKind::InvalidInput,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Network(_) | Self::Timeout(_) | Self::Cancelled => ErrorKind::Transport,
            Self::Streaming(_) => ErrorKind::Streaming,
            Self::Save { .. } => ErrorKind::Save,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }

    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_))
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Timeout(_) => Some(Duration::from_secs(1)),
            Self::Network(_) => Some(Duration::from_secs(2)),
            _ => None,
        }
    }

    /// Short hint shown to the user next to the error message.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidInput(InvalidInput::TooLarge { .. }) => {
                Some("shrink the image or raise GENVIDEO_MAX_IMAGE_BYTES")
            }
            Self::InvalidInput(InvalidInput::UnsupportedFormat { .. }) => {
                Some("convert the image to JPEG, PNG or WebP")
            }
            Self::Remote { status: 401 | 403, .. } => Some("check GENVIDEO_API_TOKEN"),
            Self::Remote { status: 429, .. } => Some("rate limited, try again later"),
            Self::Timeout(_) => Some("raise --timeout or GENVIDEO_TIMEOUT_SECS"),
            Self::Config(_) => Some("set GENVIDEO_ENDPOINT and GENVIDEO_API_TOKEN"),
            Self::ModelNotFound(_) => Some("run `genvideo models` to list available models"),
            Self::Save { .. } => Some("check that the output directory is writable"),
            _ => None,
        }
    }

    pub(crate) fn streaming(msg: impl Into<String>) -> Self {
        Self::Streaming(msg.into())
    }
}

impl From<InvalidInput> for GenVideoError {
    fn from(err: InvalidInput) -> Self {
        Self::InvalidInput(err)
    }
}

/// Trims a remote error body and truncates it for display.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_ERROR_BODY_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}

/// Result type alias for video generation operations.
pub type Result<T> = std::result::Result<T, GenVideoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            GenVideoError::InvalidInput(InvalidInput::NotFound("a.jpg".into())).exit_code(),
            1
        );
        assert_eq!(GenVideoError::InvalidPrompt("empty".into()).exit_code(), 1);
        assert_eq!(
            GenVideoError::Remote {
                status: 401,
                body: "unauthorized".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(GenVideoError::Timeout(Duration::from_secs(5)).exit_code(), 3);
        assert_eq!(GenVideoError::streaming("bad frame").exit_code(), 3);
        assert_eq!(GenVideoError::Cancelled.exit_code(), 3);
        assert_eq!(
            GenVideoError::Save {
                path: "out/video.mp4".into(),
                source: std::io::Error::other("disk full"),
            }
            .exit_code(),
            4
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(GenVideoError::Timeout(Duration::from_secs(30)).is_retryable());

        assert!(!GenVideoError::Remote {
            status: 500,
            body: String::new()
        }
        .is_retryable());
        assert!(!GenVideoError::streaming("bad").is_retryable());
        assert!(!GenVideoError::Config("missing".into()).is_retryable());
    }

    #[test]
    fn test_retry_after() {
        let timeout = GenVideoError::Timeout(Duration::from_secs(30));
        assert_eq!(timeout.retry_after(), Some(Duration::from_secs(1)));

        let remote = GenVideoError::Remote {
            status: 503,
            body: String::new(),
        };
        assert_eq!(remote.retry_after(), None);
    }

    #[test]
    fn test_error_display() {
        let err = GenVideoError::Remote {
            status: 404,
            body: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = GenVideoError::InvalidInput(InvalidInput::TooLarge {
            size: 12 * 1024 * 1024,
            max: 10 * 1024 * 1024,
        });
        assert!(err.to_string().contains("too large: 12.00 MB"));
        assert!(err.to_string().contains("max 10 MB"));

        let err = GenVideoError::InvalidInput(InvalidInput::UnsupportedFormat {
            extension: "gif".into(),
            supported: vec!["jpg".into(), "png".into()],
        });
        assert_eq!(
            err.to_string(),
            "invalid input: unsupported image format: gif (supported: jpg, png)"
        );
    }

    #[test]
    fn test_sanitize_error_message() {
        assert_eq!(sanitize_error_message("  oops \n"), "oops");

        let long = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        let sanitized = sanitize_error_message(&long);
        assert_eq!(sanitized.len(), MAX_ERROR_BODY_CHARS + 3);
        assert!(sanitized.ends_with("..."));
    }
}
