//! Image encoding for image-to-video requests.

use crate::config::ImageLimits;
use crate::error::{InvalidInput, Result};
use base64::Engine;
use std::path::Path;

/// Supported input image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG format.
    Png,
    /// JPEG format.
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }
        None
    }
}

/// An image ready for inclusion in a JSON request body.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    base64: String,
    format: ImageFormat,
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("format", &self.format)
            .field("base64_len", &self.base64.len())
            .finish()
    }
}

impl EncodedImage {
    /// Wraps already-encoded base64 text.
    pub fn from_base64(base64: impl Into<String>, format: ImageFormat) -> Self {
        Self {
            base64: base64.into(),
            format,
        }
    }

    /// Encodes raw image bytes.
    pub fn from_bytes(data: &[u8], format: ImageFormat) -> Self {
        Self::from_base64(
            base64::engine::general_purpose::STANDARD.encode(data),
            format,
        )
    }

    /// The standard base64 text.
    pub fn as_base64(&self) -> &str {
        &self.base64
    }

    /// The image format.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.mime_type(), self.base64)
    }
}

/// Validates and base64-encodes the image at `path`.
///
/// Checks, in order: the file exists, its extension is allowed, and its
/// size (from metadata, before reading) is within `limits.max_size`.
pub fn encode_image(path: impl AsRef<Path>, limits: &ImageLimits) -> Result<EncodedImage> {
    let path = path.as_ref();

    let metadata = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return Err(InvalidInput::NotFound(path.to_path_buf()).into()),
    };

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let format = match ImageFormat::from_extension(&extension) {
        Some(format) if limits.allows_extension(&extension) => format,
        _ => {
            return Err(InvalidInput::UnsupportedFormat {
                extension,
                supported: limits.allowed_extensions.clone(),
            }
            .into())
        }
    };

    let size = metadata.len();
    if size > limits.max_size {
        return Err(InvalidInput::TooLarge {
            size,
            max: limits.max_size,
        }
        .into());
    }

    let data = std::fs::read(path)?;
    if ImageFormat::from_magic_bytes(&data).is_some_and(|detected| detected != format) {
        tracing::warn!(
            path = %path.display(),
            "image content does not match its extension"
        );
    }
    tracing::debug!(path = %path.display(), bytes = data.len(), "encoded image");

    Ok(EncodedImage::from_bytes(&data, format))
}
