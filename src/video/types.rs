//! Core types for video generation.

use crate::encoder::EncodedImage;
use crate::error::{GenVideoError, InvalidInput, Result};
use serde::Serialize;
use std::time::Duration;

/// Maximum number of input images (first and last frame).
pub const MAX_IMAGES: usize = 2;

/// Kind of generation a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GenerationMode {
    /// Text-to-video.
    #[serde(rename = "t2v")]
    TextToVideo,
    /// Image-to-video.
    #[serde(rename = "i2v")]
    ImageToVideo,
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextToVideo => write!(f, "t2v"),
            Self::ImageToVideo => write!(f, "i2v"),
        }
    }
}

/// Wire format of a generation response, decided once per response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// The body is the video itself.
    RawBinary,
    /// Server-sent events.
    EventStream,
    /// JSON frames, newline-delimited or a single array.
    ChunkedJson,
}

impl std::fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RawBinary => write!(f, "raw-binary"),
            Self::EventStream => write!(f, "event-stream"),
            Self::ChunkedJson => write!(f, "chunked-json"),
        }
    }
}

/// A request to generate a video. Consumed once per invocation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    images: Vec<EncodedImage>,
    prompt: String,
    model: String,
    timeout: Option<Duration>,
}

impl GenerationRequest {
    /// Creates a text-to-video request.
    pub fn text_to_video(prompt: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(GenVideoError::InvalidPrompt(
                "prompt cannot be empty for text-to-video".into(),
            ));
        }
        Ok(Self {
            images: Vec::new(),
            prompt,
            model: model.into(),
            timeout: None,
        })
    }

    /// Creates an image-to-video request from one or two images.
    ///
    /// The prompt may be empty when images are given.
    pub fn image_to_video(
        images: Vec<EncodedImage>,
        prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        if images.is_empty() || images.len() > MAX_IMAGES {
            return Err(InvalidInput::ImageCount(images.len()).into());
        }
        Ok(Self {
            images,
            prompt: prompt.into(),
            model: model.into(),
            timeout: None,
        })
    }

    /// Overrides the configured timeout for this request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The encoded input images, in frame order.
    pub fn images(&self) -> &[EncodedImage] {
        &self.images
    }

    /// The text prompt.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Per-request timeout, if set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Text-to-video or image-to-video.
    pub fn mode(&self) -> GenerationMode {
        if self.images.is_empty() {
            GenerationMode::TextToVideo
        } else {
            GenerationMode::ImageToVideo
        }
    }
}

/// Stage of a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Request sent, waiting for the first byte.
    Connecting,
    /// Body is streaming in.
    Receiving,
    /// Body complete, assembling the artifact.
    Finalizing,
}

/// A progress snapshot emitted while a response is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// Video bytes received so far.
    pub bytes_received: u64,
    /// Expected total, when the server announced one.
    pub total_bytes: Option<u64>,
    /// Percentage reported by the server, if any (0-100).
    pub percent: Option<u8>,
    /// Current phase.
    pub phase: Phase,
}

impl ProgressEvent {
    /// The initial event, before any byte arrives.
    pub fn connecting() -> Self {
        Self {
            bytes_received: 0,
            total_bytes: None,
            percent: None,
            phase: Phase::Connecting,
        }
    }

    /// Best-known completion percentage.
    ///
    /// Prefers the server-reported value, then bytes over a known total.
    /// `Finalizing` is always 100.
    pub fn effective_percent(&self) -> Option<u8> {
        if self.phase == Phase::Finalizing {
            return Some(100);
        }
        if let Some(p) = self.percent {
            return Some(p.min(100));
        }
        match self.total_bytes {
            Some(total) if total > 0 => {
                let pct = self.bytes_received.saturating_mul(100) / total;
                Some(pct.min(100) as u8)
            }
            _ => None,
        }
    }
}

/// Metadata about the video generation process.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VideoMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// Wire format the response arrived in.
    pub response_format: Option<ResponseFormat>,
    /// URL the video was downloaded from, when the stream referenced one.
    pub source_url: Option<String>,
}

/// A generated video with its data and metadata.
#[derive(Debug, Clone)]
pub struct GeneratedVideo {
    /// Raw video bytes.
    pub data: Vec<u8>,
    /// MIME type (e.g., "video/mp4").
    pub mime_type: String,
    /// Generation metadata.
    pub metadata: VideoMetadata,
}

impl GeneratedVideo {
    /// Creates a new generated video.
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>, metadata: VideoMetadata) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            metadata,
        }
    }

    /// Returns the size of the video data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
