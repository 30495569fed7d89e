#![warn(missing_docs)]
//! genvideo - Generate videos from text and images via streaming AI APIs.
//!
//! The client submits a prompt and up to two images to a chat-completions
//! style endpoint and streams the answer to disk. Servers answer in one of
//! three shapes, detected at runtime from the headers and the first chunk:
//! a raw binary body, a server-sent event stream, or chunked JSON frames.
//! All three are reassembled into the same complete video while progress
//! is reported.
//!
//! # Quick Start - Text to Video
//!
//! ```no_run
//! use genvideo::{Config, GenerationRequest, ProgressReporter, VideoClient};
//!
//! #[tokio::main]
//! async fn main() -> genvideo::Result<()> {
//!     let config = Config::builder().build()?; // GENVIDEO_ENDPOINT, GENVIDEO_API_TOKEN
//!     let client = VideoClient::builder().config(config).build()?;
//!     let request = GenerationRequest::text_to_video(
//!         "A lighthouse in a storm",
//!         "veo_3_1_t2v_fast_landscape",
//!     )?;
//!     let saved = client
//!         .generate_to_dir(&request, None, &mut ProgressReporter::new())
//!         .await?;
//!     println!("saved {}", saved.path.display());
//!     Ok(())
//! }
//! ```
//!
//! # Quick Start - Image to Video
//!
//! ```no_run
//! use genvideo::{encode_image, Config, GenerationRequest, VideoClient};
//!
//! #[tokio::main]
//! async fn main() -> genvideo::Result<()> {
//!     let config = Config::builder().build()?;
//!     let first = encode_image("first.jpg", config.image_limits())?;
//!     let last = encode_image("last.jpg", config.image_limits())?;
//!     let request =
//!         GenerationRequest::image_to_video(vec![first, last], "ocean to city", "veo_3_1_i2v_s_fast_fl")?;
//!     let client = VideoClient::new(config)?;
//!     let video = client.generate(&request, &mut ()).await?;
//!     println!("{} bytes", video.size());
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `genvideo` command-line tool

pub mod config;
pub mod encoder;
mod error;
pub mod models;
pub mod video;

// Re-export error types at crate root
pub use error::{ErrorKind, GenVideoError, InvalidInput, Result};

pub use config::{Config, ConfigBuilder, ImageLimits};
pub use encoder::{encode_image, EncodedImage, ImageFormat};
pub use models::{ModelCatalog, ModelCategory, ModelInfo, ModelSelector, Orientation};
pub use video::{
    GeneratedVideo, GenerationMode, GenerationRequest, Phase, ProgressEvent, ProgressReporter,
    ProgressSink, ResponseFormat, SavedVideo, VideoClient, VideoClientBuilder, VideoMetadata,
    VideoProvider, VideoProviderExt,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{GenVideoError, Result};
    pub use crate::video::{
        GeneratedVideo, GenerationRequest, ProgressReporter, ProgressSink, VideoClient,
        VideoProvider, VideoProviderExt,
    };
}
