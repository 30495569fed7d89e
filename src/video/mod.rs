//! Video generation module.

pub mod assemble;
pub mod classify;
mod client;
pub mod persist;
mod progress;
mod provider;
pub mod transport;
mod types;

pub use client::{save_video, SavedVideo, VideoClient, VideoClientBuilder};
pub use persist::{generate_filename, save, VideoArtifact};
pub use progress::{ProgressReporter, ProgressSink};
pub use provider::{VideoProvider, VideoProviderExt};
pub use transport::{ByteStream, ResponseHandle, Transport};
pub use types::{
    GeneratedVideo, GenerationMode, GenerationRequest, Phase, ProgressEvent, ResponseFormat,
    VideoMetadata, MAX_IMAGES,
};
