//! Video provider trait and utilities.

use crate::error::Result;
use crate::video::progress::ProgressSink;
use crate::video::types::{GeneratedVideo, GenerationRequest};
use async_trait::async_trait;
use std::time::Duration;

/// Trait for video generation backends.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Generates a video from the given request, reporting progress to `sink`.
    async fn generate(
        &self,
        request: &GenerationRequest,
        sink: &mut (dyn ProgressSink + Send),
    ) -> Result<GeneratedVideo>;

    /// The endpoint requests are sent to.
    fn endpoint(&self) -> &str;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        "genvideo"
    }
}

/// Extension trait for providers with retry logic.
///
/// Each attempt is a fresh request; nothing from a failed attempt is
/// reused or written to disk.
#[async_trait]
pub trait VideoProviderExt: VideoProvider {
    /// Generates with automatic retries on transient failures.
    async fn generate_with_retries(
        &self,
        request: &GenerationRequest,
        sink: &mut (dyn ProgressSink + Send),
        max_retries: u32,
    ) -> Result<GeneratedVideo> {
        let mut attempt = 0;
        loop {
            match self.generate(request, &mut *sink).await {
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let delay = e.retry_after().unwrap_or(Duration::from_secs(1));
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

impl<T: VideoProvider + ?Sized> VideoProviderExt for T {}
