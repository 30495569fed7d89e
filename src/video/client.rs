//! Generation client: send, classify, assemble, persist.

use crate::config::Config;
use crate::error::{GenVideoError, Result};
use crate::video::assemble::{assemble, Assembled};
use crate::video::classify::{classify, peek_first_chunk};
use crate::video::persist::VideoArtifact;
use crate::video::progress::ProgressSink;
use crate::video::provider::VideoProvider;
use crate::video::transport::{ResponseHandle, Transport};
use crate::video::types::{
    GeneratedVideo, GenerationRequest, Phase, ProgressEvent, ResponseFormat, VideoMetadata,
};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const DEFAULT_MIME_TYPE: &str = "video/mp4";

/// Builder for [`VideoClient`].
#[derive(Debug, Clone, Default)]
pub struct VideoClientBuilder {
    config: Option<Config>,
}

impl VideoClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an explicit configuration. Without one, the configuration is
    /// resolved from `GENVIDEO_*` environment variables.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the client.
    pub fn build(self) -> Result<VideoClient> {
        let config = match self.config {
            Some(config) => config,
            None => Config::builder().build()?,
        };
        VideoClient::new(config)
    }
}

/// A video written to disk.
#[derive(Debug, Clone, Serialize)]
pub struct SavedVideo {
    /// Final file path.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: usize,
    /// Generation metadata.
    pub metadata: VideoMetadata,
}

/// Client for a streaming video-generation endpoint.
///
/// One call to [`generate`](Self::generate) performs one request. The
/// response body is classified from its headers and first chunk, then
/// reassembled by the matching assembler while progress is reported.
#[derive(Debug, Clone)]
pub struct VideoClient {
    transport: Transport,
    config: Config,
}

impl VideoClient {
    /// Creates a new `VideoClientBuilder`.
    pub fn builder() -> VideoClientBuilder {
        VideoClientBuilder::new()
    }

    /// Creates a client from configuration.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(&config)?,
            config,
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Generates a video, reporting progress to `sink`.
    ///
    /// The request's timeout (or the configured one) bounds the whole
    /// exchange, including any download of a URL-referenced video.
    pub async fn generate<S>(&self, request: &GenerationRequest, sink: &mut S) -> Result<GeneratedVideo>
    where
        S: ProgressSink + Send + ?Sized,
    {
        let timeout = request.timeout().unwrap_or(self.transport.timeout());
        let start = Instant::now();
        sink.on_progress(&ProgressEvent::connecting());

        let (assembled, format, source_url) =
            match tokio::time::timeout(timeout, self.exchange(request, timeout, start, sink)).await {
                Ok(result) => result?,
                Err(_) => {
                    tracing::warn!(timeout_secs = timeout.as_secs_f64(), "generation timed out");
                    return Err(GenVideoError::Timeout(timeout));
                }
            };

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            bytes = assembled.data.len(),
            format = %format,
            duration_ms,
            "video generation complete"
        );

        Ok(GeneratedVideo::new(
            assembled.data,
            DEFAULT_MIME_TYPE,
            VideoMetadata {
                model: Some(request.model().to_string()),
                duration_ms: Some(duration_ms),
                response_format: Some(format),
                source_url,
            },
        ))
    }

    /// Generates a video and writes it to `output_dir`, or to the
    /// configured output directory.
    ///
    /// Nothing is written unless generation succeeded.
    pub async fn generate_to_dir<S>(
        &self,
        request: &GenerationRequest,
        output_dir: Option<&Path>,
        sink: &mut S,
    ) -> Result<SavedVideo>
    where
        S: ProgressSink + Send + ?Sized,
    {
        let video = self.generate(request, sink).await?;
        let dir = output_dir.unwrap_or(self.config.output_dir());
        save_video(video, dir)
    }

    async fn exchange<S>(
        &self,
        request: &GenerationRequest,
        timeout: Duration,
        start: Instant,
        sink: &mut S,
    ) -> Result<(Assembled, ResponseFormat, Option<String>)>
    where
        S: ProgressSink + Send + ?Sized,
    {
        let handle = self.transport.send(request).await?;
        let (format, assembled) = consume(handle, &mut FinalGate::new(sink)).await?;

        match assembled.video_url.clone() {
            Some(url) if assembled.data.is_empty() => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(GenVideoError::streaming(format!(
                        "response referenced a non-http video URL: {url}"
                    )));
                }
                let remaining = timeout.saturating_sub(start.elapsed());
                let handle = self.transport.download(&url, remaining).await?;
                let content_length = handle.content_length();
                let downloaded = assemble(
                    ResponseFormat::RawBinary,
                    handle.into_body(),
                    content_length,
                    sink,
                )
                .await?;
                Ok((downloaded, format, Some(url)))
            }
            _ => {
                sink.on_progress(&ProgressEvent {
                    bytes_received: assembled.data.len() as u64,
                    total_bytes: None,
                    percent: None,
                    phase: Phase::Finalizing,
                });
                Ok((assembled, format, None))
            }
        }
    }
}

/// Classifies and assembles one response body.
async fn consume<S>(handle: ResponseHandle, sink: &mut S) -> Result<(ResponseFormat, Assembled)>
where
    S: ProgressSink + ?Sized,
{
    let content_length = handle.content_length();
    let (headers, body) = handle.into_parts();
    let (first, body) = peek_first_chunk(body).await?;
    let format = classify(&headers, &first);
    tracing::info!(%format, content_length = ?content_length, "response format detected");

    let assembled = assemble(format, body, content_length, sink).await?;
    Ok((format, assembled))
}

/// Writes a generated video with a fresh name under `dir`.
pub fn save_video(video: GeneratedVideo, dir: &Path) -> Result<SavedVideo> {
    let size = video.size();
    let path = VideoArtifact::new(video.data, dir).persist()?;
    Ok(SavedVideo {
        path,
        size,
        metadata: video.metadata,
    })
}

/// Forwards progress but holds back the `Finalizing` event, which the
/// caller emits once the final bytes are known.
struct FinalGate<'a, S: ?Sized> {
    inner: &'a mut S,
}

impl<'a, S: ProgressSink + ?Sized> FinalGate<'a, S> {
    fn new(inner: &'a mut S) -> Self {
        Self { inner }
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for FinalGate<'_, S> {
    fn on_progress(&mut self, event: &ProgressEvent) {
        if event.phase != Phase::Finalizing {
            self.inner.on_progress(event);
        }
    }
}

#[async_trait]
impl VideoProvider for VideoClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
        sink: &mut (dyn ProgressSink + Send),
    ) -> Result<GeneratedVideo> {
        VideoClient::generate(self, request, sink).await
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint()
    }
}
