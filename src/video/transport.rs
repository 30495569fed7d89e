//! HTTP transport for the generation endpoint.

use crate::config::Config;
use crate::error::{sanitize_error_message, GenVideoError, Result};
use crate::video::types::GenerationRequest;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use serde::Serialize;
use std::pin::Pin;
use std::time::Duration;

/// A single-use, in-order stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A response whose body has not been read yet.
pub struct ResponseHandle {
    status: u16,
    headers: HeaderMap,
    body: ByteStream,
}

impl std::fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseHandle")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl ResponseHandle {
    /// Builds a handle from parts.
    pub fn new(status: u16, headers: HeaderMap, body: ByteStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Value of the Content-Length header, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    }

    /// Value of the Content-Type header, lowercased.
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_lowercase())
    }

    /// Takes the body. The stream can only be read once.
    pub fn into_body(self) -> ByteStream {
        self.body
    }

    /// Splits into headers and body.
    pub fn into_parts(self) -> (HeaderMap, ByteStream) {
        (self.headers, self.body)
    }
}

/// Owns the HTTP client, credentials and timeout policy.
#[derive(Clone)]
pub struct Transport {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
    timeout: Duration,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Creates a transport from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout())
            .user_agent(concat!("genvideo/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint().to_string(),
            api_token: config.api_token().to_string(),
            timeout: config.timeout(),
        })
    }

    /// Default timeout applied when a request does not carry its own.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends a generation request and returns the unread response.
    ///
    /// A 4xx/5xx status is returned as [`GenVideoError::Remote`] with the
    /// body captured. Nothing is retried.
    pub async fn send(&self, request: &GenerationRequest) -> Result<ResponseHandle> {
        let timeout = request.timeout().unwrap_or(self.timeout);
        let body = ChatCompletionRequest::from_request(request);

        tracing::info!(
            endpoint = %self.endpoint,
            model = %request.model(),
            mode = %request.mode(),
            images = request.images().len(),
            "sending generation request"
        );
        tracing::debug!(prompt = %request.prompt(), "prompt");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .header(CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        into_handle(response, timeout).await
    }

    /// Fetches a video referenced by URL in a response frame.
    pub async fn download(&self, url: &str, timeout: Duration) -> Result<ResponseHandle> {
        tracing::info!("downloading video from referenced URL");
        tracing::debug!(url = %url, "download URL");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        into_handle(response, timeout).await
    }
}

async fn into_handle(response: reqwest::Response, timeout: Duration) -> Result<ResponseHandle> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let text = response.text().await.unwrap_or_default();
        let body = sanitize_error_message(&text);
        tracing::error!(status = status.as_u16(), body = %body, "request failed");
        return Err(GenVideoError::Remote {
            status: status.as_u16(),
            body,
        });
    }

    tracing::debug!(
        status = status.as_u16(),
        content_type = ?response.headers().get(CONTENT_TYPE),
        content_length = ?response.content_length(),
        "response received"
    );

    let headers = response.headers().clone();
    let body = response
        .bytes_stream()
        .map(move |chunk| chunk.map_err(|e| map_reqwest_error(e, timeout)));

    Ok(ResponseHandle::new(status.as_u16(), headers, Box::pin(body)))
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> GenVideoError {
    if err.is_timeout() {
        GenVideoError::Timeout(timeout)
    } else {
        GenVideoError::Network(err)
    }
}

// Request types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    ImageUrl { image_url: ImageUrl },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

impl<'a> ChatCompletionRequest<'a> {
    fn from_request(req: &'a GenerationRequest) -> Self {
        let mut content: Vec<ContentPart<'a>> = req
            .images()
            .iter()
            .map(|image| ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image.to_data_url(),
                },
            })
            .collect();
        content.push(ContentPart::Text { text: req.prompt() });

        Self {
            model: req.model(),
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            stream: true,
        }
    }
}
