//! Response format detection.

use crate::error::Result;
use crate::video::transport::ByteStream;
use crate::video::types::ResponseFormat;
use bytes::{Bytes, BytesMut};
use futures_util::{stream, StreamExt};
use reqwest::header::{HeaderMap, CONTENT_TYPE};

const SSE_FIELD_PREFIXES: &[&[u8]] = &[b"data:", b"event:", b"id:", b"retry:", b":"];

/// Decides how a response body must be assembled.
///
/// First match wins:
/// 1. `text/event-stream` content type.
/// 2. An absent or `text/plain` content type whose first chunk starts with
///    an SSE field.
/// 3. A first chunk whose first non-whitespace byte opens a JSON object or
///    array.
/// 4. Anything else is raw binary.
pub fn classify(headers: &HeaderMap, first_chunk: &[u8]) -> ResponseFormat {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(media_type);

    if content_type.as_deref() == Some("text/event-stream") {
        return ResponseFormat::EventStream;
    }

    let leading = trim_leading_whitespace(first_chunk);

    if matches!(content_type.as_deref(), None | Some("text/plain"))
        && SSE_FIELD_PREFIXES.iter().any(|p| leading.starts_with(p))
    {
        return ResponseFormat::EventStream;
    }

    if matches!(leading.first(), Some(b'{') | Some(b'[')) {
        return ResponseFormat::ChunkedJson;
    }

    ResponseFormat::RawBinary
}

/// Reads the start of `body` up to and including the first chunk holding
/// a non-whitespace byte.
///
/// Leading keep-alive chunks that are only whitespace are joined into the
/// returned prefix. The returned stream yields the prefix again before the
/// remainder, so no byte is lost to inspection. An empty body yields an
/// empty prefix.
pub async fn peek_first_chunk(mut body: ByteStream) -> Result<(Bytes, ByteStream)> {
    let mut prefix = BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        prefix.extend_from_slice(&chunk);
        if chunk.iter().any(|b| !b.is_ascii_whitespace()) {
            break;
        }
    }
    let first = prefix.freeze();
    let replay = prepend(first.clone(), body);
    Ok((first, replay))
}

/// Returns a stream yielding `first` (if non-empty) then `rest`.
pub fn prepend(first: Bytes, rest: ByteStream) -> ByteStream {
    let head = if first.is_empty() { None } else { Some(Ok(first)) };
    Box::pin(stream::iter(head).chain(rest))
}

fn media_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    // UTF-8 byte order mark
    let data = &data[start..];
    data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data)
}
