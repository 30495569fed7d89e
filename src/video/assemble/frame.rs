//! Interpretation of JSON frames shared by the event-stream and chunked-JSON
//! assemblers.

use super::{Assembled, Progress, Step};
use crate::error::{GenVideoError, Result};
use base64::Engine;
use serde_json::{Map, Value};
use std::sync::LazyLock;

const DATA_FIELDS: &[&str] = &[
    "video",
    "data",
    "video_data",
    "video_content",
    "file",
    "binary",
    "base64",
];

const URL_FIELDS: &[&str] = &["url", "video_url", "download_url", "file_url", "uri"];

const PROGRESS_FIELDS: &[&str] = &["progress", "percent", "percentage"];

const DONE_STATUSES: &[&str] = &["completed", "complete", "succeeded", "success", "done"];

static VIDEO_TAG: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r#"<video[^>]+src=['"]([^'"]+)['"]"#).expect("valid video tag regex")
});

/// What a single frame contributed.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Frame {
    pub percent: Option<u8>,
    pub total: Option<u64>,
    pub data: Vec<u8>,
    pub url: Option<String>,
    pub error: Option<String>,
    pub done: bool,
}

impl Frame {
    /// Interprets a JSON value as a frame.
    ///
    /// Fails only when a field that must carry video bytes cannot be decoded.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut frame = Frame::default();
        match value {
            Value::Object(map) => frame.read_object(map)?,
            // A bare number is a percentage.
            Value::Number(_) => frame.percent = parse_percent(value),
            _ => {}
        }
        Ok(frame)
    }

    fn read_object(&mut self, map: &Map<String, Value>) -> Result<()> {
        if let Some(error) = map.get("error").and_then(error_message) {
            self.error = Some(error);
        }

        for field in PROGRESS_FIELDS {
            if let Some(v) = map.get(*field) {
                if let Some(p) = parse_percent(v) {
                    self.percent = Some(p);
                    break;
                }
                return Err(GenVideoError::streaming(format!(
                    "invalid {field} value: {v}"
                )));
            }
        }
        if let Some(n) = map
            .get("total")
            .or_else(|| map.get("total_bytes"))
            .and_then(Value::as_u64)
        {
            self.total = Some(n);
        }

        if map.get("done") == Some(&Value::Bool(true)) {
            self.done = true;
        }
        if let Some(status) = map.get("status").and_then(Value::as_str) {
            let status = status.to_ascii_lowercase();
            if DONE_STATUSES.contains(&status.as_str()) {
                self.done = true;
            } else if status == "failed" || status == "error" {
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("generation failed");
                self.error.get_or_insert_with(|| message.to_string());
            }
        }

        // URLs take precedence over inline data, as in the service's own
        // clients.
        for field in URL_FIELDS {
            if let Some(url) = map.get(*field).and_then(Value::as_str).and_then(extract_url) {
                self.url = Some(url);
                break;
            }
        }
        if self.url.is_none() {
            if let Some(url) = map.get("content").and_then(Value::as_str).and_then(extract_url) {
                self.url = Some(url);
            }
        }

        if self.url.is_none() {
            for field in DATA_FIELDS {
                match map.get(*field) {
                    Some(Value::String(s)) if !s.is_empty() => {
                        self.data.extend(decode_payload(s)?);
                        break;
                    }
                    Some(Value::Object(nested)) => {
                        self.read_object(nested)?;
                        break;
                    }
                    _ => {}
                }
            }
        }

        if let Some(Value::Array(choices)) = map.get("choices") {
            for choice in choices {
                let Value::Object(choice) = choice else {
                    continue;
                };
                for key in ["delta", "message"] {
                    if let Some(Value::Object(inner)) = choice.get(key) {
                        self.read_object(inner)?;
                    }
                }
                if choice
                    .get("finish_reason")
                    .and_then(Value::as_str)
                    .is_some_and(|r| r == "stop")
                {
                    self.done = true;
                }
            }
        }

        Ok(())
    }
}

/// Accumulated state of a frame-based stream.
#[derive(Debug, Default)]
pub(crate) struct FrameState {
    pub data: Vec<u8>,
    pub url: Option<String>,
    pub percent: Option<u8>,
    pub total: Option<u64>,
    pub done: bool,
}

impl FrameState {
    /// Folds a frame into the state.
    ///
    /// An embedded error aborts the stream; a terminal frame ends it.
    pub fn apply(&mut self, frame: Frame) -> Result<Step> {
        if let Some(error) = frame.error {
            return Err(GenVideoError::streaming(format!(
                "server reported error: {error}"
            )));
        }
        if let Some(p) = frame.percent {
            self.percent = Some(p);
        }
        if let Some(total) = frame.total {
            self.total = Some(total);
        }
        if !frame.data.is_empty() {
            tracing::debug!(bytes = frame.data.len(), "received video data frame");
            self.data.extend(frame.data);
        }
        if let Some(url) = frame.url {
            tracing::debug!("frame references video URL");
            self.url = Some(url);
        }
        if frame.done {
            self.done = true;
            return Ok(Step::Terminal);
        }
        Ok(Step::Continue)
    }

    pub fn progress(&self) -> Progress {
        Progress {
            bytes: self.data.len() as u64,
            total: self.total,
            percent: self.percent,
        }
    }

    /// Final result, failing when the stream carried no video at all.
    pub fn into_assembled(self, what: &str) -> Result<Assembled> {
        if self.data.is_empty() && self.url.is_none() {
            return Err(GenVideoError::streaming(format!(
                "no video data found in {what}"
            )));
        }
        if !self.done {
            tracing::warn!("{what} ended without a terminal event");
        }
        Ok(Assembled {
            data: self.data,
            video_url: self.url,
        })
    }
}

/// Decodes a base64 (standard or URL-safe) or hex video payload.
pub(crate) fn decode_payload(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    let text = match text.find(";base64,") {
        Some(idx) if text.starts_with("data:") => &text[idx + ";base64,".len()..],
        _ => text,
    };
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
    if let Ok(bytes) = STANDARD.decode(&compact) {
        return Ok(bytes);
    }
    if let Ok(bytes) = hex::decode(&compact) {
        return Ok(bytes);
    }
    if let Ok(bytes) = URL_SAFE
        .decode(&compact)
        .or_else(|_| URL_SAFE_NO_PAD.decode(&compact))
    {
        return Ok(bytes);
    }
    Err(GenVideoError::streaming(format!(
        "video payload is neither base64 nor hex ({} chars)",
        compact.len()
    )))
}

/// Parses a percentage from a number (0-100, or a 0.0-1.0 fraction) or a
/// string such as `"40%"`.
pub(crate) fn parse_percent(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => {
            let f = n.as_f64()?;
            if n.is_f64() && (0.0..=1.0).contains(&f) && f.fract() != 0.0 {
                f * 100.0
            } else {
                f
            }
        }
        Value::String(s) => {
            let text = s.trim();
            match text.strip_suffix('%') {
                Some(pct) => pct.trim().parse::<f64>().ok()?,
                // Bare numbers scale like JSON numbers.
                None => {
                    return match serde_json::from_str::<Value>(text) {
                        Ok(number @ Value::Number(_)) => parse_percent(&number),
                        _ => None,
                    }
                }
            }
        }
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.clamp(0.0, 100.0).round() as u8)
}

fn error_message(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => Some(
            map.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
        ),
        other => Some(other.to_string()),
    }
}

/// Extracts a video URL from a plain URL or an HTML `<video src=...>` tag.
pub(crate) fn extract_url(text: &str) -> Option<String> {
    if let Some(caps) = VIDEO_TAG.captures(text) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    let text = text.trim();
    if text.starts_with("http://") || text.starts_with("https://") {
        return Some(text.to_string());
    }
    None
}
