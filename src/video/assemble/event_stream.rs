//! Server-sent event streams.

use super::frame::{decode_payload, parse_percent, Frame, FrameState};
use super::{Assembled, Assembler, Progress, Step};
use crate::error::{GenVideoError, Result};
use crate::video::types::ResponseFormat;
use serde_json::Value;

/// Marker some services send as the final `data:` of an unnamed event.
const DONE_MARKER: &str = "[DONE]";

/// Parses `text/event-stream` records and reassembles the video they carry.
#[derive(Debug, Default)]
pub struct EventStreamAssembler {
    line: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    has_data: bool,
    records: usize,
    state: FrameState,
}

impl EventStreamAssembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    fn process_line(&mut self, raw: &[u8]) -> Result<Step> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.is_empty() {
            return self.dispatch();
        }
        let line = std::str::from_utf8(raw).map_err(|_| {
            GenVideoError::streaming(format!(
                "event stream record {} is not valid UTF-8",
                self.records + 1
            ))
        })?;

        if line.starts_with(':') {
            return Ok(Step::Continue);
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data.push(value.to_string());
                self.has_data = true;
            }
            _ => {}
        }
        Ok(Step::Continue)
    }

    fn dispatch(&mut self) -> Result<Step> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data).join("\n");
        let has_data = std::mem::replace(&mut self.has_data, false);
        if event.is_none() && !has_data {
            return Ok(Step::Continue);
        }
        self.records += 1;

        let name = event.as_deref().unwrap_or("message");
        tracing::trace!(event = name, len = data.len(), "event stream record");

        match name {
            "progress" => {
                let frame = match data.trim() {
                    "" => return Ok(Step::Continue),
                    text if text.starts_with('{') => Frame::from_value(&self.parse_json(text)?)?,
                    text => Frame {
                        percent: Some(parse_percent(&Value::String(text.to_string())).ok_or_else(
                            || {
                                GenVideoError::streaming(format!(
                                    "invalid progress value in record {}: {text:?}",
                                    self.records
                                ))
                            },
                        )?),
                        ..Frame::default()
                    },
                };
                self.state.apply(frame)
            }
            "data" | "chunk" | "video" => {
                let frame = self.payload_frame(&data)?;
                self.state.apply(frame)
            }
            "done" | "complete" | "completed" | "end" | "finish" => {
                let mut frame = match data.trim() {
                    "" | DONE_MARKER => Frame::default(),
                    _ => self.payload_frame(&data)?,
                };
                frame.done = true;
                self.state.apply(frame)
            }
            "error" => {
                let message = match serde_json::from_str::<Value>(data.trim()) {
                    Ok(Value::Object(map)) => map
                        .get("message")
                        .or_else(|| map.get("error"))
                        .map(|v| match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .unwrap_or_else(|| data.clone()),
                    _ => data.trim().to_string(),
                };
                Err(GenVideoError::streaming(format!(
                    "server reported error: {message}"
                )))
            }
            "message" => {
                let text = data.trim();
                if text == DONE_MARKER {
                    self.state.done = true;
                    return Ok(Step::Terminal);
                }
                if text.is_empty() {
                    return Ok(Step::Continue);
                }
                let frame = Frame::from_value(&self.parse_json(text)?)?;
                self.state.apply(frame)
            }
            other => {
                tracing::debug!(event = other, "ignoring unrecognized event type");
                Ok(Step::Continue)
            }
        }
    }

    fn payload_frame(&self, data: &str) -> Result<Frame> {
        let text = data.trim();
        if text.starts_with('{') {
            return Frame::from_value(&self.parse_json(text)?);
        }
        Ok(Frame {
            data: decode_payload(text)?,
            ..Frame::default()
        })
    }

    fn parse_json(&self, text: &str) -> Result<Value> {
        serde_json::from_str(text).map_err(|e| {
            GenVideoError::streaming(format!(
                "malformed JSON in event stream record {}: {e}",
                self.records
            ))
        })
    }
}

impl Assembler for EventStreamAssembler {
    fn format(&self) -> ResponseFormat {
        ResponseFormat::EventStream
    }

    fn push(&mut self, chunk: &[u8]) -> Result<Step> {
        self.line.extend_from_slice(chunk);
        let mut start = 0;
        let mut step = Step::Continue;
        while let Some(pos) = self.line[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let line = self.line[start..end].to_vec();
            start = end + 1;
            step = self.process_line(&line)?;
            if step == Step::Terminal {
                break;
            }
        }
        self.line.drain(..start);
        Ok(step)
    }

    fn progress(&self) -> Progress {
        self.state.progress()
    }

    fn finish(mut self: Box<Self>) -> Result<Assembled> {
        if !self.state.done {
            let rest = std::mem::take(&mut self.line);
            if !rest.is_empty() && self.process_line(&rest)? == Step::Terminal {
                return self.state.into_assembled("event stream");
            }
            if self.dispatch()? == Step::Terminal {
                return self.state.into_assembled("event stream");
            }
        }
        self.state.into_assembled("event stream")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn b64(data: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(data)
    }

    fn run(wire: &[u8], chunk: usize) -> Result<Assembled> {
        let mut asm = Box::new(EventStreamAssembler::new());
        for piece in wire.chunks(chunk.max(1)) {
            if asm.push(piece)? == Step::Terminal {
                break;
            }
        }
        asm.finish()
    }

    #[test]
    fn test_progress_then_embedded_terminal_data() {
        let video = vec![42u8; 4096];
        let wire = format!(
            "event: progress\ndata: 10\n\n\
             event: progress\ndata: {{\"progress\": 40}}\n\n\
             event: progress\ndata: 90%\n\n\
             event: done\ndata: {{\"data\": \"{}\"}}\n\n",
            b64(&video)
        );
        let assembled = run(wire.as_bytes(), 64).unwrap();
        assert_eq!(assembled.data, video);
    }

    #[test]
    fn test_progress_is_tracked() {
        let mut asm = EventStreamAssembler::new();
        asm.push(b"event: progress\ndata: 40\n\n").unwrap();
        assert_eq!(asm.progress().percent, Some(40));
        assert_eq!(asm.progress().bytes, 0);
    }

    #[test]
    fn test_fractional_progress_scales_like_json() {
        let mut bare = EventStreamAssembler::new();
        bare.push(b"event: progress\ndata: 0.5\n\n").unwrap();
        let mut object = EventStreamAssembler::new();
        object.push(b"event: progress\ndata: {\"progress\": 0.5}\n\n").unwrap();
        assert_eq!(bare.progress().percent, Some(50));
        assert_eq!(object.progress().percent, Some(50));

        let mut suffixed = EventStreamAssembler::new();
        suffixed.push(b"event: progress\ndata: 0.5%\n\n").unwrap();
        assert_eq!(suffixed.progress().percent, Some(1));
    }

    #[test]
    fn test_boundaries_do_not_matter() {
        let wire = format!(
            "event: chunk\r\ndata: {}\r\n\r\nevent: chunk\r\ndata: {}\r\n\r\nevent: end\r\n\r\n",
            b64(b"hello "),
            b64(b"world")
        );
        for size in [1, 2, 3, 7, 16, 1024] {
            assert_eq!(run(wire.as_bytes(), size).unwrap().data, b"hello world");
        }
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let wire = ": keep-alive\nid: 1\nretry: 1000\nevent: data\ndata: {\"data\":\ndata: \"QUJD\"}\n\nevent: done\n\n";
        assert_eq!(run(wire.as_bytes(), 5).unwrap().data, b"ABC");
    }

    #[test]
    fn test_unrecognized_events_are_ignored() {
        let wire = format!(
            "event: heartbeat\ndata: ???\n\nevent: data\ndata: {}\n\nevent: telemetry\ndata: {{}}\n\nevent: done\n\n",
            b64(b"ok")
        );
        assert_eq!(run(wire.as_bytes(), 8).unwrap().data, b"ok");
    }

    #[test]
    fn test_openai_style_chunks() {
        let wire = format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"Generating\"}}}}]}}\n\n\
             data: {{\"choices\":[{{\"delta\":{{\"video\":\"{}\"}}}}]}}\n\n\
             data: [DONE]\n\n",
            b64(b"frames")
        );
        assert_eq!(run(wire.as_bytes(), 13).unwrap().data, b"frames");
    }

    #[test]
    fn test_url_reference() {
        let wire = "data: {\"choices\":[{\"delta\":{\"content\":\"<video src='https://cdn.test/v.mp4'></video>\"},\"finish_reason\":\"stop\"}]}\n\n";
        let assembled = run(wire.as_bytes(), 32).unwrap();
        assert!(assembled.data.is_empty());
        assert_eq!(assembled.video_url.as_deref(), Some("https://cdn.test/v.mp4"));
    }

    #[test]
    fn test_error_event() {
        let wire = "event: progress\ndata: 10\n\nevent: error\ndata: {\"message\":\"quota exceeded\"}\n\n";
        let err = run(wire.as_bytes(), 4).unwrap_err();
        assert!(matches!(err, GenVideoError::Streaming(_)));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_malformed_records() {
        assert!(run(b"data: {broken\n\n", 64).is_err());
        assert!(run(b"event: progress\ndata: lots\n\n", 64).is_err());
        assert!(run(b"event: data\ndata: %%%not-base64%%%\n\n", 64).is_err());
        assert!(run(b"event: data\ndata: \xff\xfe\n\n", 64).is_err());
    }

    #[test]
    fn test_no_terminal_but_data_succeeds() {
        let wire = format!("event: data\ndata: {}", b64(b"tail"));
        assert_eq!(run(wire.as_bytes(), 3).unwrap().data, b"tail");
    }

    #[test]
    fn test_no_data_fails() {
        let err = run(b"event: progress\ndata: 50\n\n", 64).unwrap_err();
        assert!(err.to_string().contains("no video data"));
    }
}
