//! Chunked JSON bodies.
//!
//! Two layouts are accepted, chosen by the first non-whitespace byte:
//! newline-delimited frames (`{`) and a single JSON array of frames (`[`).
//! Array bodies are buffered and parsed when the body ends.

use super::frame::{Frame, FrameState};
use super::{Assembled, Assembler, Progress, Step};
use crate::error::{GenVideoError, Result};
use crate::video::types::ResponseFormat;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Undetermined,
    Lines,
    Array,
}

/// Parses JSON frames and reassembles the video they carry.
#[derive(Debug)]
pub struct ChunkedJsonAssembler {
    layout: Layout,
    buffer: Vec<u8>,
    received: u64,
    frames: usize,
    state: FrameState,
}

impl Default for ChunkedJsonAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedJsonAssembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self {
            layout: Layout::Undetermined,
            buffer: Vec::new(),
            received: 0,
            frames: 0,
            state: FrameState::default(),
        }
    }

    fn detect_layout(&mut self) -> Result<()> {
        let Some(&first) = self.buffer.iter().find(|b| !b.is_ascii_whitespace()) else {
            return Ok(());
        };
        self.layout = match first {
            b'{' => Layout::Lines,
            b'[' => Layout::Array,
            other => {
                return Err(GenVideoError::streaming(format!(
                    "JSON stream starts with unexpected byte 0x{other:02x}"
                )))
            }
        };
        tracing::debug!(layout = ?self.layout, "detected JSON stream layout");
        Ok(())
    }

    fn drain_lines(&mut self) -> Result<Step> {
        let mut start = 0;
        let mut step = Step::Continue;
        while let Some(pos) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let line = self.buffer[start..end].to_vec();
            start = end + 1;
            step = self.parse_frame(&line)?;
            if step == Step::Terminal {
                break;
            }
        }
        self.buffer.drain(..start);
        Ok(step)
    }

    fn parse_frame(&mut self, line: &[u8]) -> Result<Step> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return Ok(Step::Continue);
        }
        self.frames += 1;
        let value: Value = serde_json::from_slice(line).map_err(|e| {
            GenVideoError::streaming(format!("malformed JSON frame {}: {e}", self.frames))
        })?;
        self.apply_value(&value)
    }

    fn apply_value(&mut self, value: &Value) -> Result<Step> {
        if !value.is_object() {
            return Err(GenVideoError::streaming(format!(
                "JSON frame {} is not an object",
                self.frames
            )));
        }
        self.state.apply(Frame::from_value(value)?)
    }
}

impl Assembler for ChunkedJsonAssembler {
    fn format(&self) -> ResponseFormat {
        ResponseFormat::ChunkedJson
    }

    fn push(&mut self, chunk: &[u8]) -> Result<Step> {
        self.received += chunk.len() as u64;
        self.buffer.extend_from_slice(chunk);
        if self.layout == Layout::Undetermined {
            self.detect_layout()?;
        }
        match self.layout {
            Layout::Lines => self.drain_lines(),
            Layout::Array | Layout::Undetermined => Ok(Step::Continue),
        }
    }

    fn progress(&self) -> Progress {
        match self.layout {
            // Frames are not decoded until the array closes.
            Layout::Array => Progress {
                bytes: self.received,
                total: None,
                percent: None,
            },
            _ => self.state.progress(),
        }
    }

    fn finish(mut self: Box<Self>) -> Result<Assembled> {
        match self.layout {
            Layout::Undetermined => {
                return Err(GenVideoError::streaming("empty JSON stream"));
            }
            Layout::Lines => {
                if !self.state.done {
                    let rest = std::mem::take(&mut self.buffer);
                    self.parse_frame(&rest)?;
                }
            }
            Layout::Array => {
                let frames: Vec<Value> = serde_json::from_slice(&self.buffer).map_err(|e| {
                    GenVideoError::streaming(format!("malformed JSON array body: {e}"))
                })?;
                self.buffer.clear();
                for value in &frames {
                    self.frames += 1;
                    if self.apply_value(value)? == Step::Terminal {
                        break;
                    }
                }
            }
        }
        self.state.into_assembled("JSON stream")
    }
}
