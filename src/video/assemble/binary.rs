//! Raw binary bodies: the response is the video itself.

use super::{Assembled, Assembler, Progress, Step};
use crate::error::{GenVideoError, Result};
use crate::video::types::ResponseFormat;

/// Upper bound on the buffer pre-allocated from Content-Length.
const MAX_PREALLOC: u64 = 256 * 1024 * 1024;

/// Accumulates chunks verbatim.
#[derive(Debug, Default)]
pub struct BinaryAssembler {
    data: Vec<u8>,
    content_length: Option<u64>,
}

impl BinaryAssembler {
    /// Creates an assembler expecting `content_length` bytes, if known.
    pub fn new(content_length: Option<u64>) -> Self {
        let capacity = content_length.unwrap_or(0).min(MAX_PREALLOC) as usize;
        Self {
            data: Vec::with_capacity(capacity),
            content_length,
        }
    }
}

impl Assembler for BinaryAssembler {
    fn format(&self) -> ResponseFormat {
        ResponseFormat::RawBinary
    }

    fn push(&mut self, chunk: &[u8]) -> Result<Step> {
        self.data.extend_from_slice(chunk);
        Ok(Step::Continue)
    }

    fn progress(&self) -> Progress {
        Progress {
            bytes: self.data.len() as u64,
            total: self.content_length,
            percent: None,
        }
    }

    fn finish(self: Box<Self>) -> Result<Assembled> {
        if self.data.is_empty() {
            return Err(GenVideoError::streaming("empty response body"));
        }
        if let Some(expected) = self.content_length {
            let received = self.data.len() as u64;
            if received != expected {
                return Err(GenVideoError::streaming(format!(
                    "body length mismatch: expected {expected} bytes, received {received}"
                )));
            }
        }
        Ok(Assembled {
            data: self.data,
            video_url: None,
        })
    }
}
