//! Stream assemblers.
//!
//! Each [`ResponseFormat`] has one assembler: an incremental state machine
//! fed with body chunks in order. [`assemble`] drives the selected
//! assembler over a live byte stream, emits throttled progress, and
//! produces exactly one terminal outcome.

mod binary;
mod chunked_json;
mod event_stream;
mod frame;

pub use binary::BinaryAssembler;
pub use chunked_json::ChunkedJsonAssembler;
pub use event_stream::EventStreamAssembler;

use crate::error::Result;
use crate::video::progress::ProgressSink;
use crate::video::transport::ByteStream;
use crate::video::types::{Phase, ProgressEvent, ResponseFormat};
use futures_util::StreamExt;
use std::time::{Duration, Instant};

/// Minimum spacing between two `Receiving` progress events.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of feeding one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More input is expected.
    Continue,
    /// A terminal record was seen; remaining input is not read.
    Terminal,
}

/// Progress counters exposed by an assembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Bytes accumulated so far.
    pub bytes: u64,
    /// Expected total bytes, when known.
    pub total: Option<u64>,
    /// Server-reported percentage, when known.
    pub percent: Option<u8>,
}

impl Progress {
    fn event(self, phase: Phase) -> ProgressEvent {
        ProgressEvent {
            bytes_received: self.bytes,
            total_bytes: self.total,
            percent: self.percent,
            phase,
        }
    }
}

/// A completely assembled response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembled {
    /// Video bytes carried inline by the response.
    pub data: Vec<u8>,
    /// URL of the video, when the response referenced one instead.
    pub video_url: Option<String>,
}

/// Incremental reassembly of one wire format.
pub trait Assembler: Send {
    /// The format this assembler handles.
    fn format(&self) -> ResponseFormat;

    /// Feeds the next body chunk.
    fn push(&mut self, chunk: &[u8]) -> Result<Step>;

    /// Current counters.
    fn progress(&self) -> Progress;

    /// Completes assembly once the body ended or a terminal record was seen.
    fn finish(self: Box<Self>) -> Result<Assembled>;
}

/// Returns the assembler for `format`.
pub fn assembler_for(format: ResponseFormat, content_length: Option<u64>) -> Box<dyn Assembler> {
    match format {
        ResponseFormat::RawBinary => Box::new(BinaryAssembler::new(content_length)),
        ResponseFormat::EventStream => Box::new(EventStreamAssembler::new()),
        ResponseFormat::ChunkedJson => Box::new(ChunkedJsonAssembler::new()),
    }
}

/// Rate limiter for progress emission.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    /// Creates a throttle allowing one event per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns true when an event may be emitted now. The first call always
    /// succeeds.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(PROGRESS_INTERVAL)
    }
}

/// Consumes `body` with the assembler for `format`.
///
/// The body is read in order, once, until it ends, a terminal record is
/// seen, or an error occurs. On success a final `Finalizing` event is
/// emitted.
pub async fn assemble<S>(
    format: ResponseFormat,
    body: ByteStream,
    content_length: Option<u64>,
    sink: &mut S,
) -> Result<Assembled>
where
    S: ProgressSink + ?Sized,
{
    drive(assembler_for(format, content_length), body, sink).await
}

/// Drives an arbitrary assembler over `body`.
pub async fn drive<S>(
    mut assembler: Box<dyn Assembler>,
    mut body: ByteStream,
    sink: &mut S,
) -> Result<Assembled>
where
    S: ProgressSink + ?Sized,
{
    let format = assembler.format();
    let mut throttle = ProgressThrottle::default();
    let mut chunks = 0usize;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        chunks += 1;
        let step = assembler.push(&chunk)?;
        if throttle.ready() {
            sink.on_progress(&assembler.progress().event(Phase::Receiving));
        }
        if step == Step::Terminal {
            tracing::debug!(%format, chunks, "terminal record received");
            break;
        }
    }

    let progress = assembler.progress();
    let assembled = assembler.finish()?;
    tracing::info!(
        %format,
        chunks,
        bytes = assembled.data.len(),
        url = assembled.video_url.is_some(),
        "response assembled"
    );

    sink.on_progress(
        &Progress {
            bytes: assembled.data.len() as u64,
            ..progress
        }
        .event(Phase::Finalizing),
    );
    Ok(assembled)
}
