//! Progress reporting.

use crate::video::types::{Phase, ProgressEvent};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Receiver of progress events.
pub trait ProgressSink {
    /// Handles one progress event. Must not fail.
    fn on_progress(&mut self, event: &ProgressEvent);
}

/// Discards all events.
impl ProgressSink for () {
    fn on_progress(&mut self, _event: &ProgressEvent) {}
}

/// Records all events.
impl ProgressSink for Vec<ProgressEvent> {
    fn on_progress(&mut self, event: &ProgressEvent) {
        self.push(*event);
    }
}

const PERCENT_TEMPLATE: &str =
    "{spinner:.blue} {prefix:>10.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos:>3}% {msg}";

const BYTES_TEMPLATE: &str =
    "{spinner:.blue} {prefix:>10.cyan.bold} [{elapsed_precise}] {msg} ({binary_bytes_per_sec})";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const BAR_CHARS: &str = "█▓▒░  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Spinner,
    Percent,
}

/// Renders progress events to the terminal.
///
/// Shows a percentage bar when a percentage or total is known, and a byte
/// counter with elapsed time otherwise. The displayed percentage never
/// decreases.
pub struct ProgressReporter {
    bar: ProgressBar,
    mode: Mode,
    last_percent: Option<u8>,
    last_bytes: u64,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("mode", &self.mode)
            .field("last_percent", &self.last_percent)
            .field("last_bytes", &self.last_bytes)
            .finish()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    /// Creates a reporter drawing to stderr.
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Creates a reporter that tracks state without drawing.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(None, target);
        bar.set_prefix("Generating");
        let mut reporter = Self {
            bar,
            mode: Mode::Percent,
            last_percent: None,
            last_bytes: 0,
        };
        reporter.set_mode(Mode::Spinner);
        reporter.bar.enable_steady_tick(Duration::from_millis(120));
        reporter
    }

    /// The highest percentage shown so far.
    pub fn displayed_percent(&self) -> Option<u8> {
        self.last_percent
    }

    /// The highest byte count shown so far.
    pub fn displayed_bytes(&self) -> u64 {
        self.last_bytes
    }

    /// Stops drawing and leaves the final state on screen.
    pub fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish();
        }
    }

    /// Clears the bar, e.g. before printing an error.
    pub fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.mode == mode {
            return;
        }
        let template = match mode {
            Mode::Spinner => BYTES_TEMPLATE,
            Mode::Percent => PERCENT_TEMPLATE,
        };
        match ProgressStyle::with_template(template) {
            Ok(style) => self
                .bar
                .set_style(style.tick_chars(TICK).progress_chars(BAR_CHARS)),
            Err(e) => tracing::debug!("invalid progress template: {e}"),
        }
        if mode == Mode::Percent {
            self.bar.set_length(100);
        }
        self.mode = mode;
    }
}

impl ProgressSink for ProgressReporter {
    fn on_progress(&mut self, event: &ProgressEvent) {
        self.last_bytes = self.last_bytes.max(event.bytes_received);

        match event.phase {
            Phase::Connecting => {
                self.bar.set_message("waiting for server");
                return;
            }
            Phase::Receiving => {}
            Phase::Finalizing => self.bar.set_prefix("Finalizing"),
        }

        if let Some(pct) = event.effective_percent() {
            let shown = self.last_percent.map_or(pct, |last| last.max(pct));
            self.last_percent = Some(shown);
            self.set_mode(Mode::Percent);
            self.bar.set_position(u64::from(shown));
        } else {
            self.set_mode(Mode::Spinner);
            // The rate column is derived from the position.
            self.bar.set_position(self.last_bytes);
        }
        self.bar
            .set_message(indicatif::HumanBytes(self.last_bytes).to_string());

        if event.phase == Phase::Finalizing {
            self.finish();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receiving(bytes: u64, total: Option<u64>, percent: Option<u8>) -> ProgressEvent {
        ProgressEvent {
            bytes_received: bytes,
            total_bytes: total,
            percent,
            phase: Phase::Receiving,
        }
    }

    #[test]
    fn test_percent_is_monotonic() {
        let mut reporter = ProgressReporter::hidden();
        reporter.on_progress(&receiving(0, None, Some(40)));
        reporter.on_progress(&receiving(0, None, Some(10)));
        assert_eq!(reporter.displayed_percent(), Some(40));
        reporter.on_progress(&receiving(0, None, Some(40)));
        reporter.on_progress(&receiving(0, None, Some(90)));
        assert_eq!(reporter.displayed_percent(), Some(90));
    }

    #[test]
    fn test_percent_from_total() {
        let mut reporter = ProgressReporter::hidden();
        reporter.on_progress(&receiving(250, Some(1000), None));
        assert_eq!(reporter.displayed_percent(), Some(25));
        assert_eq!(reporter.displayed_bytes(), 250);
    }

    #[test]
    fn test_unknown_total_shows_bytes_only() {
        let mut reporter = ProgressReporter::hidden();
        reporter.on_progress(&ProgressEvent::connecting());
        reporter.on_progress(&receiving(4096, None, None));
        assert_eq!(reporter.displayed_percent(), None);
        assert_eq!(reporter.displayed_bytes(), 4096);
        // Out-of-order byte counts do not move the counter back.
        reporter.on_progress(&receiving(1024, None, None));
        assert_eq!(reporter.displayed_bytes(), 4096);
    }

    #[test]
    fn test_spinner_position_tracks_bytes() {
        let mut reporter = ProgressReporter::hidden();
        reporter.on_progress(&receiving(2048, None, None));
        assert_eq!(reporter.bar.position(), 2048);
        reporter.on_progress(&receiving(8192, None, None));
        assert_eq!(reporter.bar.position(), 8192);
    }

    #[test]
    fn test_finalizing_shows_full() {
        let mut reporter = ProgressReporter::hidden();
        reporter.on_progress(&receiving(10, None, Some(90)));
        reporter.on_progress(&ProgressEvent {
            bytes_received: 10,
            total_bytes: None,
            percent: None,
            phase: Phase::Finalizing,
        });
        assert_eq!(reporter.displayed_percent(), Some(100));
    }

    #[test]
    fn test_recording_sink() {
        let mut events: Vec<ProgressEvent> = Vec::new();
        events.on_progress(&ProgressEvent::connecting());
        assert_eq!(events.len(), 1);
        ().on_progress(&ProgressEvent::connecting());
    }
}
