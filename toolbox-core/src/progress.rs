//! Progress reporting for long-running file passes

use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress updates from a file pass
pub trait ProgressReporter {
    /// Begin a new pass over `total` items
    fn start(&mut self, total: u64, message: &str);

    /// Report the absolute position within the current pass
    fn advance(&mut self, current: u64, message: &str);

    /// Close the current pass
    fn finish(&mut self);
}

/// Terminal progress bar
#[derive(Default)]
pub struct ConsoleProgress {
    bar: Option<ProgressBar>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn start(&mut self, total: u64, message: &str) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }

        let bar = ProgressBar::new(total);
        let style = ProgressStyle::with_template(
            "{prefix:.yellow} [{elapsed_precise}] {bar:40.yellow/white} {pos}/{len} (eta {eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("── ");
        bar.set_style(style);
        bar.set_prefix(message.to_string());
        self.bar = Some(bar);
    }

    fn advance(&mut self, current: u64, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_position(current);
            bar.set_message(message.to_string());
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }
}

/// Discards all updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn start(&mut self, _total: u64, _message: &str) {}

    fn advance(&mut self, _current: u64, _message: &str) {}

    fn finish(&mut self) {}
}

/// Records every update, for asserting on progress in tests
#[derive(Debug, Default, Clone)]
pub struct RecordingProgress {
    pub passes: Vec<(u64, String)>,
    pub last_position: u64,
    pub finished: usize,
}

impl ProgressReporter for RecordingProgress {
    fn start(&mut self, total: u64, message: &str) {
        self.passes.push((total, message.to_string()));
        self.last_position = 0;
    }

    fn advance(&mut self, current: u64, _message: &str) {
        self.last_position = current;
    }

    fn finish(&mut self) {
        self.finished += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_progress() {
        let mut progress = RecordingProgress::default();
        progress.start(10, "Processing");
        progress.advance(4, "4 of 10");
        progress.advance(10, "10 of 10");
        progress.finish();

        assert_eq!(progress.passes, vec![(10, "Processing".to_string())]);
        assert_eq!(progress.last_position, 10);
        assert_eq!(progress.finished, 1);
    }

    #[test]
    fn test_console_progress_without_start_is_noop() {
        let mut progress = ConsoleProgress::new();
        progress.advance(3, "ignored");
        progress.finish();
        assert!(progress.bar.is_none());
    }
}
