//! Progress bar implementation for CLI operations.

use arcflow::progress::{ProgressEvent, ProgressReporter};
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {wide_msg}";

/// Byte progress for one operation.
///
/// Cloning shares the underlying bar, so the caller can keep a handle while
/// the operation owns the reporter.
#[derive(Clone)]
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    /// Creates a new progress display
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(0);
            let style = ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            pb.set_style(style);
            pb
        };
        Self { bar }
    }

    /// Finishes the progress display
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// Finishes with a custom message
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.bar.abandon_with_message(msg.into());
    }
}

impl ProgressReporter for CliProgress {
    fn on_total(&mut self, total_bytes: u64) {
        self.bar.inc_length(total_bytes);
    }

    fn on_progress(&mut self, event: &ProgressEvent) {
        self.bar.inc(event.bytes_processed);
    }

    fn on_entry_start(&mut self, entry_name: &str, _size: u64) {
        // Truncate long names
        let display_name = if entry_name.chars().count() > 40 {
            let tail: String = entry_name
                .chars()
                .rev()
                .take(37)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("...{tail}")
        } else {
            entry_name.to_string()
        };
        self.bar.set_message(display_name);
    }

    fn on_warning(&mut self, message: &str) {
        self.bar.println(format!("Warning: {message}"));
    }
}
