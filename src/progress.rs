//! Progress reporting for archive operations.
//!
//! Progress is reported in bytes of payload moved through the streaming
//! pipeline. Notifications are batched: a [`ProgressBatcher`] accumulates the
//! bytes of each processed buffer and only emits an event every *N* buffers
//! (the delay rate). Remaining bytes are always flushed when a call completes
//! or fails, so the deltas of all emitted events add up to exactly the number
//! of bytes processed.
//!
//! # Example
//!
//! ```rust
//! use arcflow::progress::{ProgressReporter, StatisticsProgress};
//! use arcflow::ProgressEvent;
//!
//! let mut progress = StatisticsProgress::new();
//! progress.on_total(100);
//! progress.on_progress(&ProgressEvent { bytes_processed: 40, total_processed: 40 });
//! assert_eq!(progress.state().processed_bytes, 40);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// IEC byte unit: 1 KiB = 1024 bytes.
pub const BYTES_KIB: u64 = 1024;
/// IEC byte unit: 1 MiB = 1024 KiB.
pub const BYTES_MIB: u64 = 1024 * BYTES_KIB;

const BYTES_KB: f64 = 1024.0;
const BYTES_MB: f64 = BYTES_KB * 1024.0;
const BYTES_GB: f64 = BYTES_MB * 1024.0;

/// A batched progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressEvent {
    /// Bytes processed since the previous notification.
    pub bytes_processed: u64,
    /// Cumulative bytes processed by this call so far.
    pub total_processed: u64,
}

/// Progress reporting trait for archive operations.
///
/// Events are delivered on the thread that drives the read/write loop.
/// Marshaling them elsewhere is the implementor's concern.
pub trait ProgressReporter: Send {
    /// Called once before work begins with the total payload size, when known.
    fn on_total(&mut self, total_bytes: u64) {
        let _ = total_bytes;
    }

    /// Called for each batched progress notification.
    fn on_progress(&mut self, event: &ProgressEvent) {
        let _ = event;
    }

    /// Called when starting to process an entry or source file.
    fn on_entry_start(&mut self, entry_name: &str, size: u64) {
        let _ = (entry_name, size);
    }

    /// Called when an entry finishes.
    fn on_entry_complete(&mut self, entry_name: &str, success: bool) {
        let _ = (entry_name, success);
    }

    /// Called on any recoverable warning.
    fn on_warning(&mut self, message: &str) {
        let _ = message;
    }
}

impl<P: ProgressReporter + ?Sized> ProgressReporter for Box<P> {
    fn on_total(&mut self, total_bytes: u64) {
        (**self).on_total(total_bytes);
    }

    fn on_progress(&mut self, event: &ProgressEvent) {
        (**self).on_progress(event);
    }

    fn on_entry_start(&mut self, entry_name: &str, size: u64) {
        (**self).on_entry_start(entry_name, size);
    }

    fn on_entry_complete(&mut self, entry_name: &str, success: bool) {
        (**self).on_entry_complete(entry_name, success);
    }

    fn on_warning(&mut self, message: &str) {
        (**self).on_warning(message);
    }
}

/// Accumulates processed bytes and decides when to notify.
///
/// With a delay rate of `n`, an event is produced after every `n` recorded
/// buffers (a rate of `0` behaves like `1`: every buffer notifies).
#[derive(Debug, Clone, Default)]
pub struct ProgressBatcher {
    delay_rate: u32,
    pending_buffers: u32,
    pending_bytes: u64,
    reported: u64,
}

impl ProgressBatcher {
    /// Creates a batcher that notifies every `delay_rate` buffers.
    pub fn new(delay_rate: u32) -> Self {
        Self {
            delay_rate,
            ..Self::default()
        }
    }

    /// Records one processed buffer of `bytes` bytes.
    ///
    /// Returns an event when the delay rate has been reached.
    pub fn record(&mut self, bytes: u64) -> Option<ProgressEvent> {
        self.pending_bytes += bytes;
        self.pending_buffers += 1;
        if self.pending_buffers >= self.delay_rate.max(1) {
            self.take()
        } else {
            None
        }
    }

    /// Returns an event for any unreported bytes.
    pub fn flush(&mut self) -> Option<ProgressEvent> {
        if self.pending_bytes > 0 {
            self.take()
        } else {
            self.pending_buffers = 0;
            None
        }
    }

    /// Cumulative bytes reported so far.
    pub fn reported(&self) -> u64 {
        self.reported
    }

    /// Cumulative bytes recorded so far, reported or not.
    pub fn processed(&self) -> u64 {
        self.reported + self.pending_bytes
    }

    fn take(&mut self) -> Option<ProgressEvent> {
        let bytes = std::mem::take(&mut self.pending_bytes);
        self.pending_buffers = 0;
        if bytes == 0 {
            return None;
        }
        self.reported += bytes;
        Some(ProgressEvent {
            bytes_processed: bytes,
            total_processed: self.reported,
        })
    }
}

/// Counters collected by [`StatisticsProgress`].
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    /// Total bytes to process.
    pub total_bytes: u64,
    /// Bytes processed so far.
    pub processed_bytes: u64,
    /// Number of notifications received.
    pub events: usize,
    /// Current entry being processed.
    pub current_entry: Option<String>,
    /// Number of entries processed.
    pub entries_processed: usize,
    /// Number of entries that failed.
    pub entries_failed: usize,
}

/// A progress reporter that does nothing.
#[derive(Debug, Default, Clone)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// A progress reporter that collects statistics.
#[derive(Debug, Default, Clone)]
pub struct StatisticsProgress {
    /// The progress state.
    pub state: ProgressState,
    /// Warnings collected.
    pub warnings: Vec<String>,
}

impl StatisticsProgress {
    /// Creates a new statistics progress reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the collected state.
    pub fn state(&self) -> &ProgressState {
        &self.state
    }
}

impl ProgressReporter for StatisticsProgress {
    fn on_total(&mut self, total_bytes: u64) {
        self.state.total_bytes = total_bytes;
    }

    fn on_progress(&mut self, event: &ProgressEvent) {
        self.state.processed_bytes += event.bytes_processed;
        self.state.events += 1;
    }

    fn on_entry_start(&mut self, entry_name: &str, _size: u64) {
        self.state.current_entry = Some(entry_name.to_string());
    }

    fn on_entry_complete(&mut self, _entry_name: &str, success: bool) {
        self.state.entries_processed += 1;
        if !success {
            self.state.entries_failed += 1;
        }
        self.state.current_entry = None;
    }

    fn on_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}

/// A thread-safe progress counter.
///
/// Allows progress to be monitored from another thread while the operation
/// runs on a worker.
#[derive(Debug)]
pub struct AtomicProgress {
    total_bytes: AtomicU64,
    processed_bytes: AtomicU64,
    events: AtomicU64,
}

impl Default for AtomicProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicProgress {
    /// Creates a new atomic progress counter.
    pub fn new() -> Self {
        Self {
            total_bytes: AtomicU64::new(0),
            processed_bytes: AtomicU64::new(0),
            events: AtomicU64::new(0),
        }
    }

    /// Creates a shared atomic progress counter.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns total bytes to process.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Returns processed bytes.
    pub fn processed_bytes(&self) -> u64 {
        self.processed_bytes.load(Ordering::Relaxed)
    }

    /// Returns the number of notifications received.
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }
}

impl ProgressReporter for Arc<AtomicProgress> {
    fn on_total(&mut self, total_bytes: u64) {
        self.total_bytes.store(total_bytes, Ordering::Relaxed);
    }

    fn on_progress(&mut self, event: &ProgressEvent) {
        self.processed_bytes
            .fetch_add(event.bytes_processed, Ordering::Relaxed);
        self.events.fetch_add(1, Ordering::Relaxed);
    }
}

/// A progress reporter that calls a closure.
pub struct ClosureProgress<F> {
    callback: F,
}

impl<F> ClosureProgress<F>
where
    F: FnMut(&ProgressEvent) + Send,
{
    /// Creates a progress reporter from a closure.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgress<F>
where
    F: FnMut(&ProgressEvent) + Send,
{
    fn on_progress(&mut self, event: &ProgressEvent) {
        (self.callback)(event)
    }
}

/// Creates a closure-based progress reporter.
pub fn progress_fn<F>(f: F) -> ClosureProgress<F>
where
    F: FnMut(&ProgressEvent) + Send,
{
    ClosureProgress::new(f)
}

/// Formats a duration as a human-readable string.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Formats bytes as a human-readable string using IEC units (KiB, MiB, GiB).
///
/// ```rust
/// use arcflow::progress::format_bytes_iec;
///
/// assert_eq!(format_bytes_iec(512), "512 B");
/// assert_eq!(format_bytes_iec(1536), "1.5 KiB");
/// ```
pub fn format_bytes_iec(bytes: u64) -> String {
    let bytes_f64 = bytes as f64;
    if bytes_f64 < BYTES_KB {
        format!("{} B", bytes)
    } else if bytes_f64 < BYTES_MB {
        format!("{:.1} KiB", bytes_f64 / BYTES_KB)
    } else if bytes_f64 < BYTES_GB {
        format!("{:.1} MiB", bytes_f64 / BYTES_MB)
    } else {
        format!("{:.1} GiB", bytes_f64 / BYTES_GB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(delay_rate: u32, chunks: &[u64]) -> (u64, usize) {
        let mut batcher = ProgressBatcher::new(delay_rate);
        let mut sum = 0;
        let mut events = 0;
        for &chunk in chunks {
            if let Some(event) = batcher.record(chunk) {
                sum += event.bytes_processed;
                events += 1;
            }
        }
        if let Some(event) = batcher.flush() {
            sum += event.bytes_processed;
            events += 1;
        }
        (sum, events)
    }

    #[test]
    fn test_batcher_sum_matches_for_all_rates() {
        let chunks = [8192, 8192, 100, 4096, 1, 8192, 7];
        let expected: u64 = chunks.iter().sum();
        for rate in [0, 1, 3, 1_000_000] {
            let (sum, _) = drive(rate, &chunks);
            assert_eq!(sum, expected, "delay rate {}", rate);
        }
    }

    #[test]
    fn test_batcher_event_cadence() {
        let chunks = [10u64; 10];
        assert_eq!(drive(0, &chunks).1, 10);
        assert_eq!(drive(1, &chunks).1, 10);
        assert_eq!(drive(4, &chunks).1, 3);
        assert_eq!(drive(1000, &chunks).1, 1);
    }

    #[test]
    fn test_batcher_cumulative_totals() {
        let mut batcher = ProgressBatcher::new(2);
        assert_eq!(batcher.record(5), None);
        let event = batcher.record(5).unwrap();
        assert_eq!(event.bytes_processed, 10);
        assert_eq!(event.total_processed, 10);
        assert_eq!(batcher.record(3), None);
        assert_eq!(batcher.processed(), 13);
        let event = batcher.flush().unwrap();
        assert_eq!(event.total_processed, 13);
        assert_eq!(batcher.flush(), None);
        assert_eq!(batcher.reported(), 13);
    }

    #[test]
    fn test_statistics_progress() {
        let mut progress = StatisticsProgress::new();
        progress.on_total(1000);
        progress.on_entry_start("test.txt", 500);
        progress.on_progress(&ProgressEvent {
            bytes_processed: 250,
            total_processed: 250,
        });
        progress.on_entry_complete("test.txt", true);

        assert_eq!(progress.state().total_bytes, 1000);
        assert_eq!(progress.state().processed_bytes, 250);
        assert_eq!(progress.state().entries_processed, 1);
        assert_eq!(progress.state().entries_failed, 0);
        assert!(progress.state().current_entry.is_none());

        progress.on_entry_start("bad.txt", 10);
        progress.on_warning("skipped");
        progress.on_entry_complete("bad.txt", false);
        assert_eq!(progress.state().entries_failed, 1);
        assert_eq!(progress.warnings, vec!["skipped".to_string()]);
    }

    #[test]
    fn test_atomic_progress() {
        let progress = AtomicProgress::shared();
        let mut reporter: Arc<AtomicProgress> = Arc::clone(&progress);

        reporter.on_total(1000);
        reporter.on_progress(&ProgressEvent {
            bytes_processed: 500,
            total_processed: 500,
        });

        assert_eq!(progress.total_bytes(), 1000);
        assert_eq!(progress.processed_bytes(), 500);
        assert_eq!(progress.events(), 1);
    }

    #[test]
    fn test_closure_progress() {
        let mut seen = Vec::new();
        {
            let mut progress = progress_fn(|event: &ProgressEvent| seen.push(event.total_processed));
            progress.on_progress(&ProgressEvent {
                bytes_processed: 1,
                total_processed: 1,
            });
            progress.on_progress(&ProgressEvent {
                bytes_processed: 2,
                total_processed: 3,
            });
        }
        assert_eq!(seen, vec![1, 3]);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3700)), "1h 1m");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes_iec(500), "500 B");
        assert_eq!(format_bytes_iec(1500), "1.5 KiB");
        assert_eq!(format_bytes_iec(1500 * 1024), "1.5 MiB");
        assert_eq!(format_bytes_iec(1500 * 1024 * 1024), "1.5 GiB");
    }
}
