//! Engine-wide configuration.
//!
//! [`EngineConfig`] holds the knobs shared by every operation: the streaming
//! buffer size, how often progress is reported, when the root node cache is
//! flushed and which input size counts as a long-running operation.

use crate::progress::BYTES_MIB;

/// Smallest allowed streaming buffer (4 KiB).
pub const MIN_BUFFER_SIZE: usize = 4 * 1024;
/// Largest allowed streaming buffer (8 KiB).
pub const MAX_BUFFER_SIZE: usize = 8 * 1024;

/// Configuration shared by algorithms, operations and the root node cache.
///
/// # Example
///
/// ```rust
/// use arcflow::EngineConfig;
///
/// let config = EngineConfig::new()
///     .buffer_size(4096)
///     .progress_delay_rate(4)
///     .cache_threshold(8);
///
/// assert_eq!(config.buffer_size, 4096);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Streaming buffer size in bytes, clamped to 4–8 KiB.
    ///
    /// Default: 8 KiB.
    pub buffer_size: usize,

    /// Number of buffers processed between two progress notifications.
    ///
    /// `0` and `1` both notify after every buffer. Remaining bytes are always
    /// flushed at the end of a call.
    /// Default: 16.
    pub progress_delay_rate: u32,

    /// Number of distinct archives the root node cache holds before it is
    /// flushed as a whole.
    ///
    /// Default: 16.
    pub cache_threshold: usize,

    /// Total input size above which an operation is considered long-running.
    ///
    /// Default: 256 MiB.
    pub long_operation_threshold: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_size: MAX_BUFFER_SIZE,
            progress_delay_rate: 16,
            cache_threshold: 16,
            long_operation_threshold: 256 * BYTES_MIB,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that reports progress after every buffer.
    ///
    /// Useful for interactive front ends with small archives.
    pub fn responsive() -> Self {
        Self {
            progress_delay_rate: 0,
            ..Self::default()
        }
    }

    /// Sets the streaming buffer size. Values outside 4–8 KiB are clamped.
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE);
        self
    }

    /// Sets the progress delay rate in buffers.
    pub fn progress_delay_rate(mut self, buffers: u32) -> Self {
        self.progress_delay_rate = buffers;
        self
    }

    /// Sets the root node cache threshold.
    pub fn cache_threshold(mut self, archives: usize) -> Self {
        self.cache_threshold = archives;
        self
    }

    /// Sets the long-operation threshold in bytes.
    pub fn long_operation_threshold(mut self, bytes: u64) -> Self {
        self.long_operation_threshold = bytes;
        self
    }

    /// Buffer size actually used by the pipeline.
    pub(crate) fn effective_buffer_size(&self) -> usize {
        self.buffer_size.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE)
    }

    /// Validates the configuration.
    ///
    /// Fields are public, so a struct literal can bypass the builder clamps.
    pub fn validate(&self) -> crate::Result<()> {
        if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&self.buffer_size) {
            return Err(crate::Error::Configuration(format!(
                "buffer_size must be between {} and {} bytes, got {}",
                MIN_BUFFER_SIZE, MAX_BUFFER_SIZE, self.buffer_size
            )));
        }

        if self.cache_threshold == 0 {
            return Err(crate::Error::Configuration(
                "cache_threshold must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}
