//! Per-call algorithm options.

/// How entry names are decoded when the container does not say.
///
/// Only ZIP distinguishes encodings. Entries flagged as UTF-8 are always read
/// as UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryNameEncoding {
    /// Interpret raw name bytes as UTF-8, replacing invalid sequences.
    #[default]
    Utf8,
    /// Decode names without the UTF-8 flag as IBM code page 437.
    Cp437,
}

/// Options passed to every algorithm call.
///
/// # Example
///
/// ```rust
/// use arcflow::{AlgorithmOptions, EntryNameEncoding};
///
/// let options = AlgorithmOptions::new()
///     .password("secret")
///     .encoding(EntryNameEncoding::Cp437)
///     .level(9);
///
/// assert_eq!(options.password.as_deref(), Some("secret"));
/// assert!(!options.flatten);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlgorithmOptions {
    /// Password used to encrypt (ZIP) or decrypt (ZIP, 7z).
    pub password: Option<String>,
    /// Entry-name encoding for containers without a UTF-8 flag.
    pub encoding: EntryNameEncoding,
    /// Write subset extractions under their base name instead of their
    /// archive-relative path, renaming on collision.
    pub flatten: bool,
    /// Compression level 0–9. `None` uses each format's default.
    pub level: Option<u32>,
}

impl AlgorithmOptions {
    /// Creates default options: no password, UTF-8 names, no flattening.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the entry-name encoding.
    pub fn encoding(mut self, encoding: EntryNameEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Enables or disables flattening for subset extraction.
    pub fn flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    /// Sets the compression level, clamped to 0–9.
    pub fn level(mut self, level: u32) -> Self {
        self.level = Some(level.min(9));
        self
    }

    /// Returns the password if one is set and non-empty.
    pub fn password_str(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    pub(crate) fn level_or(&self, default: u32) -> u32 {
        self.level.unwrap_or(default)
    }
}
