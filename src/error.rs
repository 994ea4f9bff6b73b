//! Error types for archive operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes of the engine, along with a convenient [`Result<T>`] type
//! alias.
//!
//! # Error Categories
//!
//! | Category | Variants | Typical Cause |
//! |----------|----------|---------------|
//! | Argument | [`InvalidArgument`][Error::InvalidArgument], [`Configuration`][Error::Configuration] | Missing handle or destination |
//! | Format | [`UnsupportedFormat`][Error::UnsupportedFormat] | Unknown extension, read-only format |
//! | Security | [`EncryptedArchive`][Error::EncryptedArchive] | Missing or incorrect password |
//! | I/O | [`Io`][Error::Io], [`Archive`][Error::Archive] | Stream or container failures |
//! | Control | [`Cancelled`][Error::Cancelled] | Cooperative cancellation |
//!
//! ```rust
//! use arcflow::Error;
//!
//! fn user_message(error: &Error) -> &'static str {
//!     match error {
//!         Error::EncryptedArchive { .. } => "This archive needs a password.",
//!         Error::UnsupportedFormat { .. } => "This file type is not supported.",
//!         Error::Cancelled => "Cancelled.",
//!         _ => "Something went wrong.",
//!     }
//! }
//! ```

use std::io;
use std::path::PathBuf;

use crate::archive_type::ArchiveType;

/// The main error type for archive operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A required handle (archive, folder, entry list) was missing or empty.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine was started without a usable configuration, for example
    /// without a destination folder.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The archive type is unknown, or the requested operation is not
    /// available for it (compressing to 7z).
    #[error("Unsupported format {archive_type:?}: {reason}")]
    UnsupportedFormat {
        /// The type that was requested.
        archive_type: ArchiveType,
        /// Why it cannot be handled.
        reason: String,
    },

    /// The archive is password protected and the password was missing or
    /// incorrect.
    ///
    /// This error is distinguished from generic I/O failures so that callers
    /// can ask for a password and retry.
    #[error("Archive '{}' is encrypted: {detail}", archive.display())]
    EncryptedArchive {
        /// The archive that failed to open or decrypt.
        archive: PathBuf,
        /// Diagnostic detail from the underlying library.
        detail: String,
    },

    /// An I/O error occurred while reading or writing a stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The container library reported a failure that is not password related.
    #[error("{format} error: {message}")]
    Archive {
        /// Container format name.
        format: &'static str,
        /// Library message.
        message: String,
    },

    /// The operation was cancelled through its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias using the crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Marker payload carried inside an [`io::Error`] when a cancellation is
/// observed below a library-driven copy loop.
#[derive(Debug)]
pub(crate) struct CancelledSignal;

impl std::fmt::Display for CancelledSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for CancelledSignal {}

/// Substrings that mark a library message as password related.
const PASSWORD_MARKERS: &[&str] = &["password", "decrypt", "encrypted"];

/// Returns true if a library message indicates a password failure.
pub(crate) fn mentions_password(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    PASSWORD_MARKERS.iter().any(|marker| lower.contains(marker))
}

impl Error {
    /// Returns true if this is an encryption-related error.
    pub fn is_encryption_error(&self) -> bool {
        matches!(self, Self::EncryptedArchive { .. })
    }

    /// Returns true if the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if the error reports an unsupported format or operation.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedFormat { .. })
    }

    /// Creates an unsupported-format error.
    pub fn unsupported_format(archive_type: ArchiveType, reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            archive_type,
            reason: reason.into(),
        }
    }

    /// Creates an encrypted-archive error.
    pub fn encrypted(archive: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::EncryptedArchive {
            archive: archive.into(),
            detail: detail.into(),
        }
    }

    /// Creates the I/O error used to carry a cancellation through library code.
    pub(crate) fn cancelled_io() -> io::Error {
        io::Error::other(CancelledSignal)
    }

    /// Converts an I/O error raised while processing `archive`.
    ///
    /// Cancellation markers become [`Error::Cancelled`] and password failures
    /// become [`Error::EncryptedArchive`]; everything else stays an I/O error.
    pub(crate) fn from_archive_io(archive: &std::path::Path, error: io::Error) -> Self {
        if is_cancel_signal(&error) {
            return Self::Cancelled;
        }
        if mentions_password(&error.to_string()) {
            return Self::encrypted(archive, error.to_string());
        }
        Self::Io(error)
    }

    /// Converts a ZIP library error raised while processing `archive`.
    pub(crate) fn from_zip(archive: &std::path::Path, error: zip::result::ZipError) -> Self {
        use zip::result::ZipError;

        match error {
            ZipError::InvalidPassword => Self::encrypted(archive, "invalid password"),
            ZipError::Io(e) => Self::from_archive_io(archive, e),
            other => {
                let message = other.to_string();
                if mentions_password(&message) {
                    Self::encrypted(archive, message)
                } else {
                    Self::Archive {
                        format: "ZIP",
                        message,
                    }
                }
            }
        }
    }

    /// Converts a 7z library error raised while processing `archive`.
    pub(crate) fn from_sevenz(archive: &std::path::Path, error: sevenz_rust::Error) -> Self {
        use sevenz_rust::Error as SevenZError;

        match error {
            SevenZError::PasswordRequired => Self::encrypted(archive, "password required"),
            other => {
                let message = other.to_string();
                if mentions_password(&message) {
                    Self::encrypted(archive, message)
                } else {
                    Self::Archive {
                        format: "7z",
                        message,
                    }
                }
            }
        }
    }
}

/// Returns true if the I/O error carries the cancellation marker.
pub(crate) fn is_cancel_signal(error: &io::Error) -> bool {
    // Container libraries may wrap the marker in their own error types.
    let mut current = error
        .get_ref()
        .map(|inner| inner as &(dyn std::error::Error + 'static));
    while let Some(inner) = current {
        if inner.is::<CancelledSignal>() {
            return true;
        }
        if let Some(nested) = inner.downcast_ref::<io::Error>() {
            if nested.get_ref().is_some_and(|e| e.is::<CancelledSignal>()) {
                return true;
            }
        }
        current = inner.source();
    }
    false
}
