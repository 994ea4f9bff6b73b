//! Operation orchestration.
//!
//! An [`Operation`] runs one or more compress/decompress requests
//! ([`OperationInfo`]) sequentially on a worker, shares one cancellation
//! token between them and folds the per-unit outcomes into one
//! [`OperationResult`].
//!
//! # Classification
//!
//! | Outcome of the units | Status |
//! |----------------------|--------|
//! | cancellation observed | [`OperationStatus::Interrupt`] |
//! | all succeeded | [`OperationStatus::Success`] |
//! | some succeeded, some failed | [`OperationStatus::PartialFail`] |
//! | all failed | [`OperationStatus::Fail`] |
//!
//! Single-file formats (GZip, BZip2) given several inputs fan out into one
//! unit per input file.

mod runner;

pub use runner::{Operation, OperationHandle};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archive_type::ArchiveType;
use crate::fs;
use crate::options::AlgorithmOptions;
use crate::tree::ArchiveEntry;

/// One logical request.
#[derive(Debug, Clone)]
pub enum OperationInfo {
    /// Pack files into a new archive.
    Compression {
        /// Files to pack.
        selected_files: Vec<PathBuf>,
        /// Folder the archive is created in.
        destination: Option<PathBuf>,
        /// Archive name without extension.
        archive_name: String,
        /// Format to write.
        archive_type: ArchiveType,
        /// Password, level and so on.
        options: AlgorithmOptions,
    },
    /// Unpack an archive, completely or partially.
    Decompression {
        /// Archive to read.
        archive: PathBuf,
        /// Folder to extract into.
        destination: Option<PathBuf>,
        /// Entries to extract; `None` extracts everything.
        entries: Option<Vec<ArchiveEntry>>,
        /// Password, encoding, flattening.
        options: AlgorithmOptions,
    },
}

impl OperationInfo {
    /// Creates a compression request.
    pub fn compress(
        selected_files: Vec<PathBuf>,
        destination: impl Into<PathBuf>,
        archive_name: impl Into<String>,
        archive_type: ArchiveType,
    ) -> Self {
        Self::Compression {
            selected_files,
            destination: Some(destination.into()),
            archive_name: archive_name.into(),
            archive_type,
            options: AlgorithmOptions::default(),
        }
    }

    /// Creates a whole-archive decompression request.
    pub fn decompress(archive: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::Decompression {
            archive: archive.into(),
            destination: Some(destination.into()),
            entries: None,
            options: AlgorithmOptions::default(),
        }
    }

    /// Restricts a decompression request to `entries`.
    pub fn with_entries(mut self, selected: Vec<ArchiveEntry>) -> Self {
        if let Self::Decompression { entries, .. } = &mut self {
            *entries = Some(selected);
        }
        self
    }

    /// Replaces the algorithm options.
    pub fn with_options(mut self, new_options: AlgorithmOptions) -> Self {
        match &mut self {
            Self::Compression { options, .. } | Self::Decompression { options, .. } => {
                *options = new_options;
            }
        }
        self
    }

    /// The destination folder, if configured.
    pub fn destination(&self) -> Option<&Path> {
        match self {
            Self::Compression { destination, .. } | Self::Decompression { destination, .. } => {
                destination.as_deref()
            }
        }
    }

    /// The algorithm options.
    pub fn options(&self) -> &AlgorithmOptions {
        match self {
            Self::Compression { options, .. } | Self::Decompression { options, .. } => options,
        }
    }

    /// Bytes read from disk by this request.
    pub fn total_input_bytes(&self) -> u64 {
        match self {
            Self::Compression { selected_files, .. } => fs::total_size(selected_files),
            Self::Decompression { archive, .. } => fs::total_size(std::slice::from_ref(archive)),
        }
    }

    /// Short name shown in messages and password prompts.
    pub fn display_name(&self) -> String {
        match self {
            Self::Compression {
                archive_name,
                archive_type,
                ..
            } => format!("{}{}", archive_name, archive_type.extension()),
            Self::Decompression { archive, .. } => fs::base_name(archive)
                .unwrap_or_else(|_| archive.display().to_string()),
        }
    }
}

/// Aggregate status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    /// Every unit succeeded.
    Success,
    /// Every unit failed.
    Fail,
    /// At least one unit succeeded and at least one failed.
    PartialFail,
    /// Cancellation was observed.
    Interrupt,
}

impl OperationStatus {
    /// Classifies unit outcomes.
    ///
    /// ```
    /// use arcflow::OperationStatus;
    ///
    /// assert_eq!(OperationStatus::classify(3, 0, false), OperationStatus::Success);
    /// assert_eq!(OperationStatus::classify(2, 1, false), OperationStatus::PartialFail);
    /// assert_eq!(OperationStatus::classify(0, 2, false), OperationStatus::Fail);
    /// assert_eq!(OperationStatus::classify(2, 0, true), OperationStatus::Interrupt);
    /// ```
    pub fn classify(succeeded: usize, failed: usize, interrupted: bool) -> Self {
        if interrupted {
            Self::Interrupt
        } else if failed == 0 {
            Self::Success
        } else if succeeded == 0 {
            Self::Fail
        } else {
            Self::PartialFail
        }
    }

    /// Short label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail => "fail",
            Self::PartialFail => "partial-fail",
            Self::Interrupt => "interrupt",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an [`Operation`].
#[derive(Debug, Clone)]
pub struct OperationResult {
    /// Aggregate status.
    pub status: OperationStatus,
    /// Short summary.
    pub message: String,
    /// Raw per-unit diagnostics, when any unit failed.
    pub verbose_message: Option<String>,
    /// Wall time.
    pub elapsed: Duration,
    /// Names of the archives or folders actually created (after collision
    /// renaming).
    pub archive_names: Vec<String>,
}

impl OperationResult {
    /// Returns true for [`OperationStatus::Success`].
    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }

    pub(crate) fn failed(message: impl Into<String>, verbose: Option<String>, elapsed: Duration) -> Self {
        Self {
            status: OperationStatus::Fail,
            message: message.into(),
            verbose_message: verbose,
            elapsed,
            archive_names: Vec::new(),
        }
    }
}

/// Supplies passwords for encrypted archives.
///
/// Called at most once per archive, after the first attempt failed with
/// [`Error::EncryptedArchive`](crate::Error::EncryptedArchive). Returning
/// `None` gives up.
pub trait PasswordProvider: Send {
    /// Asks for the password of `display_name`.
    fn request_password(&mut self, display_name: &str) -> Option<String>;
}

impl<F> PasswordProvider for F
where
    F: FnMut(&str) -> Option<String> + Send,
{
    fn request_password(&mut self, display_name: &str) -> Option<String> {
        self(display_name)
    }
}

/// A provider that never supplies a password.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPassword;

impl PasswordProvider for NoPassword {
    fn request_password(&mut self, _display_name: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_rule() {
        assert_eq!(OperationStatus::classify(1, 0, false), OperationStatus::Success);
        assert_eq!(OperationStatus::classify(0, 0, false), OperationStatus::Success);
        assert_eq!(OperationStatus::classify(1, 1, false), OperationStatus::PartialFail);
        assert_eq!(OperationStatus::classify(0, 1, false), OperationStatus::Fail);
        assert_eq!(OperationStatus::classify(0, 1, true), OperationStatus::Interrupt);
    }

    #[test]
    fn test_info_accessors() {
        let info = OperationInfo::compress(vec![], "/tmp/out", "bundle", ArchiveType::TarGz);
        assert_eq!(info.display_name(), "bundle.tar.gz");
        assert_eq!(info.destination(), Some(Path::new("/tmp/out")));

        let info = OperationInfo::decompress("/tmp/a.zip", "/tmp/out")
            .with_entries(vec![ArchiveEntry::file("x.txt", 1)])
            .with_options(AlgorithmOptions::new().password("pw"));
        assert_eq!(info.display_name(), "a.zip");
        assert_eq!(info.options().password.as_deref(), Some("pw"));
        assert!(matches!(info, OperationInfo::Decompression { entries: Some(ref e), .. } if e.len() == 1));
    }

    #[test]
    fn test_closure_password_provider() {
        let mut provider = |name: &str| Some(format!("pw-for-{name}"));
        assert_eq!(provider.request_password("a.zip").as_deref(), Some("pw-for-a.zip"));
        assert_eq!(NoPassword.request_password("a.zip"), None);
    }
}
