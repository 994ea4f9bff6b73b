//! Exit codes for the CLI tool.

use arcflow::{Error, OperationStatus};

/// Exit code constants
pub const SUCCESS: i32 = 0;
/// Some items failed
pub const WARNING: i32 = 1;
/// Fatal error occurred
pub const FATAL_ERROR: i32 = 2;
/// Archive format error
pub const BAD_ARCHIVE: i32 = 3;
/// Wrong or missing password
pub const WRONG_PASSWORD: i32 = 4;
/// I/O error
pub const IO_ERROR: i32 = 5;
/// Ctrl+C (128 + SIGINT)
pub const USER_INTERRUPT: i32 = 130;
/// Invalid command line arguments
pub const BAD_ARGS: i32 = 255;

/// Exit code enum for structured handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    Warning,
    FatalError,
    BadArchive,
    WrongPassword,
    IoError,
    UserInterrupt,
    BadArgs,
}

impl ExitCode {
    /// Returns the numeric exit code
    pub fn code(self) -> i32 {
        match self {
            Self::Success => SUCCESS,
            Self::Warning => WARNING,
            Self::FatalError => FATAL_ERROR,
            Self::BadArchive => BAD_ARCHIVE,
            Self::WrongPassword => WRONG_PASSWORD,
            Self::IoError => IO_ERROR,
            Self::UserInterrupt => USER_INTERRUPT,
            Self::BadArgs => BAD_ARGS,
        }
    }
}

/// Converts an arcflow error to an exit code
pub fn error_to_exit_code(error: &Error) -> ExitCode {
    match error {
        Error::Io(_) => ExitCode::IoError,
        Error::Archive { .. } | Error::UnsupportedFormat { .. } => ExitCode::BadArchive,
        Error::EncryptedArchive { .. } => ExitCode::WrongPassword,
        Error::InvalidArgument(_) | Error::Configuration(_) => ExitCode::BadArgs,
        Error::Cancelled => ExitCode::UserInterrupt,
        // Future error variants - required by #[non_exhaustive]
        _ => ExitCode::FatalError,
    }
}

/// Converts an operation status to an exit code
pub fn status_to_exit_code(status: OperationStatus) -> ExitCode {
    match status {
        OperationStatus::Success => ExitCode::Success,
        OperationStatus::PartialFail => ExitCode::Warning,
        OperationStatus::Fail => ExitCode::FatalError,
        OperationStatus::Interrupt => ExitCode::UserInterrupt,
    }
}
