//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success - operation completed, results found
//! - `1`: General error - unspecified failure
//! - `2`: Blocking error - the index must not be trusted
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

use crate::error::GitsemError;

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Integrity failure that should halt automation (code 2)
    BlockingError = 2,

    /// Search ran but nothing passed the filters and threshold (code 3)
    NoResults = 3,

    /// Git or embedder collaborator failed (code 4)
    CollaboratorError = 4,

    /// File I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Index files are malformed (code 7)
    IndexCorrupted = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// Determine exit code for a search based on result presence.
    pub fn from_search_result<T>(result: &Option<T>) -> Self {
        match result {
            Some(_) => ExitCode::Success,
            None => ExitCode::NoResults,
        }
    }

    /// Convert a `GitsemError` to the appropriate exit code.
    pub fn from_error(error: &GitsemError) -> Self {
        match error {
            GitsemError::Integrity { .. } => ExitCode::BlockingError,
            GitsemError::Format { .. } => ExitCode::IndexCorrupted,
            GitsemError::Config { .. } => ExitCode::ConfigError,
            GitsemError::FileRead { .. } | GitsemError::FileWrite { .. } => ExitCode::IoError,
            GitsemError::Git(_) | GitsemError::Embedding { .. } => ExitCode::CollaboratorError,
            _ => ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExitCode::BlockingError)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - automation should halt",
            ExitCode::NoResults => "No results",
            ExitCode::CollaboratorError => "Git or embedding model error",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::IndexCorrupted => "Index corrupted",
        }
    }
}
