//! Error types for gitsem
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use crate::git::GitError;
use crate::vector::VectorError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for index, update and search operations
#[derive(Error, Debug)]
pub enum GitsemError {
    /// Malformed or unsupported index files, binary/metadata size mismatch
    #[error("Invalid index format in '{path}': {reason}")]
    Format { path: PathBuf, reason: String },

    /// Checksum mismatch on load
    #[error("Index integrity check failed for '{path}': {reason}")]
    Integrity { path: PathBuf, reason: String },

    /// Invalid weights, iteration counts, limits and similar
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error(
        "Embedding model '{model}' failed: {reason}\nModel cache: {}\nSuggestion: Check network access for the first download or clear the cache directory",
        cache_dir.display()
    )]
    Embedding {
        model: String,
        cache_dir: PathBuf,
        reason: String,
    },

    #[error("Git operation failed: {0}")]
    Git(#[from] GitError),

    #[error("Vector operation failed: {0}")]
    Vector(#[from] VectorError),

    /// File system errors
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Plugin '{plugin}' failed: {reason}")]
    Plugin { plugin: String, reason: String },

    #[error("Index is empty. Run `gitsem index` first.")]
    EmptyIndex,

    #[error("No commits found in repository history.")]
    NoCommits,

    /// General errors for cases where we need to preserve existing behavior
    #[error("{0}")]
    General(String),
}

impl GitsemError {
    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::Format { .. } => "INDEX_FORMAT_ERROR",
            Self::Integrity { .. } => "INDEX_INTEGRITY_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::Git(_) => "GIT_ERROR",
            Self::Vector(_) => "VECTOR_ERROR",
            Self::FileRead { .. } => "FILE_READ_ERROR",
            Self::FileWrite { .. } => "FILE_WRITE_ERROR",
            Self::Plugin { .. } => "PLUGIN_ERROR",
            Self::EmptyIndex => "EMPTY_INDEX",
            Self::NoCommits => "NO_COMMITS",
            Self::General(_) => "GENERAL_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Format { .. } => vec![
                "Run 'gitsem doctor --fix' to regenerate compact sidecars from index.json",
                "Run 'gitsem index' to rebuild the index from scratch",
            ],
            Self::Integrity { .. } => vec![
                "Do not trust the on-disk index until it is rebuilt",
                "Run 'gitsem index' to rebuild from git history",
            ],
            Self::Config { .. } => vec![
                "Check .gitsem/settings.toml and GITSEM_* environment variables",
                "Run 'gitsem search --help' for valid ranges",
            ],
            Self::Embedding { .. } => vec![
                "The first run downloads the model; make sure the network is reachable",
                "Delete the model cache directory to force a fresh download",
            ],
            Self::Git(_) => vec!["Run gitsem from inside a git working tree"],
            Self::EmptyIndex => vec!["Run 'gitsem index' to build the index"],
            Self::NoCommits => vec!["Check include/exclude patterns and .gitsemignore"],
            Self::FileRead { .. } | Self::FileWrite { .. } => vec![
                "Check that the path exists and you have the right permissions",
                "Check available disk space",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for gitsem operations
pub type GitsemResult<T> = Result<T, GitsemError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T, GitsemError>;

    /// Attach the path being read
    fn read_path(self, path: &std::path::Path) -> Result<T, GitsemError>;

    /// Attach the path being written
    fn write_path(self, path: &std::path::Path) -> Result<T, GitsemError>;
}

impl<T> ErrorContext<T> for Result<T, std::io::Error> {
    fn context(self, msg: &str) -> Result<T, GitsemError> {
        self.map_err(|e| GitsemError::General(format!("{msg}: {e}")))
    }

    fn read_path(self, path: &std::path::Path) -> Result<T, GitsemError> {
        self.map_err(|source| GitsemError::FileRead {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_path(self, path: &std::path::Path) -> Result<T, GitsemError> {
        self.map_err(|source| GitsemError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_status_codes_are_stable() {
        assert_eq!(GitsemError::EmptyIndex.status_code(), "EMPTY_INDEX");
        assert_eq!(
            GitsemError::config("bad weights").status_code(),
            "CONFIG_ERROR"
        );
        assert_eq!(
            GitsemError::format("index.json", "broken").status_code(),
            "INDEX_FORMAT_ERROR"
        );
    }

    #[test]
    fn test_embedding_error_mentions_model_and_cache() {
        let err = GitsemError::Embedding {
            model: "Xenova/all-MiniLM-L6-v2".to_string(),
            cache_dir: PathBuf::from("/tmp/cache"),
            reason: "offline".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("Xenova/all-MiniLM-L6-v2"));
        assert!(message.contains("/tmp/cache"));
    }

    #[test]
    fn test_io_context_keeps_path() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = result.read_path(Path::new("missing.json")).unwrap_err();
        assert!(matches!(err, GitsemError::FileRead { .. }));
        assert!(err.to_string().contains("missing.json"));
        assert!(!err.recovery_suggestions().is_empty());
    }
}
