//! Commit history access.
//!
//! [`CommitSource`] is the seam the indexer and updater read history through.
//! [`GitRepository`] implements it over libgit2.

pub mod patterns;
pub mod repository;

pub use patterns::{IGNORE_FILE, build_globset, filter_commits_by_patterns, load_ignore_patterns};
pub use repository::{GitRepository, snippet_from_patch};

use crate::types::CommitRecord;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error(
        "Not inside a git repository: {path} ({source})\nSuggestion: Run gitsem from a directory inside a git working tree"
    )]
    NotARepository {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error(
        "Repository at {path} is bare\nSuggestion: gitsem needs a working tree; run it from a checkout"
    )]
    BareRepository { path: PathBuf },

    #[error("Git operation failed: {operation}: {source}\nSuggestion: Check that the repository is not corrupted (`git fsck`)")]
    Operation {
        operation: String,
        #[source]
        source: git2::Error,
    },

    #[error("Unknown commit '{hash}'\nSuggestion: The commit may have been removed by a rebase or force-push")]
    UnknownCommit { hash: String },
}

impl GitError {
    pub(crate) fn operation(operation: impl Into<String>) -> impl FnOnce(git2::Error) -> Self {
        let operation = operation.into();
        move |source| GitError::Operation { operation, source }
    }
}

/// What to read from history.
#[derive(Debug, Clone, Default)]
pub struct ReadCommitsOptions {
    pub include_patch: bool,
    /// Only commits not reachable from this one.
    pub since_hash: Option<String>,
    /// Only commits whose committer time is at or after this instant.
    pub since_date: Option<DateTime<Utc>>,
}

/// Source of commit records, newest first.
pub trait CommitSource {
    fn read_commits(&self, options: &ReadCommitsOptions) -> Result<Vec<CommitRecord>, GitError>;

    fn commit_exists(&self, hash: &str) -> bool;

    /// HEAD is `hash` or descends from it.
    fn is_ancestor(&self, hash: &str) -> bool;

    /// Trimmed diff excerpt for display, at most `max_lines` body lines.
    fn diff_snippet(&self, hash: &str, max_lines: usize) -> Result<String, GitError>;
}
