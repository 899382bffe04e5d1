//! Content checksum over index metadata.
//!
//! Covers model name, timestamps, repository root, the patch flag and every
//! commit's hash, author, date, message and files. Embeddings are excluded,
//! so the checksum certifies metadata, not vector bytes.

use crate::types::{IndexedCommit, SemanticIndex};
use sha2::{Digest, Sha256};

/// Fields the checksum covers, borrowed from either index representation.
pub struct ChecksumInput<'a, I> {
    pub model_name: &'a str,
    pub created_at: &'a str,
    pub last_updated_at: &'a str,
    pub repository_root: &'a str,
    pub include_patch: bool,
    pub commits: I,
}

/// Borrowed per-commit fields.
pub struct CommitFields<'a> {
    pub hash: &'a str,
    pub author: &'a str,
    pub date: &'a str,
    pub message: &'a str,
    pub files: &'a [String],
}

impl<'a> From<&'a IndexedCommit> for CommitFields<'a> {
    fn from(commit: &'a IndexedCommit) -> Self {
        Self {
            hash: &commit.hash,
            author: &commit.author,
            date: &commit.date,
            message: &commit.message,
            files: &commit.files,
        }
    }
}

/// Lowercase hex SHA-256.
pub fn compute_checksum<'a, I>(input: ChecksumInput<'a, I>) -> String
where
    I: IntoIterator<Item = CommitFields<'a>>,
{
    let mut hasher = Sha256::new();
    hasher.update(input.model_name.as_bytes());
    hasher.update(input.created_at.as_bytes());
    hasher.update(input.last_updated_at.as_bytes());
    hasher.update(input.repository_root.as_bytes());
    hasher.update(if input.include_patch { "true" } else { "false" });

    for commit in input.commits {
        hasher.update(commit.hash.as_bytes());
        hasher.update(commit.author.as_bytes());
        hasher.update(commit.date.as_bytes());
        hasher.update(commit.message.as_bytes());
        hasher.update(commit.files.join("\n").as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

pub fn index_checksum(index: &SemanticIndex) -> String {
    compute_checksum(ChecksumInput {
        model_name: &index.model_name,
        created_at: &index.created_at,
        last_updated_at: &index.last_updated_at,
        repository_root: &index.repository_root,
        include_patch: index.include_patch,
        commits: index.commits.iter().map(CommitFields::from),
    })
}
