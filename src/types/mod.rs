//! Commit and index data model.

use crate::storage::Embedding;
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema version of the full `index.json` file.
pub const INDEX_VERSION: u32 = 1;

/// A commit as produced by the git collaborator. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    pub hash: String,
    pub author: String,
    /// ISO-8601 with offset
    pub date: String,
    pub message: String,
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

/// A commit plus its embedding. `hash` is the identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedCommit {
    pub hash: String,
    pub author: String,
    pub date: String,
    pub message: String,
    pub files: Vec<String>,
    pub embedding: Embedding,
}

impl IndexedCommit {
    pub fn from_record(record: CommitRecord, embedding: impl Into<Embedding>) -> Self {
        Self {
            hash: record.hash,
            author: record.author,
            date: record.date,
            message: record.message,
            files: record.files,
            embedding: embedding.into(),
        }
    }

    /// Milliseconds since the epoch, if the date parses.
    pub fn timestamp_millis(&self) -> Option<i64> {
        parse_commit_date(&self.date).map(|d| d.timestamp_millis())
    }
}

/// Element type of the compact vector file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum VectorDtype {
    #[default]
    F32,
    F16,
}

impl VectorDtype {
    pub fn element_size(self) -> usize {
        match self {
            VectorDtype::F32 => crate::vector::BYTES_PER_F32,
            VectorDtype::F16 => crate::vector::BYTES_PER_F16,
        }
    }

    /// Name used in the compact metadata descriptor.
    pub fn descriptor_name(self) -> &'static str {
        match self {
            VectorDtype::F32 => "float32",
            VectorDtype::F16 => "float16",
        }
    }

    pub fn from_descriptor_name(name: &str) -> Option<Self> {
        match name {
            "float32" => Some(VectorDtype::F32),
            "float16" => Some(VectorDtype::F16),
            _ => None,
        }
    }

    /// Suffix of the binary vector file (`index.vec.f32`).
    pub fn file_suffix(self) -> &'static str {
        match self {
            VectorDtype::F32 => "f32",
            VectorDtype::F16 => "f16",
        }
    }

    pub fn other(self) -> Self {
        match self {
            VectorDtype::F32 => VectorDtype::F16,
            VectorDtype::F16 => VectorDtype::F32,
        }
    }
}

impl fmt::Display for VectorDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_suffix())
    }
}

/// Requested vector search strategy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategyName {
    #[default]
    Auto,
    Exact,
    Ann,
}

impl fmt::Display for SearchStrategyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchStrategyName::Auto => "auto",
            SearchStrategyName::Exact => "exact",
            SearchStrategyName::Ann => "ann",
        })
    }
}

/// The full semantic index, as persisted in `index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticIndex {
    pub version: u32,
    pub model_name: String,
    pub created_at: String,
    pub last_updated_at: String,
    pub repository_root: String,
    pub include_patch: bool,
    #[serde(default)]
    pub vector_dtype: VectorDtype,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub commits: Vec<IndexedCommit>,
}

impl SemanticIndex {
    pub fn new(model_name: impl Into<String>, repository_root: impl Into<String>) -> Self {
        let now = now_iso();
        Self {
            version: INDEX_VERSION,
            model_name: model_name.into(),
            created_at: now.clone(),
            last_updated_at: now,
            repository_root: repository_root.into(),
            include_patch: false,
            vector_dtype: VectorDtype::F32,
            checksum: None,
            commits: Vec::new(),
        }
    }

    /// Embedding length, taken from the first commit.
    pub fn dimension(&self) -> usize {
        self.commits.first().map_or(0, |c| c.embedding.len())
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Current time as `2024-05-01T12:00:00.000Z`.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a commit date. Accepts RFC 3339 and git's `YYYY-MM-DD HH:MM:SS +ZZZZ`.
pub fn parse_commit_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim())
        .or_else(|_| DateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M:%S %z"))
        .ok()
}

/// Parse a `--after`/`--before` argument: RFC 3339, or `YYYY-MM-DD` at UTC midnight.
pub fn parse_date_arg(value: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid date '{value}': expected RFC 3339 or YYYY-MM-DD"))
}

/// Stable newest-first ordering; unparseable dates sort last.
pub fn sort_by_date_desc(commits: &mut [IndexedCommit]) {
    commits.sort_by_cached_key(|c| std::cmp::Reverse(c.timestamp_millis().unwrap_or(i64::MIN)));
}
