//! Candidate filters applied before any scoring.

use crate::types::{IndexedCommit, parse_commit_date};
use crate::vector::Candidate;
use chrono::{DateTime, Utc};

/// Author and file filters are case-insensitive substrings. Date bounds
/// are exclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub author: Option<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub file: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.author.is_none() && self.after.is_none() && self.before.is_none() && self.file.is_none()
    }

    pub fn matches(&self, commit: &IndexedCommit) -> bool {
        if let Some(author) = &self.author {
            if !commit.author.to_lowercase().contains(&author.to_lowercase()) {
                return false;
            }
        }

        if self.after.is_some() || self.before.is_some() {
            // An undated commit cannot satisfy a date bound
            let Some(date) = parse_commit_date(&commit.date) else {
                return false;
            };
            if self.after.is_some_and(|after| date <= after) {
                return false;
            }
            if self.before.is_some_and(|before| date >= before) {
                return false;
            }
        }

        if let Some(file) = &self.file {
            let needle = file.to_lowercase();
            if !commit.files.iter().any(|f| f.to_lowercase().contains(&needle)) {
                return false;
            }
        }

        true
    }

    /// Matching commits, each tagged with its row in `commits`.
    pub fn apply<'a>(&self, commits: &'a [IndexedCommit]) -> Vec<Candidate<'a>> {
        commits
            .iter()
            .enumerate()
            .filter(|(_, commit)| self.matches(commit))
            .map(|(global_index, commit)| Candidate {
                global_index,
                commit,
            })
            .collect()
    }
}
