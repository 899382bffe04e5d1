//! Include/exclude glob filtering of commit file lists.
//!
//! Patterns are compiled with `globset` with a literal separator: `*` and `?`
//! stay within one path segment, `**/` spans directories, and a pattern
//! must match the whole path.

use crate::error::{ErrorContext, GitsemError, GitsemResult};
use crate::types::CommitRecord;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Extra exclude patterns, one per line, at the repository root.
pub const IGNORE_FILE: &str = ".gitsemignore";

pub fn build_globset(patterns: &[String]) -> GitsemResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| GitsemError::config(format!("invalid file pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| GitsemError::config(format!("cannot compile file patterns: {e}")))
}

/// Keep files matching an include pattern (when any are given) and no
/// exclude pattern. A commit whose files all filter away is dropped; a
/// commit that had no files to begin with is kept.
pub fn filter_commits_by_patterns(
    commits: Vec<CommitRecord>,
    include: &[String],
    exclude: &[String],
) -> GitsemResult<Vec<CommitRecord>> {
    if include.is_empty() && exclude.is_empty() {
        return Ok(commits);
    }
    let include = build_globset(include)?;
    let exclude = build_globset(exclude)?;

    let before = commits.len();
    let kept: Vec<CommitRecord> = commits
        .into_iter()
        .filter_map(|mut commit| {
            let had_files = !commit.files.is_empty();
            commit.files = commit
                .files
                .iter()
                .map(|file| file.replace('\\', "/"))
                .filter(|file| include.is_empty() || include.is_match(file))
                .filter(|file| !exclude.is_match(file))
                .collect();
            (!had_files || !commit.files.is_empty()).then_some(commit)
        })
        .collect();

    tracing::debug!(before, after = kept.len(), "applied file patterns");
    Ok(kept)
}

/// Patterns from `.gitsemignore`, skipping blanks and `#` comments.
pub fn load_ignore_patterns(repo_root: &Path) -> GitsemResult<Vec<String>> {
    let path = repo_root.join(IGNORE_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(&path).read_path(&path)?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
