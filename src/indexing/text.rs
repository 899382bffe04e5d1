//! The text embedded for each commit.

use crate::types::CommitRecord;

const PATCH_SUMMARY_MAX_LINES: usize = 40;
const PATCH_SUMMARY_MAX_CHARS: usize = 4000;

/// Added and removed lines of a patch, without the `+++`/`---` file headers.
pub fn patch_summary(patch: &str) -> String {
    let lines: Vec<&str> = patch
        .lines()
        .filter(|line| line.starts_with('+') || line.starts_with('-'))
        .filter(|line| !line.starts_with("+++") && !line.starts_with("---"))
        .take(PATCH_SUMMARY_MAX_LINES)
        .collect();
    let joined = lines.join("\n");
    let truncated: String = joined.chars().take(PATCH_SUMMARY_MAX_CHARS).collect();
    truncated.trim().to_string()
}

/// Message first, then files, then an optional patch summary.
pub fn build_embedding_text(commit: &CommitRecord, include_patch: bool) -> String {
    let mut text = format!(
        "message (high-signal):\n{}\n\nfiles (medium-signal):\n{}",
        commit.message,
        commit.files.join("\n")
    );

    if include_patch {
        if let Some(patch) = commit.patch.as_deref() {
            let summary = patch_summary(patch);
            if !summary.is_empty() {
                text.push_str("\n\npatch summary (optional):\n");
                text.push_str(&summary);
            }
        }
    }
    text
}
