//! Append-only JSONL log of benchmark runs.

use crate::display::TableBuilder;
use crate::error::{ErrorContext, GitsemError, GitsemResult};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Runs shown by `benchmark --history`.
pub const HISTORY_DISPLAY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkHistoryEntry {
    pub timestamp: String,
    pub query: String,
    pub candidates: usize,
    pub limit: usize,
    pub iterations: usize,
    pub baseline_ms: f64,
    pub optimised_ms: f64,
    pub speedup: f64,
}

pub fn append_history(path: &Path, entry: &BenchmarkHistoryEntry) -> GitsemResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).write_path(parent)?;
    }
    let mut line = serde_json::to_string(entry)
        .map_err(|e| GitsemError::General(format!("cannot serialise benchmark entry: {e}")))?;
    line.push('\n');

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .write_path(path)?;
    file.write_all(line.as_bytes()).write_path(path)
}

/// All entries, oldest first. A missing file is an empty history.
pub fn load_history(path: &Path) -> GitsemResult<Vec<BenchmarkHistoryEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path).read_path(path)?;
    raw.lines()
        .enumerate()
        .map(|(n, line)| (n, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| GitsemError::format(path, format!("line {}: {e}", n + 1)))
        })
        .collect()
}

/// The most recent runs, newest first.
pub fn render_history_summary(entries: &[BenchmarkHistoryEntry]) -> String {
    if entries.is_empty() {
        return "No benchmark history yet.".to_string();
    }

    let mut table = TableBuilder::new().set_headers(vec![
        "Timestamp",
        "Speedup",
        "Baseline (ms)",
        "Heap (ms)",
        "Candidates",
        "Query",
    ]);
    for entry in entries.iter().rev().take(HISTORY_DISPLAY_LIMIT) {
        table = table.add_row(vec![
            entry.timestamp.clone(),
            format!("{:.2}x", entry.speedup),
            format!("{:.3}", entry.baseline_ms),
            format!("{:.3}", entry.optimised_ms),
            entry.candidates.to_string(),
            entry.query.clone(),
        ]);
    }
    format!("Recent benchmark runs:\n{}", table.build())
}
