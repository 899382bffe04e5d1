//! Incremental update with divergence recovery.
//!
//! When the newest indexed commit is still reachable from HEAD, only newer
//! commits are embedded. When it is gone or no longer an ancestor (rebase,
//! squash, force-push) a trailing window of history is re-derived instead.
//! Corruption older than that window is left as is; a full `index` run is
//! the remedy.

use crate::config::{AnnBuildPolicy, AnnConfig};
use crate::error::{GitsemError, GitsemResult};
use crate::git::{CommitSource, ReadCommitsOptions, filter_commits_by_patterns};
use crate::indexing::pipeline::{dedupe_commits, embed_commits, maybe_build_ann, validate_batch_size};
use crate::storage::{IndexPaths, load_index, save_index};
use crate::types::{
    IndexedCommit, SemanticIndex, VectorDtype, now_iso, parse_commit_date, sort_by_date_desc,
};
use crate::vector::Embedder;
use chrono::{DateTime, Duration, Utc};
use indicatif::ProgressBar;

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Overrides the stored `includePatch` when set.
    pub include_patch: Option<bool>,
    pub batch_size: usize,
    pub vector_dtype: Option<VectorDtype>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub build_ann: AnnBuildPolicy,
    pub ann: AnnConfig,
    pub recovery_window_days: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    pub divergence: bool,
    pub window_start: Option<DateTime<Utc>>,
    pub embedded: usize,
    pub total: usize,
    pub up_to_date: bool,
}

/// Hash and date of the newest indexed commit.
///
/// Falls back to `lastUpdatedAt`, then to now, when the commit date does not
/// parse.
fn newest_commit(index: &SemanticIndex) -> Option<(String, DateTime<Utc>)> {
    let newest = index
        .commits
        .iter()
        .fold(None::<(&IndexedCommit, i64)>, |best, commit| {
            let ts = commit.timestamp_millis().unwrap_or(i64::MIN);
            match best {
                Some((_, best_ts)) if best_ts >= ts => best,
                _ => Some((commit, ts)),
            }
        })?
        .0;

    let date = parse_commit_date(&newest.date)
        .or_else(|| parse_commit_date(&index.last_updated_at))
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    Some((newest.hash.clone(), date))
}

/// Commits dated strictly before `start`. Undated commits count as older.
fn older_than(commits: Vec<IndexedCommit>, start: DateTime<Utc>) -> Vec<IndexedCommit> {
    let start = start.timestamp_millis();
    commits
        .into_iter()
        .filter(|commit| commit.timestamp_millis().is_none_or(|ts| ts < start))
        .collect()
}

/// Bring the index at `paths` up to date with `source`.
///
/// `make_embedder` receives the index's model name and is only called when
/// there is something to embed.
pub fn run_update<F>(
    source: &dyn CommitSource,
    make_embedder: F,
    paths: &IndexPaths,
    request: &UpdateRequest,
    progress: &ProgressBar,
) -> GitsemResult<UpdateReport>
where
    F: FnOnce(&str) -> GitsemResult<Box<dyn Embedder>>,
{
    let batch_size = validate_batch_size(request.batch_size)?;
    let mut index = load_index(paths)?.index;
    let Some((newest_hash, newest_date)) = newest_commit(&index) else {
        return Err(GitsemError::EmptyIndex);
    };

    let divergence = !source.commit_exists(&newest_hash) || !source.is_ancestor(&newest_hash);
    let include_patch = request.include_patch.unwrap_or(index.include_patch);
    let window_start =
        divergence.then(|| newest_date - Duration::days(request.recovery_window_days));

    let options = match window_start {
        Some(start) => {
            tracing::warn!(
                newest = %newest_hash,
                window_start = %start.to_rfc3339(),
                window_days = request.recovery_window_days,
                "history diverged; re-deriving recovery window"
            );
            ReadCommitsOptions {
                include_patch,
                since_date: Some(start),
                ..Default::default()
            }
        }
        None => ReadCommitsOptions {
            include_patch,
            since_hash: Some(newest_hash.clone()),
            ..Default::default()
        },
    };

    let fresh = source.read_commits(&options)?;
    let fresh = filter_commits_by_patterns(fresh, &request.include, &request.exclude)?;
    if fresh.is_empty() {
        tracing::info!(commits = index.commits.len(), "index already up to date");
        return Ok(UpdateReport {
            divergence,
            window_start,
            embedded: 0,
            total: index.commits.len(),
            up_to_date: true,
        });
    }

    let embedder = make_embedder(&index.model_name)?;
    let embedded = embed_commits(fresh, embedder.as_ref(), batch_size, include_patch, progress)?;
    let embedded_count = embedded.len();

    let expected = index.dimension();
    if let Some(found) = embedded.first().map(|c| c.embedding.len()) {
        if found != expected {
            return Err(GitsemError::Embedding {
                model: embedder.model_name().to_string(),
                cache_dir: embedder.cache_dir().map(|p| p.to_path_buf()).unwrap_or_default(),
                reason: format!(
                    "model produced {found}-dimensional vectors but the index holds {expected}; run 'gitsem index' to rebuild"
                ),
            });
        }
    }

    let existing = std::mem::take(&mut index.commits);
    let merged = match window_start {
        // Existing entries first: they win on duplicate hashes
        None => existing.into_iter().chain(embedded).collect(),
        // The fresh window replaces everything at or after its start
        Some(start) => embedded.into_iter().chain(older_than(existing, start)).collect(),
    };
    index.commits = dedupe_commits(merged);
    sort_by_date_desc(&mut index.commits);

    index.last_updated_at = now_iso();
    index.include_patch = include_patch;
    if let Some(dtype) = request.vector_dtype {
        index.vector_dtype = dtype;
    }

    let ann = maybe_build_ann(&index.commits, request.build_ann, &request.ann)?;
    save_index(paths, &mut index, ann.as_ref())?;

    tracing::info!(
        embedded = embedded_count,
        total = index.commits.len(),
        divergence,
        "index updated"
    );
    Ok(UpdateReport {
        divergence,
        window_start,
        embedded: embedded_count,
        total: index.commits.len(),
        up_to_date: false,
    })
}
