//! Full indexing: read history, embed in batches, persist.

use crate::config::{AnnBuildPolicy, AnnConfig};
use crate::error::{GitsemError, GitsemResult};
use crate::git::{CommitSource, ReadCommitsOptions, filter_commits_by_patterns};
use crate::indexing::text::build_embedding_text;
use crate::plugins::{HookData, PluginRegistry};
use crate::storage::{IndexPaths, save_index};
use crate::types::{CommitRecord, IndexedCommit, SemanticIndex, VectorDtype};
use crate::vector::similarity::normalise_in_place;
use crate::vector::{Embedder, IvfIndex, VectorDimension, VectorError};
use indicatif::ProgressBar;
use std::collections::HashSet;

pub const MIN_BATCH_SIZE: usize = 1;
pub const MAX_BATCH_SIZE: usize = 256;

pub fn validate_batch_size(batch_size: usize) -> GitsemResult<usize> {
    if (MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&batch_size) {
        Ok(batch_size)
    } else {
        Err(GitsemError::config(format!(
            "batch size must be between {MIN_BATCH_SIZE} and {MAX_BATCH_SIZE}, got {batch_size}"
        )))
    }
}

fn embedding_error(embedder: &dyn Embedder, reason: impl Into<String>) -> GitsemError {
    GitsemError::Embedding {
        model: embedder.model_name().to_string(),
        cache_dir: embedder.cache_dir().map(|p| p.to_path_buf()).unwrap_or_default(),
        reason: reason.into(),
    }
}

/// Embed `commits` in sequential batches, preserving order.
///
/// Vectors are L2-normalised before they are stored. Batch boundaries are
/// the only points where the work can be interrupted.
pub fn embed_commits(
    commits: Vec<CommitRecord>,
    embedder: &dyn Embedder,
    batch_size: usize,
    include_patch: bool,
    progress: &ProgressBar,
) -> GitsemResult<Vec<IndexedCommit>> {
    let batch_size = validate_batch_size(batch_size)?;
    progress.set_length(commits.len() as u64);

    let mut dimension: Option<VectorDimension> = None;
    let mut indexed = Vec::with_capacity(commits.len());
    let mut pending = commits.into_iter().peekable();

    while pending.peek().is_some() {
        let batch: Vec<CommitRecord> = pending.by_ref().take(batch_size).collect();
        let texts: Vec<String> = batch
            .iter()
            .map(|commit| build_embedding_text(commit, include_patch))
            .collect();

        let vectors = embedder
            .embed_batch(&texts)
            .map_err(|e| embedding_error(embedder, e.to_string()))?;
        if vectors.len() != batch.len() {
            return Err(embedding_error(
                embedder,
                format!(
                    "Embedding batch size mismatch: sent {}, received {}",
                    batch.len(),
                    vectors.len()
                ),
            ));
        }

        for (commit, mut vector) in batch.into_iter().zip(vectors) {
            let expected = match dimension {
                Some(dimension) => dimension,
                None => *dimension.insert(VectorDimension::new(vector.len())?),
            };
            expected
                .check(&vector)
                .map_err(|e: VectorError| embedding_error(embedder, e.to_string()))?;
            normalise_in_place(&mut vector);
            indexed.push(IndexedCommit::from_record(commit, vector));
        }
        progress.set_position(indexed.len() as u64);
    }

    progress.finish_and_clear();
    Ok(indexed)
}

/// Keep the first entry for each hash.
pub fn dedupe_commits(commits: Vec<IndexedCommit>) -> Vec<IndexedCommit> {
    let mut seen = HashSet::with_capacity(commits.len());
    commits
        .into_iter()
        .filter(|commit| seen.insert(commit.hash.clone()))
        .collect()
}

/// Build the IVF sidecar when the policy asks for one.
pub fn maybe_build_ann(
    commits: &[IndexedCommit],
    policy: AnnBuildPolicy,
    config: &AnnConfig,
) -> GitsemResult<Option<IvfIndex>> {
    let wanted = match policy {
        AnnBuildPolicy::Never => false,
        AnnBuildPolicy::Always => !commits.is_empty(),
        AnnBuildPolicy::Auto => commits.len() >= config.commit_threshold,
    };
    if !wanted {
        return Ok(None);
    }
    let rows: Vec<&[f32]> = commits.iter().map(|c| c.embedding.as_slice()).collect();
    Ok(Some(IvfIndex::build(&rows, config.probes)?))
}

/// Inputs of a full indexing run.
#[derive(Debug, Clone)]
pub struct IndexRequest {
    pub repository_root: String,
    pub include_patch: bool,
    pub batch_size: usize,
    pub vector_dtype: VectorDtype,
    pub include: Vec<String>,
    /// Already merged with `.gitsemignore`.
    pub exclude: Vec<String>,
    pub build_ann: AnnBuildPolicy,
    pub ann: AnnConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub commits: usize,
    pub dimension: usize,
    pub ann_built: bool,
}

pub fn run_index(
    source: &dyn CommitSource,
    embedder: &dyn Embedder,
    paths: &IndexPaths,
    request: &IndexRequest,
    registry: Option<&PluginRegistry>,
    progress: &ProgressBar,
) -> GitsemResult<IndexReport> {
    let batch_size = validate_batch_size(request.batch_size)?;
    let commits = source.read_commits(&ReadCommitsOptions {
        include_patch: request.include_patch,
        ..Default::default()
    })?;
    let mut commits = filter_commits_by_patterns(commits, &request.include, &request.exclude)?;

    if let Some(registry) = registry {
        if let HookData::PreIndex { commits: hooked } =
            registry.run_hooks(HookData::PreIndex { commits })?
        {
            commits = hooked;
        } else {
            return Err(GitsemError::General("pre-index hook changed the hook point".to_string()));
        }
    }

    if commits.is_empty() {
        return Err(GitsemError::NoCommits);
    }

    tracing::info!(
        commits = commits.len(),
        model = embedder.model_name(),
        "indexing commits"
    );
    let mut indexed = embed_commits(commits, embedder, batch_size, request.include_patch, progress)?;

    if let Some(registry) = registry {
        if let HookData::PostIndex { indexed: hooked } =
            registry.run_hooks(HookData::PostIndex { indexed })?
        {
            indexed = hooked;
        } else {
            return Err(GitsemError::General("post-index hook changed the hook point".to_string()));
        }
    }

    let mut index = SemanticIndex::new(embedder.model_name(), request.repository_root.clone());
    index.include_patch = request.include_patch;
    index.vector_dtype = request.vector_dtype;
    // After the hooks, which may add entries of their own
    index.commits = dedupe_commits(indexed);

    let ann = maybe_build_ann(&index.commits, request.build_ann, &request.ann)?;
    save_index(paths, &mut index, ann.as_ref())?;

    Ok(IndexReport {
        commits: index.commits.len(),
        dimension: index.dimension(),
        ann_built: ann.is_some(),
    })
}
