//! Save and load of the semantic index.
//!
//! Save order: drop the compact metadata, write `index.json`, write the
//! vectors and ANN sidecar, then write the compact metadata last. A crash at
//! any point leaves either no compact metadata (load falls back to the full
//! JSON) or a complete, consistent sidecar.

use crate::error::{ErrorContext, GitsemError, GitsemResult};
use crate::storage::checksum::index_checksum;
use crate::storage::compact::{
    AnnDescriptor, CompactIndexMeta, encode_vectors, load_compact, read_compact_meta,
};
use crate::storage::paths::{ANN_FILE, IndexPaths};
use crate::storage::vectors::Embedding;
use crate::storage::{check_unique_hashes, remove_if_exists, write_atomic};
use crate::types::{INDEX_VERSION, IndexedCommit, SemanticIndex, VectorDtype};
use crate::vector::{ANN_METRIC, AnnIndexHandle, IvfIndex, quantise_f16};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Which representation an index was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Compact,
    Full,
}

impl IndexSource {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexSource::Compact => "compact",
            IndexSource::Full => "full",
        }
    }
}

#[derive(Debug)]
pub struct LoadedIndex {
    pub index: SemanticIndex,
    pub ann: Option<AnnDescriptor>,
    pub source: IndexSource,
}

/// Persist `index` under `paths`, recomputing its checksum.
///
/// With a float16 dtype the in-memory embeddings are rounded to half
/// precision first, so the full JSON and the compact file hold the same values.
pub fn save_index(
    paths: &IndexPaths,
    index: &mut SemanticIndex,
    ann: Option<&IvfIndex>,
) -> GitsemResult<()> {
    std::fs::create_dir_all(&paths.dir).write_path(&paths.dir)?;

    let dimension = index.dimension();
    if let Some(bad) = index.commits.iter().find(|c| c.embedding.len() != dimension) {
        return Err(GitsemError::format(
            &paths.index_file,
            format!(
                "commit {} has a {}-dimensional embedding, expected {dimension}",
                bad.hash,
                bad.embedding.len()
            ),
        ));
    }

    check_unique_hashes(&paths.index_file, index.commits.iter().map(|c| c.hash.as_str()))?;

    if index.vector_dtype == VectorDtype::F16 {
        for commit in &mut index.commits {
            let rounded: Vec<f32> = commit
                .embedding
                .as_slice()
                .iter()
                .map(|&v| quantise_f16(v))
                .collect();
            commit.embedding = Embedding::Owned(rounded);
        }
    }

    index.version = INDEX_VERSION;
    index.checksum = Some(index_checksum(index));

    remove_if_exists(&paths.compact_meta_file)?;

    let json = serde_json::to_vec(index)
        .map_err(|e| GitsemError::format(&paths.index_file, format!("serialisation failed: {e}")))?;
    write_atomic(&paths.index_file, &json)?;

    let dtype = index.vector_dtype;
    write_atomic(&paths.vector_file(dtype), &encode_vectors(index))?;

    let descriptor = match ann {
        Some(ann) => {
            ann.save(&paths.ann_file)?;
            Some(AnnDescriptor {
                file: ANN_FILE.to_string(),
                metric: ANN_METRIC.to_string(),
                connectivity: ann.probes(),
                commit_count: ann.size(),
            })
        }
        None => {
            remove_if_exists(&paths.ann_file)?;
            None
        }
    };

    let meta = CompactIndexMeta::from_index(index, descriptor);
    let meta_json = serde_json::to_vec(&meta).map_err(|e| {
        GitsemError::format(&paths.compact_meta_file, format!("serialisation failed: {e}"))
    })?;
    write_atomic(&paths.compact_meta_file, &meta_json)?;

    remove_if_exists(&paths.vector_file(dtype.other()))?;

    tracing::debug!(
        dir = %paths.dir.display(),
        commits = index.commits.len(),
        dimension,
        dtype = %dtype,
        ann = ann.is_some(),
        "saved semantic index"
    );
    Ok(())
}

/// Load the index, preferring a complete compact sidecar.
pub fn load_index(paths: &IndexPaths) -> GitsemResult<LoadedIndex> {
    if paths.compact_meta_file.exists() {
        let meta = read_compact_meta(&paths.compact_meta_file)?;
        if paths.dir.join(&meta.vector.file).exists() {
            let (index, ann) = load_compact(paths)?;
            return Ok(LoadedIndex {
                index,
                ann,
                source: IndexSource::Compact,
            });
        }
        tracing::warn!(
            file = %meta.vector.file,
            "compact metadata present without its vector file; reading index.json"
        );
    }

    if paths.index_file.exists() {
        return Ok(LoadedIndex {
            index: load_full(&paths.index_file)?,
            ann: None,
            source: IndexSource::Full,
        });
    }

    Err(GitsemError::EmptyIndex)
}

/// Strictly parse the full `index.json`.
pub fn load_full(path: &Path) -> GitsemResult<SemanticIndex> {
    let raw = std::fs::read(path).read_path(path)?;
    let index: SemanticIndex = serde_json::from_slice(&raw)
        .map_err(|e| GitsemError::format(path, format!("invalid index JSON: {e}")))?;

    if index.version != INDEX_VERSION {
        return Err(GitsemError::format(
            path,
            format!(
                "Unsupported index version: {} (expected {INDEX_VERSION})",
                index.version
            ),
        ));
    }
    check_dimensions(path, &index.commits)?;
    check_unique_hashes(path, index.commits.iter().map(|c| c.hash.as_str()))?;

    if let Some(expected) = &index.checksum {
        if *expected != index_checksum(&index) {
            return Err(GitsemError::Integrity {
                path: path.to_path_buf(),
                reason: "Index checksum mismatch: metadata was modified after save.".to_string(),
            });
        }
    }
    Ok(index)
}

fn check_dimensions(path: &Path, commits: &[IndexedCommit]) -> GitsemResult<()> {
    let Some(first) = commits.first() else {
        return Ok(());
    };
    let dimension = first.embedding.len();
    match commits.iter().find(|c| c.embedding.len() != dimension) {
        Some(bad) => Err(GitsemError::format(
            path,
            format!(
                "commit {} has a {}-dimensional embedding, expected {dimension}",
                bad.hash,
                bad.embedding.len()
            ),
        )),
        None => Ok(()),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LenientIndex {
    #[serde(default)]
    model_name: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    last_updated_at: String,
    #[serde(default)]
    repository_root: String,
    #[serde(default)]
    include_patch: bool,
    #[serde(default)]
    vector_dtype: VectorDtype,
    #[serde(default)]
    commits: Vec<IndexedCommit>,
}

/// Parse `index.json` without version or checksum checks.
///
/// Used by repair to recover older or hand-edited files. Structural errors
/// still fail.
pub fn load_index_lenient(path: &Path) -> GitsemResult<SemanticIndex> {
    let raw = std::fs::read(path).read_path(path)?;
    let legacy: LenientIndex = serde_json::from_slice(&raw)
        .map_err(|e| GitsemError::format(path, format!("unreadable index JSON: {e}")))?;
    check_dimensions(path, &legacy.commits)?;

    let total = legacy.commits.len();
    let mut seen = HashSet::with_capacity(total);
    let commits: Vec<IndexedCommit> = legacy
        .commits
        .into_iter()
        .filter(|commit| seen.insert(commit.hash.clone()))
        .collect();
    if commits.len() < total {
        tracing::warn!(
            path = %path.display(),
            dropped = total - commits.len(),
            "dropped repeated commit hashes"
        );
    }

    Ok(SemanticIndex {
        version: INDEX_VERSION,
        model_name: legacy.model_name,
        created_at: legacy.created_at,
        last_updated_at: legacy.last_updated_at,
        repository_root: legacy.repository_root,
        include_patch: legacy.include_patch,
        vector_dtype: legacy.vector_dtype,
        checksum: None,
        commits,
    })
}

/// Bind the ANN sidecar to a loaded index.
///
/// A missing, stale or unreadable sidecar yields `None` with a warning, and
/// callers fall back to exact search.
pub fn load_ann_handle(paths: &IndexPaths, loaded: &LoadedIndex) -> Option<Arc<dyn AnnIndexHandle>> {
    let descriptor = loaded.ann.as_ref()?;
    let commits = &loaded.index.commits;

    if descriptor.commit_count != commits.len() {
        tracing::warn!(
            sidecar = descriptor.commit_count,
            index = commits.len(),
            "ANN sidecar is stale; using exact search"
        );
        return None;
    }
    if descriptor.metric != ANN_METRIC {
        tracing::warn!(metric = %descriptor.metric, "unsupported ANN metric; using exact search");
        return None;
    }

    let path = paths.dir.join(&descriptor.file);
    let rows: Vec<&[f32]> = commits.iter().map(|c| c.embedding.as_slice()).collect();
    match IvfIndex::load(&path, &rows) {
        Ok(index) => Some(Arc::new(index)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ANN sidecar unusable; using exact search");
            None
        }
    }
}

/// Summary of an on-disk index.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub commit_count: usize,
    pub model: String,
    pub index_bytes: u64,
    pub vector_bytes: Option<u64>,
    pub vector_dtype: VectorDtype,
    pub include_patch: bool,
    pub created_at: String,
    pub last_updated_at: String,
    pub ann_present: bool,
    pub source: IndexSource,
}

pub fn index_stats(paths: &IndexPaths) -> GitsemResult<IndexStats> {
    let loaded = load_index(paths)?;
    let index = &loaded.index;
    let file_len = |path: &Path| std::fs::metadata(path).ok().map(|m| m.len());

    Ok(IndexStats {
        commit_count: index.commits.len(),
        model: index.model_name.clone(),
        index_bytes: file_len(&paths.index_file).unwrap_or(0),
        vector_bytes: file_len(&paths.vector_file(index.vector_dtype)),
        vector_dtype: index.vector_dtype,
        include_patch: index.include_patch,
        created_at: index.created_at.clone(),
        last_updated_at: index.last_updated_at.clone(),
        ann_present: loaded.ann.is_some() && paths.ann_file.exists(),
        source: loaded.source,
    })
}
