//! Compact sidecar: `index.meta.json` (schema v2) plus a flat binary vector file.

use crate::error::{ErrorContext, GitsemError, GitsemResult};
use crate::storage::checksum::{ChecksumInput, CommitFields, compute_checksum};
use crate::storage::check_unique_hashes;
use crate::storage::paths::IndexPaths;
use crate::storage::vectors::{CompactVectors, Embedding};
use crate::types::{INDEX_VERSION, IndexedCommit, SemanticIndex, VectorDtype};
use crate::vector::{encode_f16, encode_f32};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub const COMPACT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactMetaCommit {
    pub hash: String,
    pub author: String,
    pub date: String,
    pub message: String,
    pub files: Vec<String>,
    pub vector_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorDescriptor {
    pub file: String,
    pub dtype: String,
    pub dimension: usize,
    pub count: usize,
    pub normalised: bool,
}

/// Reference to the ANN sidecar built over the same rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnDescriptor {
    pub file: String,
    pub metric: String,
    pub connectivity: usize,
    pub commit_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactIndexMeta {
    pub version: u32,
    pub model_name: String,
    pub created_at: String,
    pub last_updated_at: String,
    pub repository_root: String,
    pub include_patch: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub vector: VectorDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ann: Option<AnnDescriptor>,
    pub commits: Vec<CompactMetaCommit>,
}

impl CompactIndexMeta {
    pub fn from_index(index: &SemanticIndex, ann: Option<AnnDescriptor>) -> Self {
        let dtype = index.vector_dtype;
        Self {
            version: COMPACT_VERSION,
            model_name: index.model_name.clone(),
            created_at: index.created_at.clone(),
            last_updated_at: index.last_updated_at.clone(),
            repository_root: index.repository_root.clone(),
            include_patch: index.include_patch,
            checksum: index.checksum.clone(),
            vector: VectorDescriptor {
                file: format!("index.vec.{}", dtype.file_suffix()),
                dtype: dtype.descriptor_name().to_string(),
                dimension: index.dimension(),
                count: index.commits.len(),
                normalised: true,
            },
            ann,
            commits: index
                .commits
                .iter()
                .enumerate()
                .map(|(vector_offset, commit)| CompactMetaCommit {
                    hash: commit.hash.clone(),
                    author: commit.author.clone(),
                    date: commit.date.clone(),
                    message: commit.message.clone(),
                    files: commit.files.clone(),
                    vector_offset,
                })
                .collect(),
        }
    }

    pub fn dtype(&self) -> Option<VectorDtype> {
        VectorDtype::from_descriptor_name(&self.vector.dtype)
    }

    pub fn recompute_checksum(&self) -> String {
        compute_checksum(ChecksumInput {
            model_name: &self.model_name,
            created_at: &self.created_at,
            last_updated_at: &self.last_updated_at,
            repository_root: &self.repository_root,
            include_patch: self.include_patch,
            commits: self.commits.iter().map(|c| CommitFields {
                hash: &c.hash,
                author: &c.author,
                date: &c.date,
                message: &c.message,
                files: &c.files,
            }),
        })
    }
}

/// Flat row-major bytes for every commit's embedding.
pub fn encode_vectors(index: &SemanticIndex) -> Vec<u8> {
    let dimension = index.dimension();
    let mut bytes = Vec::with_capacity(dimension * index.commits.len() * index.vector_dtype.element_size());
    for commit in &index.commits {
        match index.vector_dtype {
            VectorDtype::F32 => encode_f32(commit.embedding.as_slice(), &mut bytes),
            VectorDtype::F16 => encode_f16(commit.embedding.as_slice(), &mut bytes),
        }
    }
    bytes
}

/// Parse and validate `index.meta.json`.
pub fn read_compact_meta(path: &Path) -> GitsemResult<CompactIndexMeta> {
    let raw = std::fs::read(path).read_path(path)?;
    let meta: CompactIndexMeta = serde_json::from_slice(&raw)
        .map_err(|e| GitsemError::format(path, format!("invalid compact metadata: {e}")))?;

    if meta.version != COMPACT_VERSION {
        return Err(GitsemError::format(
            path,
            format!(
                "Unsupported compact index version: {} (expected {COMPACT_VERSION})",
                meta.version
            ),
        ));
    }
    if meta.dtype().is_none() {
        return Err(GitsemError::format(
            path,
            format!("unsupported vector dtype '{}'", meta.vector.dtype),
        ));
    }
    if !is_plain_file_name(&meta.vector.file) {
        return Err(GitsemError::format(
            path,
            format!("vector file '{}' must be a bare file name", meta.vector.file),
        ));
    }
    if let Some(ann) = &meta.ann {
        if !is_plain_file_name(&ann.file) {
            return Err(GitsemError::format(
                path,
                format!("ANN file '{}' must be a bare file name", ann.file),
            ));
        }
    }
    check_unique_hashes(path, meta.commits.iter().map(|c| c.hash.as_str()))?;
    if let Some(bad) = meta
        .commits
        .iter()
        .find(|c| c.vector_offset >= meta.vector.count)
    {
        return Err(GitsemError::format(
            path,
            format!(
                "commit {} points at vector row {} but the file holds {}",
                bad.hash, bad.vector_offset, meta.vector.count
            ),
        ));
    }
    Ok(meta)
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

/// Load the compact form, with embeddings decoded on first access.
pub fn load_compact(paths: &IndexPaths) -> GitsemResult<(SemanticIndex, Option<AnnDescriptor>)> {
    let meta_path = &paths.compact_meta_file;
    let meta = read_compact_meta(meta_path)?;
    let dtype = meta.dtype().unwrap_or_default();
    let vector_path = paths.dir.join(&meta.vector.file);

    let store = Arc::new(CompactVectors::open(
        &vector_path,
        dtype,
        meta.vector.dimension,
        meta.vector.count,
    )?);

    if let Some(expected) = &meta.checksum {
        if *expected != meta.recompute_checksum() {
            return Err(GitsemError::Integrity {
                path: meta_path.clone(),
                reason: "Compact index checksum mismatch: sidecar may be corrupted.".to_string(),
            });
        }
    }

    let commits = meta
        .commits
        .into_iter()
        .map(|c| IndexedCommit {
            hash: c.hash,
            author: c.author,
            date: c.date,
            message: c.message,
            files: c.files,
            embedding: Embedding::Row {
                store: Arc::clone(&store),
                row: c.vector_offset,
            },
        })
        .collect();

    let index = SemanticIndex {
        version: INDEX_VERSION,
        model_name: meta.model_name,
        created_at: meta.created_at,
        last_updated_at: meta.last_updated_at,
        repository_root: meta.repository_root,
        include_patch: meta.include_patch,
        vector_dtype: dtype,
        checksum: meta.checksum,
        commits,
    };

    Ok((index, meta.ann))
}
