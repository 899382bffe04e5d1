//! Where index artifacts live inside a repository.
//!
//! ```text
//! <git_dir>/semantic-index/
//!   index.json, index.meta.json, index.vec.f32|f16, index.ann.bin   (legacy layout)
//!   benchmarks.jsonl
//!   cache/metadata.json
//!   models/<key>/index.json ...                                    (per model)
//! ```

use crate::error::GitsemResult;
use crate::git::GitError;
use crate::storage::InitMetadata;
use crate::types::VectorDtype;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const SEMANTIC_DIR: &str = "semantic-index";
pub const INDEX_FILE: &str = "index.json";
pub const COMPACT_META_FILE: &str = "index.meta.json";
pub const ANN_FILE: &str = "index.ann.bin";
pub const BENCHMARKS_FILE: &str = "benchmarks.jsonl";

const SLUG_MAX_LEN: usize = 48;

/// The files that make up one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub dir: PathBuf,
    pub index_file: PathBuf,
    pub compact_meta_file: PathBuf,
    pub ann_file: PathBuf,
}

impl IndexPaths {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            index_file: dir.join(INDEX_FILE),
            compact_meta_file: dir.join(COMPACT_META_FILE),
            ann_file: dir.join(ANN_FILE),
            dir,
        }
    }

    /// `index.vec.f32` or `index.vec.f16`.
    pub fn vector_file(&self, dtype: VectorDtype) -> PathBuf {
        self.dir.join(format!("index.vec.{}", dtype.file_suffix()))
    }

    pub fn exists(&self) -> bool {
        self.index_file.exists() || self.compact_meta_file.exists()
    }
}

/// Locations derived from a repository.
#[derive(Debug, Clone)]
pub struct RepoPaths {
    pub repo_root: PathBuf,
    pub git_dir: PathBuf,
    pub semantic_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub metadata_path: PathBuf,
    pub models_dir: PathBuf,
    pub benchmarks_file: PathBuf,
    pub legacy: IndexPaths,
}

impl RepoPaths {
    /// Find the repository containing `cwd`.
    pub fn discover(cwd: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(cwd).map_err(|source| GitError::NotARepository {
            path: cwd.to_path_buf(),
            source,
        })?;
        let repo_root = repo
            .workdir()
            .ok_or_else(|| GitError::BareRepository {
                path: repo.path().to_path_buf(),
            })?
            .to_path_buf();
        Ok(Self::from_dirs(repo_root, repo.path()))
    }

    pub fn from_dirs(repo_root: impl Into<PathBuf>, git_dir: impl Into<PathBuf>) -> Self {
        let git_dir = git_dir.into();
        let semantic_dir = git_dir.join(SEMANTIC_DIR);
        let cache_dir = semantic_dir.join("cache");
        Self {
            repo_root: repo_root.into(),
            metadata_path: cache_dir.join("metadata.json"),
            models_dir: semantic_dir.join("models"),
            benchmarks_file: semantic_dir.join(BENCHMARKS_FILE),
            legacy: IndexPaths::in_dir(&semantic_dir),
            git_dir,
            cache_dir,
            semantic_dir,
        }
    }

    pub fn model_paths(&self, model: &str) -> IndexPaths {
        IndexPaths::in_dir(self.models_dir.join(model_key(model)))
    }

    /// Model cache directory for downloaded embedding weights.
    pub fn model_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("models")
    }

    /// Pick the index to operate on.
    ///
    /// An explicit model always gets its own directory. Without one, the model
    /// recorded at init time is used if its index exists, else the legacy layout.
    pub fn resolve_target_index_paths(&self, model: Option<&str>) -> GitsemResult<IndexPaths> {
        if let Some(model) = model {
            return Ok(self.model_paths(model));
        }
        if let Some(metadata) = InitMetadata::load(&self.metadata_path)? {
            let paths = self.model_paths(&metadata.model_name);
            if paths.exists() {
                return Ok(paths);
            }
        }
        Ok(self.legacy.clone())
    }
}

/// `<first 10 hex of sha256(model)>-<slug>`, stable across runs.
pub fn model_key(model: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(model.as_bytes()));
    format!("{}-{}", &digest[..10], model_slug(model))
}

fn model_slug(model: &str) -> String {
    let mut slug = String::with_capacity(model.len());
    let mut pending_dash = false;
    for c in model.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(SLUG_MAX_LEN);
    slug.trim_end_matches('-').to_string()
}
