//! Helpers shared by the integration tests: throwaway git repositories with
//! controlled commit times, and an offline embedder.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use git2::{Oid, Repository, ResetType, Signature, Time};
use gitsem::config::{AnnBuildPolicy, AnnConfig};
use gitsem::storage::{IndexPaths, RepoPaths};
use gitsem::{GitRepository, HashEmbedder, IndexRequest, UpdateRequest};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const DIMENSION: usize = 384;

pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let repo = Repository::init(dir.path()).expect("Failed to init repository");
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Commit `files` with author and committer time `days_ago` days back.
    pub fn commit(&self, message: &str, files: &[(&str, &str)], days_ago: i64) -> Oid {
        for (path, content) in files {
            let full = self.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).expect("Failed to create parent dirs");
            }
            fs::write(&full, content).expect("Failed to write file");
        }

        let mut index = self.repo.index().expect("Failed to open git index");
        for (path, _) in files {
            index.add_path(Path::new(path)).expect("Failed to stage file");
        }
        index.write().expect("Failed to write git index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let when = (Utc::now() - Duration::days(days_ago)).timestamp();
        let signature = Signature::new("Ada Lovelace", "ada@example.com", &Time::new(when, 0))
            .expect("Failed to build signature");
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .expect("Failed to commit")
    }

    /// Move HEAD and the working tree back to `oid`, orphaning later commits.
    pub fn reset_hard(&self, oid: Oid) {
        let object = self.repo.find_object(oid, None).expect("Failed to find commit");
        self.repo
            .reset(&object, ResetType::Hard, None)
            .expect("Failed to reset");
    }

    pub fn git(&self) -> GitRepository {
        GitRepository::discover(self.path()).expect("Failed to open repository")
    }

    pub fn paths(&self) -> RepoPaths {
        RepoPaths::discover(self.path()).expect("Failed to discover repository")
    }

    pub fn index_paths(&self) -> IndexPaths {
        self.paths().legacy
    }
}

/// Three commits where only the middle one is about token refresh.
pub fn sample_repo() -> (TestRepo, [Oid; 3]) {
    let repo = TestRepo::new();
    let first = repo.commit(
        "Add README with setup instructions",
        &[("README.md", "# Demo\n\nRun `make setup`.\n")],
        30,
    );
    let second = repo.commit(
        "Fix token refresh race in auth middleware",
        &[("src/auth.rs", "fn refresh_token() {}\n")],
        20,
    );
    let third = repo.commit(
        "Update CI workflow caching",
        &[(".github/workflows/ci.yml", "name: ci\n")],
        10,
    );
    (repo, [first, second, third])
}

pub fn embedder() -> HashEmbedder {
    HashEmbedder::new(DIMENSION).expect("Failed to create hash embedder")
}

pub fn index_request(repo: &TestRepo, build_ann: AnnBuildPolicy) -> IndexRequest {
    IndexRequest {
        repository_root: repo.path().display().to_string(),
        include_patch: false,
        batch_size: 2,
        vector_dtype: Default::default(),
        include: Vec::new(),
        exclude: Vec::new(),
        build_ann,
        ann: AnnConfig::default(),
    }
}

pub fn update_request(build_ann: AnnBuildPolicy) -> UpdateRequest {
    UpdateRequest {
        include_patch: None,
        batch_size: 2,
        vector_dtype: None,
        include: Vec::new(),
        exclude: Vec::new(),
        build_ann,
        ann: AnnConfig::default(),
        recovery_window_days: 90,
    }
}
