//! Subcommands of the `gitsem` binary.
//!
//! Each `run` returns the exit code on success. Errors propagate to `main`,
//! which maps them to exit codes.

pub mod args;
pub mod benchmark;
pub mod doctor;
pub mod index;
pub mod init;
pub mod search;
pub mod serve;
pub mod stats;
pub mod update;

pub use args::{FilterArgs, IndexingArgs, SearchArgs, WeightArgs};

use crate::config::Settings;
use crate::error::{ErrorContext, GitsemResult};
use crate::git::{GitRepository, load_ignore_patterns};
use crate::plugins::{PluginRegistry, build_registry, load_enabled_plugins};
use crate::storage::{IndexPaths, LoadedIndex, RepoPaths, load_index};
use crate::vector::{Embedder, create_embedder};
use std::path::Path;

/// The repository a command runs against, with its settings.
pub struct Workspace {
    pub paths: RepoPaths,
    pub settings: Settings,
}

impl Workspace {
    pub fn new(paths: RepoPaths, settings: Settings) -> Self {
        Self { paths, settings }
    }

    /// Locate the repository containing the current directory.
    pub fn discover(settings: Settings) -> GitsemResult<Self> {
        let cwd = std::env::current_dir().context("cannot read the current directory")?;
        Self::discover_from(&cwd, settings)
    }

    pub fn discover_from(dir: &Path, settings: Settings) -> GitsemResult<Self> {
        Ok(Self::new(RepoPaths::discover(dir)?, settings))
    }

    pub fn git(&self) -> GitsemResult<GitRepository> {
        Ok(GitRepository::discover(&self.paths.repo_root)?)
    }

    /// Registry holding the plugins named in `plugins.enabled`.
    pub fn registry(&self) -> PluginRegistry {
        build_registry(
            load_enabled_plugins(&self.settings.plugins.enabled),
            &self.paths,
            &self.settings,
        )
    }

    /// Embedder for `model`. Plugin factories are asked first.
    pub fn embedder(
        &self,
        model: &str,
        registry: &PluginRegistry,
        show_progress: bool,
    ) -> GitsemResult<Box<dyn Embedder>> {
        let cache_dir = self.paths.model_cache_dir();
        match registry.embedder(model, &cache_dir) {
            Some(embedder) => embedder,
            None => create_embedder(model, &cache_dir, show_progress),
        }
    }

    /// Index directory for an explicit model or the initialised one.
    pub fn index_paths(&self, model: Option<&str>) -> GitsemResult<IndexPaths> {
        self.paths.resolve_target_index_paths(model)
    }

    pub fn load(&self, model: Option<&str>) -> GitsemResult<(IndexPaths, LoadedIndex)> {
        let paths = self.index_paths(model)?;
        let loaded = load_index(&paths)?;
        crate::debug_print!(
            self,
            "loaded {} commits from {} ({})",
            loaded.index.commits.len(),
            paths.dir.display(),
            loaded.source.as_str()
        );
        Ok((paths, loaded))
    }

    /// Settings and CLI include globs.
    pub fn include_patterns(&self, extra: &[String]) -> Vec<String> {
        let mut patterns = self.settings.indexing.include.clone();
        patterns.extend(extra.iter().cloned());
        patterns
    }

    /// Settings, CLI and `.gitsemignore` exclude globs.
    pub fn exclude_patterns(&self, extra: &[String]) -> GitsemResult<Vec<String>> {
        let mut patterns = self.settings.indexing.exclude.clone();
        patterns.extend(extra.iter().cloned());
        patterns.extend(load_ignore_patterns(&self.paths.repo_root)?);
        Ok(patterns)
    }
}
