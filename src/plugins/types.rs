//! Extension points a plugin can provide.
//!
//! Each capability is a trait. A [`Plugin`] hands out whichever capabilities
//! it has; the registry never depends on a concrete plugin type.

use crate::error::GitsemResult;
use crate::search::{SearchFilters, SearchPayload};
use crate::types::{CommitRecord, IndexedCommit};
use crate::vector::{Embedder, VectorSearchStrategy};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a plugin runs and the configuration table it was given.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub plugin_name: String,
    pub repo_root: PathBuf,
    pub semantic_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// `plugins.config.<name>`, `Null` when absent.
    pub config: serde_json::Value,
}

impl PluginContext {
    pub fn config_bool(&self, key: &str) -> Option<bool> {
        self.config.get(key).and_then(serde_json::Value::as_bool)
    }

    pub fn config_f64(&self, key: &str) -> Option<f64> {
        self.config.get(key).and_then(serde_json::Value::as_f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginMeta {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub trait EmbedderFactory: Send + Sync {
    /// `None` declines the model and lets the next factory try.
    fn create(&self, model_name: &str, cache_dir: &Path) -> Option<GitsemResult<Box<dyn Embedder>>>;
}

pub trait SearchStrategyFactory: Send + Sync {
    fn create(
        &self,
        commit_count: usize,
        context: &PluginContext,
    ) -> Option<Box<dyn VectorSearchStrategy>>;
}

/// Extra score added after the hybrid score, scaled by `default_weight`.
pub trait ScoringSignal: Send + Sync {
    fn name(&self) -> &str;
    fn default_weight(&self) -> f32;
    fn score(&self, commit: &IndexedCommit, query: &str) -> f32;
}

pub trait OutputFormatter: Send + Sync {
    fn name(&self) -> &str;
    fn render(&self, payload: &SearchPayload) -> GitsemResult<String>;
}

/// Candidate predicate applied before scoring.
pub trait CommitFilter: Send + Sync {
    fn name(&self) -> &str;
    fn keep(&self, commit: &IndexedCommit) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HookPoint {
    PreSearch,
    PostSearch,
    PreIndex,
    PostIndex,
}

impl HookPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            HookPoint::PreSearch => "preSearch",
            HookPoint::PostSearch => "postSearch",
            HookPoint::PreIndex => "preIndex",
            HookPoint::PostIndex => "postIndex",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What flows through a hook chain. A hook must return the variant it got.
#[derive(Debug, Clone)]
pub enum HookData {
    PreSearch {
        query: String,
        filters: SearchFilters,
    },
    PostSearch {
        query: String,
        payload: SearchPayload,
    },
    PreIndex {
        commits: Vec<CommitRecord>,
    },
    PostIndex {
        indexed: Vec<IndexedCommit>,
    },
}

impl HookData {
    pub fn point(&self) -> HookPoint {
        match self {
            HookData::PreSearch { .. } => HookPoint::PreSearch,
            HookData::PostSearch { .. } => HookPoint::PostSearch,
            HookData::PreIndex { .. } => HookPoint::PreIndex,
            HookData::PostIndex { .. } => HookPoint::PostIndex,
        }
    }
}

pub trait Hook: Send + Sync {
    fn point(&self) -> HookPoint;

    /// A soft-fail hook logs its error and the chain continues with the
    /// data it was given.
    fn soft_fail(&self) -> bool {
        false
    }

    fn execute(&self, data: HookData) -> GitsemResult<HookData>;
}

/// A bundle of optional capabilities.
pub trait Plugin: Send + Sync {
    fn meta(&self) -> PluginMeta;

    /// Called once before registration. An error skips the plugin.
    fn activate(&mut self, _context: &PluginContext) -> GitsemResult<()> {
        Ok(())
    }

    fn embedder_factory(&self) -> Option<Arc<dyn EmbedderFactory>> {
        None
    }

    fn search_strategy_factory(&self) -> Option<Arc<dyn SearchStrategyFactory>> {
        None
    }

    fn scoring_signals(&self) -> Vec<Arc<dyn ScoringSignal>> {
        Vec::new()
    }

    fn output_formatters(&self) -> Vec<Arc<dyn OutputFormatter>> {
        Vec::new()
    }

    fn commit_filters(&self) -> Vec<Arc<dyn CommitFilter>> {
        Vec::new()
    }

    fn hooks(&self) -> Vec<Arc<dyn Hook>> {
        Vec::new()
    }
}
