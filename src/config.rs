//! Configuration module for gitsem.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`<repo>/.gitsem/settings.toml`)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the commands)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `GITSEM_` and use double underscores
//! to separate nested levels:
//! - `GITSEM_INDEXING__BATCH_SIZE=64` sets `indexing.batch_size`
//! - `GITSEM_SEARCH__MIN_SCORE=0.3` sets `search.min_score`
//! - `GITSEM_LOGGING__LEVEL=debug` sets `logging.level`

use crate::error::{GitsemError, GitsemResult};
use crate::types::{SearchStrategyName, VectorDtype};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Directory holding the settings file, relative to the repository root.
pub const CONFIG_DIR: &str = ".gitsem";
pub const CONFIG_FILE: &str = "settings.toml";
pub const DEFAULT_MODEL: &str = "Xenova/all-MiniLM-L6-v2";

static GLOBAL_DEBUG: AtomicBool = AtomicBool::new(false);

/// Turn on `debug_print!` output for the rest of the process.
pub fn set_global_debug(enabled: bool) {
    GLOBAL_DEBUG.store(enabled, Ordering::Relaxed);
}

pub fn is_global_debug_enabled() -> bool {
    GLOBAL_DEBUG.load(Ordering::Relaxed)
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Embedding model used when no `--model` is given
    #[serde(default = "default_model")]
    pub model: String,

    /// Global debug mode
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub ann: AnnConfig,

    #[serde(default)]
    pub update: UpdateConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,
}

/// When to build the ANN sidecar after indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnnBuildPolicy {
    /// Only once the corpus reaches `ann.commit_threshold`
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Commits embedded per model call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Add a summary of the diff to the embedding text
    #[serde(default)]
    pub include_patch: bool,

    #[serde(default)]
    pub vector_dtype: VectorDtype,

    /// Glob patterns a changed file must match
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns that drop a changed file
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub build_ann: AnnBuildPolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,

    #[serde(default = "default_recency_weight")]
    pub recency_weight: f32,

    #[serde(default = "default_true")]
    pub recency_boost: bool,

    /// Results scoring below this are dropped. Unset means per-format default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,

    #[serde(default = "default_snippet_lines")]
    pub snippet_lines: usize,

    #[serde(default)]
    pub strategy: SearchStrategyName,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnnConfig {
    /// Corpus size at which `auto` switches to ANN
    #[serde(default = "default_commit_threshold")]
    pub commit_threshold: usize,

    /// Over-fetch multiplier applied before filtering ANN hits
    #[serde(default = "default_overfetch")]
    pub overfetch: usize,

    /// Clusters probed per query
    #[serde(default = "default_probes")]
    pub probes: usize,

    /// Below this share of the corpus, filtered searches go exact
    #[serde(default = "default_min_filtered_ratio")]
    pub min_filtered_ratio: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UpdateConfig {
    /// Days re-derived when history diverged
    #[serde(default = "default_recovery_window_days")]
    pub recovery_window_days: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PluginsConfig {
    /// Plugins to activate, in registration order
    #[serde(default)]
    pub enabled: Vec<String>,

    /// Per-plugin configuration tables
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
}

fn default_version() -> u32 {
    1
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_true() -> bool {
    true
}
fn default_batch_size() -> usize {
    32
}
fn default_limit() -> usize {
    10
}
fn default_semantic_weight() -> f32 {
    0.75
}
fn default_lexical_weight() -> f32 {
    0.2
}
fn default_recency_weight() -> f32 {
    0.05
}
fn default_snippet_lines() -> usize {
    12
}
fn default_commit_threshold() -> usize {
    10_000
}
fn default_overfetch() -> usize {
    10
}
fn default_probes() -> usize {
    16
}
fn default_min_filtered_ratio() -> f32 {
    0.1
}
fn default_recovery_window_days() -> i64 {
    90
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            model: default_model(),
            debug: false,
            indexing: IndexingConfig::default(),
            search: SearchConfig::default(),
            ann: AnnConfig::default(),
            update: UpdateConfig::default(),
            logging: LoggingConfig::default(),
            plugins: PluginsConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            include_patch: false,
            vector_dtype: VectorDtype::default(),
            include: Vec::new(),
            exclude: Vec::new(),
            build_ann: AnnBuildPolicy::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            semantic_weight: default_semantic_weight(),
            lexical_weight: default_lexical_weight(),
            recency_weight: default_recency_weight(),
            recency_boost: true,
            min_score: None,
            snippet_lines: default_snippet_lines(),
            strategy: SearchStrategyName::default(),
        }
    }
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            commit_threshold: default_commit_threshold(),
            overfetch: default_overfetch(),
            probes: default_probes(),
            min_filtered_ratio: default_min_filtered_ratio(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            recovery_window_days: default_recovery_window_days(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// `GITSEM_SEARCH__MIN_SCORE` style keys map to `search.min_score`.
fn env_key_to_path(key: &str) -> String {
    key.to_lowercase().replace("__", ".")
}

fn layered(config_path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("GITSEM_").map(|key| env_key_to_path(key.as_str()).into()))
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// The settings file is looked up in the nearest ancestor of the current
    /// directory that has a `.gitsem` directory.
    pub fn load() -> GitsemResult<Self> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring env overrides.
    pub fn load_from(path: impl AsRef<Path>) -> GitsemResult<Self> {
        let path = path.as_ref();
        layered(path)
            .extract()
            .map_err(|e| GitsemError::config(format!("{}: {e}", path.display())))
    }

    /// Find the settings file by looking for a `.gitsem` directory
    /// from the current directory up to root.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Reject out-of-range values before any work starts.
    pub fn validate(&self) -> GitsemResult<()> {
        if !(1..=256).contains(&self.indexing.batch_size) {
            return Err(GitsemError::config(format!(
                "indexing.batch_size must be between 1 and 256, got {}",
                self.indexing.batch_size
            )));
        }
        if !(1..=200).contains(&self.search.limit) {
            return Err(GitsemError::config(format!(
                "search.limit must be between 1 and 200, got {}",
                self.search.limit
            )));
        }
        let weights = [
            ("semantic_weight", self.search.semantic_weight),
            ("lexical_weight", self.search.lexical_weight),
            ("recency_weight", self.search.recency_weight),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(GitsemError::config(format!(
                    "search.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if weights.iter().map(|(_, w)| w).sum::<f32>() <= 0.0 {
            return Err(GitsemError::config(
                "search weights must sum to a positive value",
            ));
        }
        if let Some(min_score) = self.search.min_score {
            if !min_score.is_finite() {
                return Err(GitsemError::config("search.min_score must be finite"));
            }
        }
        if self.search.snippet_lines == 0 {
            return Err(GitsemError::config("search.snippet_lines must be at least 1"));
        }
        if self.ann.overfetch == 0 {
            return Err(GitsemError::config("ann.overfetch must be at least 1"));
        }
        if self.ann.probes == 0 {
            return Err(GitsemError::config("ann.probes must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.ann.min_filtered_ratio) {
            return Err(GitsemError::config(
                "ann.min_filtered_ratio must be between 0 and 1",
            ));
        }
        if self.update.recovery_window_days <= 0 {
            return Err(GitsemError::config(
                "update.recovery_window_days must be positive",
            ));
        }
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => {}
            other => {
                return Err(GitsemError::config(format!(
                    "logging.level '{other}' is not one of trace, debug, info, warn, error, off"
                )));
            }
        }
        Ok(())
    }

    /// Configuration for one plugin with `$VAR` references expanded.
    pub fn plugin_config(&self, plugin: &str) -> serde_json::Value {
        self.plugins
            .config
            .get(plugin)
            .map(interpolate_value)
            .unwrap_or(serde_json::Value::Null)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> GitsemResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| GitsemError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| GitsemError::config(format!("cannot serialise settings: {e}")))?;
        std::fs::write(path, toml_string).map_err(|source| GitsemError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(repo_root: &Path, model: &str, force: bool) -> GitsemResult<PathBuf> {
        let config_path = repo_root.join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err(GitsemError::config(format!(
                "{} already exists. Use --force-config to overwrite",
                config_path.display()
            )));
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| GitsemError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let template = format!(
            r#"# gitsem configuration
# Values here are overridden by GITSEM_* environment variables
# (GITSEM_SEARCH__LIMIT=20) and by command-line flags.

version = 1

# Embedding model. "gitsem/hash-384" is an offline hashing embedder.
model = "{model}"

# Global debug mode
debug = false

[indexing]
batch_size = 32
# Add a summary of each commit's diff to the embedded text
include_patch = false
# "f32" or "f16"
vector_dtype = "f32"
# Glob patterns over changed files; .gitsemignore adds more excludes
include = []
exclude = []
# "auto", "always" or "never"
build_ann = "auto"

[search]
limit = 10
semantic_weight = 0.75
lexical_weight = 0.2
recency_weight = 0.05
recency_boost = true
# min_score = 0.15
snippet_lines = 12
# "auto", "exact" or "ann"
strategy = "auto"

[ann]
commit_threshold = 10000
overfetch = 10
probes = 16
min_filtered_ratio = 0.1

[update]
recovery_window_days = 90

[logging]
# Used when RUST_LOG is not set
level = "warn"

[plugins]
enabled = []

# [plugins.config.my-plugin]
# token = "${{MY_TOKEN}}"
"#
        );

        std::fs::write(&config_path, template).map_err(|source| GitsemError::FileWrite {
            path: config_path.clone(),
            source,
        })?;

        Ok(config_path)
    }
}

fn interpolate_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(interpolate_env(s)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(interpolate_value).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Expand `${VAR}` and `$VAR`; `$$` is a literal `$`. Unset variables expand to "".
pub fn interpolate_env(input: &str) -> String {
    interpolate_with(input, |name| std::env::var(name).ok())
}

fn interpolate_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }
                if closed {
                    out.push_str(&lookup(&name).unwrap_or_default());
                } else {
                    out.push_str("${");
                    out.push_str(&name);
                }
            }
            Some(next) if next.is_ascii_alphabetic() || *next == '_' => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&lookup(&name).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.indexing.batch_size, 32);
        assert_eq!(settings.search.limit, 10);
        assert_eq!(settings.ann.commit_threshold, 10_000);
        assert_eq!(settings.update.recovery_window_days, 90);
        assert!(settings.search.min_score.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
model = "gitsem/hash-384"

[indexing]
batch_size = 8
vector_dtype = "f16"
exclude = ["vendor/**"]
build_ann = "never"

[search]
min_score = 0.3
strategy = "exact"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.model, "gitsem/hash-384");
        assert_eq!(settings.indexing.batch_size, 8);
        assert_eq!(settings.indexing.vector_dtype, VectorDtype::F16);
        assert_eq!(settings.indexing.exclude, vec!["vendor/**"]);
        assert_eq!(settings.indexing.build_ann, AnnBuildPolicy::Never);
        assert_eq!(settings.search.min_score, Some(0.3));
        assert_eq!(settings.search.strategy, SearchStrategyName::Exact);
        // Untouched sections keep defaults
        assert_eq!(settings.ann.probes, 16);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.indexing.batch_size = 2;
        settings.search.recency_boost = false;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.indexing.batch_size, 2);
        assert!(!loaded.search.recency_boost);
    }

    #[test]
    fn test_init_config_file_is_loadable() {
        let temp_dir = TempDir::new().unwrap();
        let path = Settings::init_config_file(temp_dir.path(), "gitsem/hash-384", false).unwrap();
        assert!(path.ends_with(".gitsem/settings.toml"));

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.model, "gitsem/hash-384");
        assert!(settings.validate().is_ok());

        // Second call without force refuses to overwrite
        assert!(Settings::init_config_file(temp_dir.path(), "x", false).is_err());
        assert!(Settings::init_config_file(temp_dir.path(), "x", true).is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut settings = Settings::default();
        settings.indexing.batch_size = 0;
        assert!(matches!(
            settings.validate(),
            Err(GitsemError::Config { .. })
        ));

        let mut settings = Settings::default();
        settings.search.limit = 201;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.search.semantic_weight = 0.0;
        settings.search.lexical_weight = 0.0;
        settings.search.recency_weight = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.ann.overfetch = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.logging.level = "loud".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_env_key_mapping() {
        assert_eq!(env_key_to_path("SEARCH__MIN_SCORE"), "search.min_score");
        assert_eq!(env_key_to_path("MODEL"), "model");
    }

    #[test]
    fn test_interpolation() {
        let lookup = |name: &str| match name {
            "TOKEN" => Some("abc".to_string()),
            "HOME_DIR" => Some("/home/x".to_string()),
            _ => None,
        };
        assert_eq!(interpolate_with("${TOKEN}", lookup), "abc");
        assert_eq!(interpolate_with("$HOME_DIR/cache", lookup), "/home/x/cache");
        assert_eq!(interpolate_with("cost: $$5", lookup), "cost: $5");
        assert_eq!(interpolate_with("${MISSING}-x", lookup), "-x");
        assert_eq!(interpolate_with("trailing $", lookup), "trailing $");
        assert_eq!(interpolate_with("${open", lookup), "${open");
    }

    #[test]
    fn test_plugin_config_interpolates_nested_values() {
        let mut settings = Settings::default();
        settings.plugins.config.insert(
            "demo".to_string(),
            serde_json::json!({ "literal": "$$", "list": ["a", "$$b"], "n": 3 }),
        );
        let config = settings.plugin_config("demo");
        assert_eq!(config["literal"], "$");
        assert_eq!(config["list"][1], "$b");
        assert_eq!(config["n"], 3);
        assert!(settings.plugin_config("absent").is_null());
    }

    #[test]
    fn test_global_debug_flag() {
        set_global_debug(true);
        assert!(is_global_debug_enabled());
        set_global_debug(false);
        assert!(!is_global_debug_enabled());
    }
}
