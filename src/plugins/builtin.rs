//! Plugins compiled into the binary, enabled by name in `plugins.enabled`.

use crate::error::{GitsemError, GitsemResult};
use crate::lexical::tokenize;
use crate::plugins::types::{
    CommitFilter, OutputFormatter, Plugin, PluginContext, PluginMeta, ScoringSignal,
};
use crate::search::SearchPayload;
use crate::types::IndexedCommit;
use std::sync::Arc;

pub const BUILTIN_PLUGINS: &[&str] = &["csv", "conventional"];

pub fn builtin_plugin(name: &str) -> Option<Box<dyn Plugin>> {
    match name {
        "csv" => Some(Box::new(CsvPlugin)),
        "conventional" => Some(Box::new(ConventionalPlugin::default())),
        _ => None,
    }
}

/// Instantiate the enabled built-ins in order. Unknown names are skipped.
pub fn load_enabled_plugins(enabled: &[String]) -> Vec<Box<dyn Plugin>> {
    enabled
        .iter()
        .filter_map(|name| {
            let plugin = builtin_plugin(name);
            if plugin.is_none() {
                tracing::warn!(
                    plugin = %name,
                    available = ?BUILTIN_PLUGINS,
                    "unknown plugin in plugins.enabled"
                );
            }
            plugin
        })
        .collect()
}

// CSV output

struct CsvPlugin;

impl Plugin for CsvPlugin {
    fn meta(&self) -> PluginMeta {
        PluginMeta {
            name: "csv".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: Some("Render search results as CSV".to_string()),
        }
    }

    fn output_formatters(&self) -> Vec<Arc<dyn OutputFormatter>> {
        vec![Arc::new(CsvFormatter)]
    }
}

struct CsvFormatter;

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl OutputFormatter for CsvFormatter {
    fn name(&self) -> &str {
        "csv"
    }

    fn render(&self, payload: &SearchPayload) -> GitsemResult<String> {
        let mut out = String::from("rank,score,hash,date,author,message,files\n");
        for result in &payload.results {
            let row = [
                result.rank.to_string(),
                format!("{:.4}", result.score),
                result.hash.clone(),
                result.date.clone(),
                csv_field(&result.author),
                csv_field(&result.message),
                csv_field(&result.files.join(";")),
            ];
            out.push_str(&row.join(","));
            out.push('\n');
        }
        Ok(out)
    }
}

// Conventional commits

const DEFAULT_TYPE_WEIGHT: f32 = 0.1;

/// Boosts commits whose conventional-commit type (`fix(auth): ...`) the
/// query mentions, and can hide merge commits.
struct ConventionalPlugin {
    weight: f32,
    skip_merges: bool,
}

impl Default for ConventionalPlugin {
    fn default() -> Self {
        Self {
            weight: DEFAULT_TYPE_WEIGHT,
            skip_merges: false,
        }
    }
}

impl Plugin for ConventionalPlugin {
    fn meta(&self) -> PluginMeta {
        PluginMeta {
            name: "conventional".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: Some("Conventional-commit type matching".to_string()),
        }
    }

    fn activate(&mut self, context: &PluginContext) -> GitsemResult<()> {
        if let Some(weight) = context.config_f64("weight") {
            if !weight.is_finite() || weight < 0.0 {
                return Err(GitsemError::Plugin {
                    plugin: context.plugin_name.clone(),
                    reason: format!("weight must be a non-negative number, got {weight}"),
                });
            }
            self.weight = weight as f32;
        }
        self.skip_merges = context.config_bool("skip_merges").unwrap_or(false);
        Ok(())
    }

    fn scoring_signals(&self) -> Vec<Arc<dyn ScoringSignal>> {
        vec![Arc::new(TypeMatch {
            weight: self.weight,
        })]
    }

    fn commit_filters(&self) -> Vec<Arc<dyn CommitFilter>> {
        if self.skip_merges {
            vec![Arc::new(SkipMerges)]
        } else {
            Vec::new()
        }
    }
}

/// `fix` from `fix(auth)!: handle expiry`.
pub fn conventional_type(message: &str) -> Option<String> {
    let head: String = message
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let rest = &message[head.len()..];
    let well_formed = rest.starts_with(':') || rest.starts_with('(') || rest.starts_with("!:");
    (!head.is_empty() && well_formed).then(|| head.to_ascii_lowercase())
}

fn canonical_type(word: &str) -> &str {
    match word {
        "bug" | "bugfix" | "fixes" | "fixed" => "fix",
        "feature" | "features" => "feat",
        "doc" | "documentation" => "docs",
        "refactoring" => "refactor",
        "tests" => "test",
        "performance" => "perf",
        other => other,
    }
}

struct TypeMatch {
    weight: f32,
}

impl ScoringSignal for TypeMatch {
    fn name(&self) -> &str {
        "type-match"
    }

    fn default_weight(&self) -> f32 {
        self.weight
    }

    fn score(&self, commit: &IndexedCommit, query: &str) -> f32 {
        let Some(kind) = conventional_type(&commit.message) else {
            return 0.0;
        };
        let mentioned = tokenize(query)
            .iter()
            .any(|word| canonical_type(word) == kind);
        if mentioned { 1.0 } else { 0.0 }
    }
}

struct SkipMerges;

impl CommitFilter for SkipMerges {
    fn name(&self) -> &str {
        "skip-merges"
    }

    fn keep(&self, commit: &IndexedCommit) -> bool {
        !commit.message.starts_with("Merge ")
    }
}
