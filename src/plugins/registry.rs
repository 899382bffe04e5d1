//! Registration table for plugin capabilities.
//!
//! Everything is kept in registration order. Single-slot lookups (embedder,
//! search strategy) return the first plugin that answers; multi-slot ones
//! (signals, filters, hooks) accumulate.

use crate::config::Settings;
use crate::error::{GitsemError, GitsemResult};
use crate::plugins::types::{
    CommitFilter, EmbedderFactory, Hook, HookData, HookPoint, OutputFormatter, Plugin,
    PluginContext, ScoringSignal, SearchStrategyFactory,
};
use crate::storage::RepoPaths;
use crate::vector::{Embedder, VectorSearchStrategy};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// One registered plugin and what it contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub extension_points: Vec<String>,
}

struct Owned<T: ?Sized> {
    plugin: String,
    value: Arc<T>,
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<PluginInfo>,
    embedder_factories: Vec<Owned<dyn EmbedderFactory>>,
    strategy_factories: Vec<(Owned<dyn SearchStrategyFactory>, PluginContext)>,
    scoring_signals: Vec<Owned<dyn ScoringSignal>>,
    formatters: HashMap<String, Arc<dyn OutputFormatter>>,
    commit_filters: Vec<Owned<dyn CommitFilter>>,
    hooks: Vec<Owned<dyn Hook>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every capability `plugin` offers.
    pub fn register(&mut self, plugin: &dyn Plugin, context: PluginContext) {
        let meta = plugin.meta();
        let name = meta.name.clone();
        let mut extension_points = Vec::new();

        if let Some(factory) = plugin.embedder_factory() {
            extension_points.push("embedder".to_string());
            self.embedder_factories.push(Owned {
                plugin: name.clone(),
                value: factory,
            });
        }

        if let Some(factory) = plugin.search_strategy_factory() {
            extension_points.push("searchStrategy".to_string());
            self.strategy_factories.push((
                Owned {
                    plugin: name.clone(),
                    value: factory,
                },
                context,
            ));
        }

        for signal in plugin.scoring_signals() {
            extension_points.push(format!("scoring:{}", signal.name()));
            self.scoring_signals.push(Owned {
                plugin: name.clone(),
                value: signal,
            });
        }

        for formatter in plugin.output_formatters() {
            let bare = formatter.name().to_string();
            extension_points.push(format!("formatter:{bare}"));
            self.formatters
                .insert(format!("{name}:{bare}"), Arc::clone(&formatter));
            // First registration keeps the bare alias
            self.formatters.entry(bare).or_insert(formatter);
        }

        for filter in plugin.commit_filters() {
            extension_points.push(format!("filter:{}", filter.name()));
            self.commit_filters.push(Owned {
                plugin: name.clone(),
                value: filter,
            });
        }

        for hook in plugin.hooks() {
            extension_points.push(format!("hook:{}", hook.point()));
            self.hooks.push(Owned {
                plugin: name.clone(),
                value: hook,
            });
        }

        tracing::debug!(plugin = %name, points = ?extension_points, "registered plugin");
        self.plugins.push(PluginInfo {
            name: meta.name,
            version: meta.version,
            description: meta.description,
            extension_points,
        });
    }

    /// The first factory that accepts `model_name`.
    pub fn embedder(
        &self,
        model_name: &str,
        cache_dir: &Path,
    ) -> Option<GitsemResult<Box<dyn Embedder>>> {
        self.embedder_factories.iter().find_map(|entry| {
            let created = entry.value.create(model_name, cache_dir)?;
            tracing::debug!(plugin = %entry.plugin, model = model_name, "plugin embedder selected");
            Some(created)
        })
    }

    pub fn search_strategy(&self, commit_count: usize) -> Option<Box<dyn VectorSearchStrategy>> {
        self.strategy_factories
            .iter()
            .find_map(|(entry, context)| entry.value.create(commit_count, context))
    }

    pub fn scoring_signals(&self) -> impl Iterator<Item = &dyn ScoringSignal> {
        self.scoring_signals.iter().map(|entry| entry.value.as_ref())
    }

    /// Look up by `plugin:name`, or by bare name.
    pub fn output_formatter(&self, name: &str) -> Option<&dyn OutputFormatter> {
        self.formatters.get(name).map(|f| f.as_ref())
    }

    pub fn formatter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.formatters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn commit_filters(&self) -> impl Iterator<Item = &dyn CommitFilter> {
        self.commit_filters.iter().map(|entry| entry.value.as_ref())
    }

    pub fn hooks(&self, point: HookPoint) -> impl Iterator<Item = &dyn Hook> {
        self.hooks
            .iter()
            .filter(move |entry| entry.value.point() == point)
            .map(|entry| entry.value.as_ref())
    }

    /// Run the hook chain for `data`'s point in registration order.
    pub fn run_hooks(&self, data: HookData) -> GitsemResult<HookData> {
        let point = data.point();
        let mut current = data;

        for entry in self.hooks.iter().filter(|e| e.value.point() == point) {
            let hook = entry.value.as_ref();
            let outcome = if hook.soft_fail() {
                let fallback = current.clone();
                match hook.execute(current) {
                    Ok(next) => next,
                    Err(e) => {
                        tracing::warn!(plugin = %entry.plugin, %point, error = %e, "soft-fail hook failed; continuing");
                        fallback
                    }
                }
            } else {
                hook.execute(current)?
            };

            if outcome.point() != point {
                return Err(GitsemError::Plugin {
                    plugin: entry.plugin.clone(),
                    reason: format!("{point} hook returned {} data", outcome.point()),
                });
            }
            current = outcome;
        }
        Ok(current)
    }

    pub fn describe(&self) -> &[PluginInfo] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Activate and register `plugins`. A plugin that fails to activate is
/// logged and left out.
pub fn build_registry(
    plugins: Vec<Box<dyn Plugin>>,
    repo: &RepoPaths,
    settings: &Settings,
) -> PluginRegistry {
    let mut registry = PluginRegistry::new();

    for mut plugin in plugins {
        let name = plugin.meta().name;
        let context = PluginContext {
            plugin_name: name.clone(),
            repo_root: repo.repo_root.clone(),
            semantic_dir: repo.semantic_dir.clone(),
            cache_dir: repo.cache_dir.clone(),
            config: settings.plugin_config(&name),
        };

        if let Err(e) = plugin.activate(&context) {
            tracing::error!(plugin = %name, error = %e, "failed to activate plugin");
            continue;
        }
        registry.register(plugin.as_ref(), context);
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::types::PluginMeta;
    use crate::search::SearchFilters;
    use crate::types::CommitRecord;
    use crate::vector::HashEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Upper;

    impl OutputFormatter for Upper {
        fn name(&self) -> &str {
            "loud"
        }
        fn render(&self, payload: &crate::search::SearchPayload) -> GitsemResult<String> {
            Ok(payload.query.to_uppercase())
        }
    }

    struct AppendHook {
        suffix: &'static str,
        fail: bool,
        soft: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Hook for AppendHook {
        fn point(&self) -> HookPoint {
            HookPoint::PreSearch
        }
        fn soft_fail(&self) -> bool {
            self.soft
        }
        fn execute(&self, data: HookData) -> GitsemResult<HookData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GitsemError::General("boom".to_string()));
            }
            match data {
                HookData::PreSearch { query, filters } => Ok(HookData::PreSearch {
                    query: format!("{query}{}", self.suffix),
                    filters,
                }),
                other => Ok(other),
            }
        }
    }

    struct HashFactory;

    impl EmbedderFactory for HashFactory {
        fn create(
            &self,
            model_name: &str,
            _cache_dir: &Path,
        ) -> Option<GitsemResult<Box<dyn Embedder>>> {
            (model_name == "test/hash").then(|| {
                HashEmbedder::new(8)
                    .map(|e| Box::new(e) as Box<dyn Embedder>)
                    .map_err(GitsemError::from)
            })
        }
    }

    #[derive(Default)]
    struct TestPlugin {
        name: &'static str,
        hooks: Vec<Arc<dyn Hook>>,
        formatter: bool,
        embedder: bool,
        fail_activation: bool,
    }

    impl Plugin for TestPlugin {
        fn meta(&self) -> PluginMeta {
            PluginMeta {
                name: self.name.to_string(),
                version: "0.1.0".to_string(),
                description: None,
            }
        }
        fn activate(&mut self, _context: &PluginContext) -> GitsemResult<()> {
            if self.fail_activation {
                return Err(GitsemError::config("bad plugin config"));
            }
            Ok(())
        }
        fn embedder_factory(&self) -> Option<Arc<dyn EmbedderFactory>> {
            self.embedder.then(|| Arc::new(HashFactory) as Arc<dyn EmbedderFactory>)
        }
        fn output_formatters(&self) -> Vec<Arc<dyn OutputFormatter>> {
            if self.formatter {
                vec![Arc::new(Upper)]
            } else {
                vec![]
            }
        }
        fn hooks(&self) -> Vec<Arc<dyn Hook>> {
            self.hooks.clone()
        }
    }

    fn context(name: &str) -> PluginContext {
        PluginContext {
            plugin_name: name.to_string(),
            repo_root: "/repo".into(),
            semantic_dir: "/repo/.git/semantic-index".into(),
            cache_dir: "/repo/.git/semantic-index/cache".into(),
            config: serde_json::Value::Null,
        }
    }

    fn hook(suffix: &'static str, fail: bool, soft: bool, calls: &Arc<AtomicUsize>) -> Arc<dyn Hook> {
        Arc::new(AppendHook {
            suffix,
            fail,
            soft,
            calls: Arc::clone(calls),
        })
    }

    fn pre_search(query: &str) -> HookData {
        HookData::PreSearch {
            query: query.to_string(),
            filters: SearchFilters::default(),
        }
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::new();
        registry.register(
            &TestPlugin {
                name: "a",
                hooks: vec![hook("-a", false, false, &calls)],
                ..Default::default()
            },
            context("a"),
        );
        registry.register(
            &TestPlugin {
                name: "b",
                hooks: vec![hook("-b", false, false, &calls)],
                ..Default::default()
            },
            context("b"),
        );

        let HookData::PreSearch { query, .. } = registry.run_hooks(pre_search("q")).unwrap() else {
            panic!("hook point changed");
        };
        assert_eq!(query, "q-a-b");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Other points pass through untouched
        let data = registry
            .run_hooks(HookData::PreIndex {
                commits: Vec::<CommitRecord>::new(),
            })
            .unwrap();
        assert!(matches!(data, HookData::PreIndex { .. }));
    }

    #[test]
    fn test_soft_fail_continues_hard_fail_aborts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::new();
        registry.register(
            &TestPlugin {
                name: "soft",
                hooks: vec![hook("", true, true, &calls), hook("-ok", false, false, &calls)],
                ..Default::default()
            },
            context("soft"),
        );
        let HookData::PreSearch { query, .. } = registry.run_hooks(pre_search("q")).unwrap() else {
            panic!("hook point changed");
        };
        assert_eq!(query, "q-ok");

        registry.register(
            &TestPlugin {
                name: "hard",
                hooks: vec![hook("", true, false, &calls)],
                ..Default::default()
            },
            context("hard"),
        );
        assert!(registry.run_hooks(pre_search("q")).is_err());
    }

    #[test]
    fn test_formatter_aliases() {
        let mut registry = PluginRegistry::new();
        for name in ["first", "second"] {
            registry.register(
                &TestPlugin {
                    name,
                    formatter: true,
                    ..Default::default()
                },
                context(name),
            );
        }
        assert!(registry.output_formatter("loud").is_some());
        assert!(registry.output_formatter("first:loud").is_some());
        assert!(registry.output_formatter("second:loud").is_some());
        assert!(registry.output_formatter("quiet").is_none());
        assert_eq!(
            registry.formatter_names(),
            vec!["first:loud", "loud", "second:loud"]
        );
        assert_eq!(registry.describe()[0].extension_points, vec!["formatter:loud"]);
    }

    #[test]
    fn test_embedder_first_answer_wins() {
        let mut registry = PluginRegistry::new();
        assert!(registry.embedder("test/hash", Path::new("/tmp")).is_none());

        registry.register(
            &TestPlugin {
                name: "emb",
                embedder: true,
                ..Default::default()
            },
            context("emb"),
        );
        let embedder = registry
            .embedder("test/hash", Path::new("/tmp"))
            .unwrap()
            .unwrap();
        assert_eq!(embedder.embed_batch(&["x".to_string()]).unwrap()[0].len(), 8);
        assert!(registry.embedder("other", Path::new("/tmp")).is_none());
    }

    #[test]
    fn test_failed_activation_is_skipped() {
        let repo = RepoPaths::from_dirs("/repo", "/repo/.git");
        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(TestPlugin {
                name: "broken",
                fail_activation: true,
                ..Default::default()
            }),
            Box::new(TestPlugin {
                name: "fine",
                ..Default::default()
            }),
        ];
        let registry = build_registry(plugins, &repo, &Settings::default());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.describe()[0].name, "fine");
    }
}
