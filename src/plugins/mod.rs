//! Capability registry for compiled-in plugins.
//!
//! A plugin contributes any subset of: an embedder factory, a search
//! strategy factory, scoring signals, output formatters, commit filters and
//! lifecycle hooks. Core code only ever talks to [`PluginRegistry`].

pub mod builtin;
pub mod registry;
pub mod types;

pub use builtin::{BUILTIN_PLUGINS, builtin_plugin, load_enabled_plugins};
pub use registry::{PluginInfo, PluginRegistry, build_registry};
pub use types::{
    CommitFilter, EmbedderFactory, Hook, HookData, HookPoint, OutputFormatter, Plugin,
    PluginContext, PluginMeta, ScoringSignal, SearchStrategyFactory,
};
