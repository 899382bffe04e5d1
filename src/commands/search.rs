//! `gitsem search`: one hybrid query against the index.

use crate::commands::{SearchArgs, Workspace};
use crate::error::GitsemResult;
use crate::git::{CommitSource, GitRepository};
use crate::io::ExitCode;
use crate::lexical::LexicalCacheStore;
use crate::plugins::PluginRegistry;
use crate::search::{
    SearchContext, SearchOptions, SearchPayload, ensure_format_available, execute_search,
    no_result_suggestions, render_no_results, render_payload,
};
use crate::storage::{IndexPaths, load_ann_handle, load_index};
use crate::types::SemanticIndex;
use crate::vector::{AnnIndexHandle, Embedder};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug, Clone)]
pub struct SearchCommandArgs {
    /// Natural-language description of the change you are looking for
    pub query: String,

    #[command(flatten)]
    pub search: SearchArgs,
}

/// A loaded index with its embedder and optional ANN handle.
pub struct SearchSession {
    pub paths: IndexPaths,
    pub index: SemanticIndex,
    pub embedder: Box<dyn Embedder>,
    pub ann: Option<Arc<dyn AnnIndexHandle>>,
}

impl SearchSession {
    pub fn open(
        workspace: &Workspace,
        model: Option<&str>,
        registry: &PluginRegistry,
    ) -> GitsemResult<Self> {
        let paths = workspace.index_paths(model)?;
        let loaded = load_index(&paths)?;
        let ann = load_ann_handle(&paths, &loaded);
        let embedder = workspace.embedder(&loaded.index.model_name, registry, false)?;
        tracing::debug!(
            commits = loaded.index.commits.len(),
            source = loaded.source.as_str(),
            ann = ann.is_some(),
            "search session ready"
        );
        Ok(Self {
            paths,
            index: loaded.index,
            embedder,
            ann,
        })
    }

    pub fn search(
        &self,
        query: &str,
        options: &SearchOptions,
        lexical: &LexicalCacheStore,
        git: Option<&GitRepository>,
        registry: &PluginRegistry,
    ) -> GitsemResult<Option<SearchPayload>> {
        let context = SearchContext {
            index: &self.index,
            embedder: self.embedder.as_ref(),
            lexical,
            ann: self.ann.clone(),
            source: git.map(|g| g as &dyn CommitSource),
            registry: Some(registry),
        };
        execute_search(query, options, &context)
    }
}

pub fn run(args: &SearchCommandArgs, workspace: &Workspace) -> GitsemResult<ExitCode> {
    let options = args.search.to_options(&workspace.settings);
    let registry = workspace.registry();
    ensure_format_available(&options.format, Some(&registry))?;

    let session = SearchSession::open(workspace, args.search.model.as_deref(), &registry)?;
    let git = if options.snippets {
        Some(workspace.git()?)
    } else {
        None
    };
    let lexical = LexicalCacheStore::default();

    match session.search(&args.query, &options, &lexical, git.as_ref(), &registry)? {
        Some(payload) => {
            println!("{}", render_payload(&payload, &options.format, Some(&registry))?);
            Ok(ExitCode::Success)
        }
        None => {
            let min_score = options.effective_min_score();
            let suggestions =
                no_result_suggestions(&options.filters, options.min_score.is_some(), min_score);
            let output = render_no_results(
                &options.format,
                &args.query,
                &session.index.model_name,
                min_score,
                &suggestions,
            )?;
            println!("{output}");
            Ok(ExitCode::NoResults)
        }
    }
}
