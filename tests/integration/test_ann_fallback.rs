//! ANN sidecar build, use and stale-sidecar fallback.

use crate::common::{embedder, index_request, sample_repo, update_request};
use gitsem::config::{AnnBuildPolicy, Settings};
use gitsem::lexical::LexicalCacheStore;
use gitsem::search::OutputFormat;
use gitsem::storage::{load_ann_handle, load_index};
use gitsem::types::SearchStrategyName;
use gitsem::vector::create_embedder;
use gitsem::{SearchContext, SearchOptions, execute_search, run_index, run_update};
use indicatif::ProgressBar;

#[test]
fn test_ann_sidecar_serves_search_until_it_goes_stale() {
    let (repo, [_, fix, _]) = sample_repo();
    let paths = repo.index_paths();
    let embedder = embedder();
    let report = run_index(
        &repo.git(),
        &embedder,
        &paths,
        &index_request(&repo, AnnBuildPolicy::Always),
        None,
        &ProgressBar::hidden(),
    )
    .unwrap();
    assert!(report.ann_built);
    assert!(paths.ann_file.exists());

    let loaded = load_index(&paths).unwrap();
    let handle = load_ann_handle(&paths, &loaded).expect("sidecar should load");
    assert_eq!(handle.size(), 3);

    let mut options = SearchOptions::from_settings(&Settings::default());
    options.format = OutputFormat::Json;
    options.limit = 1;
    options.strategy = SearchStrategyName::Ann;
    let lexical = LexicalCacheStore::default();
    let context = SearchContext {
        index: &loaded.index,
        embedder: &embedder,
        lexical: &lexical,
        ann: Some(handle),
        source: None,
        registry: None,
    };
    let payload = execute_search("token refresh race", &options, &context)
        .unwrap()
        .unwrap();
    assert!(payload.strategy.starts_with("ann"));
    assert_eq!(payload.results[0].hash, fix.to_string());

    // A sidecar describing a different corpus is ignored.
    let raw = std::fs::read_to_string(&paths.compact_meta_file).unwrap();
    let mut meta: serde_json::Value = serde_json::from_str(&raw).unwrap();
    meta["ann"]["commitCount"] = serde_json::json!(99);
    std::fs::write(&paths.compact_meta_file, meta.to_string()).unwrap();
    let loaded = load_index(&paths).unwrap();
    assert!(load_ann_handle(&paths, &loaded).is_none());

    options.strategy = SearchStrategyName::Auto;
    let context = SearchContext {
        index: &loaded.index,
        embedder: &embedder,
        lexical: &lexical,
        ann: None,
        source: None,
        registry: None,
    };
    let payload = execute_search("token refresh race", &options, &context)
        .unwrap()
        .unwrap();
    assert_eq!(payload.strategy, "exact");
    assert_eq!(payload.results[0].hash, fix.to_string());
}

#[test]
fn test_update_without_ann_drops_sidecar() {
    let (repo, _) = sample_repo();
    let paths = repo.index_paths();
    run_index(
        &repo.git(),
        &embedder(),
        &paths,
        &index_request(&repo, AnnBuildPolicy::Always),
        None,
        &ProgressBar::hidden(),
    )
    .unwrap();
    assert!(paths.ann_file.exists());

    repo.commit("Document release steps", &[("RELEASE.md", "1. tag\n")], 1);
    let cache = repo.path().join("model-cache");
    run_update(
        &repo.git(),
        |model| create_embedder(model, &cache, false),
        &paths,
        &update_request(AnnBuildPolicy::Never),
        &ProgressBar::hidden(),
    )
    .unwrap();

    let loaded = load_index(&paths).unwrap();
    assert_eq!(loaded.index.commits.len(), 4);
    assert!(!paths.ann_file.exists());
    assert!(load_ann_handle(&paths, &loaded).is_none());
}
