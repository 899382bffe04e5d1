//! Index a real git repository with the hash embedder, then search it.

use crate::common::{embedder, index_request, sample_repo};
use gitsem::config::{AnnBuildPolicy, Settings};
use gitsem::lexical::LexicalCacheStore;
use gitsem::search::{OutputFormat, SearchFilters, render_payload};
use gitsem::storage::load_index;
use gitsem::{SearchContext, SearchOptions, execute_search, run_index};
use indicatif::ProgressBar;

fn json_options() -> SearchOptions {
    let mut options = SearchOptions::from_settings(&Settings::default());
    options.format = OutputFormat::Json;
    options.limit = 3;
    options
}

#[test]
fn test_index_then_search_ranks_matching_commit_first() {
    let (repo, [_, fix, _]) = sample_repo();
    let git = repo.git();
    let embedder = embedder();
    let paths = repo.index_paths();

    let report = run_index(
        &git,
        &embedder,
        &paths,
        &index_request(&repo, AnnBuildPolicy::Never),
        None,
        &ProgressBar::hidden(),
    )
    .unwrap();
    assert_eq!(report.commits, 3);
    assert!(!report.ann_built);

    let loaded = load_index(&paths).unwrap();
    assert_eq!(loaded.index.commits.len(), 3);
    // Newest first.
    assert_eq!(loaded.index.commits[0].message, "Update CI workflow caching");

    let lexical = LexicalCacheStore::default();
    let context = SearchContext {
        index: &loaded.index,
        embedder: &embedder,
        lexical: &lexical,
        ann: None,
        source: Some(&git),
        registry: None,
    };
    let options = json_options();
    let payload = execute_search("token refresh race in auth", &options, &context)
        .unwrap()
        .expect("expected results");

    assert!(payload.returned_results >= 1);
    assert_eq!(payload.total_indexed_commits, 3);
    assert_eq!(payload.strategy, "exact");
    assert_eq!(payload.results[0].hash, fix.to_string());
    assert_eq!(payload.results[0].rank, 1);
    assert_eq!(payload.results[0].files, vec!["src/auth.rs"]);
    let min_score = options.effective_min_score();
    assert!(payload.results.iter().all(|r| r.score >= min_score));

    let json = render_payload(&payload, &options.format, None).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["results"][0]["hash"], fix.to_string());
    assert_eq!(value["filters"]["limit"], 3);
}

#[test]
fn test_filters_and_snippets_against_real_history() {
    let (repo, [_, fix, _]) = sample_repo();
    let git = repo.git();
    let embedder = embedder();
    let paths = repo.index_paths();
    run_index(
        &git,
        &embedder,
        &paths,
        &index_request(&repo, AnnBuildPolicy::Never),
        None,
        &ProgressBar::hidden(),
    )
    .unwrap();
    let index = load_index(&paths).unwrap().index;

    let lexical = LexicalCacheStore::default();
    let context = SearchContext {
        index: &index,
        embedder: &embedder,
        lexical: &lexical,
        ann: None,
        source: Some(&git),
        registry: None,
    };

    let mut options = json_options();
    options.filters = SearchFilters {
        file: Some("AUTH".to_string()),
        ..Default::default()
    };
    options.snippets = true;
    options.snippet_lines = 4;
    let payload = execute_search("refresh", &options, &context).unwrap().unwrap();
    assert_eq!(payload.matched_commits, 1);
    assert_eq!(payload.results[0].hash, fix.to_string());
    let snippet = payload.results[0].snippet.as_deref().unwrap();
    assert!(snippet.contains("+fn refresh_token() {}"));

    options.filters = SearchFilters {
        author: Some("nobody".to_string()),
        ..Default::default()
    };
    assert!(execute_search("refresh", &options, &context).unwrap().is_none());
}
