//! Incremental update on linear and rewritten histories.

use crate::common::{TestRepo, embedder, index_request, sample_repo, update_request};
use gitsem::config::AnnBuildPolicy;
use gitsem::storage::load_index;
use gitsem::vector::create_embedder;
use gitsem::{GitsemError, run_index, run_update};
use indicatif::ProgressBar;

fn index_repo(repo: &TestRepo) {
    run_index(
        &repo.git(),
        &embedder(),
        &repo.index_paths(),
        &index_request(repo, AnnBuildPolicy::Never),
        None,
        &ProgressBar::hidden(),
    )
    .unwrap();
}

#[test]
fn test_linear_update_appends_new_commits() {
    let (repo, _) = sample_repo();
    index_repo(&repo);

    let newest = repo.commit(
        "Retry token refresh on 401",
        &[("src/auth.rs", "fn refresh_token() { retry() }\n")],
        1,
    );
    let cache = repo.path().join("model-cache");
    let report = run_update(
        &repo.git(),
        |model| create_embedder(model, &cache, false),
        &repo.index_paths(),
        &update_request(AnnBuildPolicy::Never),
        &ProgressBar::hidden(),
    )
    .unwrap();

    assert!(!report.divergence);
    assert_eq!(report.embedded, 1);
    assert_eq!(report.total, 4);
    let index = load_index(&repo.index_paths()).unwrap().index;
    assert_eq!(index.commits[0].hash, newest.to_string());
}

#[test]
fn test_up_to_date_update_never_builds_embedder() {
    let (repo, _) = sample_repo();
    index_repo(&repo);

    let report = run_update(
        &repo.git(),
        |_| Err(GitsemError::General("embedder should not be built".to_string())),
        &repo.index_paths(),
        &update_request(AnnBuildPolicy::Never),
        &ProgressBar::hidden(),
    )
    .unwrap();
    assert!(report.up_to_date);
    assert_eq!(report.total, 3);
}

#[test]
fn test_rewritten_history_is_recovered_within_window() {
    let (repo, [first, second, third]) = sample_repo();
    index_repo(&repo);

    // Drop the newest commit and replace it, as a force-push would.
    repo.reset_hard(second);
    let replacement = repo.commit(
        "Update CI workflow caching and matrix",
        &[(".github/workflows/ci.yml", "name: ci\nmatrix: [stable]\n")],
        9,
    );

    let cache = repo.path().join("model-cache");
    let report = run_update(
        &repo.git(),
        |model| create_embedder(model, &cache, false),
        &repo.index_paths(),
        &update_request(AnnBuildPolicy::Never),
        &ProgressBar::hidden(),
    )
    .unwrap();

    assert!(report.divergence);
    assert!(report.window_start.is_some());
    assert_eq!(report.total, 3);

    let hashes: Vec<String> = load_index(&repo.index_paths())
        .unwrap()
        .index
        .commits
        .into_iter()
        .map(|c| c.hash)
        .collect();
    assert_eq!(
        hashes,
        vec![replacement.to_string(), second.to_string(), first.to_string()]
    );
    assert!(!hashes.contains(&third.to_string()));
}
