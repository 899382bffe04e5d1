//! On-disk integrity: tampering is detected and doctor repairs sidecars.

use crate::common::{embedder, index_request, sample_repo};
use gitsem::GitsemError;
use gitsem::config::AnnBuildPolicy;
use gitsem::io::ExitCode;
use gitsem::run_index;
use gitsem::storage::{IndexSource, load_full, load_index, run_doctor_checks, run_doctor_fixes};
use indicatif::ProgressBar;

fn indexed_repo() -> crate::common::TestRepo {
    let (repo, _) = sample_repo();
    run_index(
        &repo.git(),
        &embedder(),
        &repo.index_paths(),
        &index_request(&repo, AnnBuildPolicy::Never),
        None,
        &ProgressBar::hidden(),
    )
    .unwrap();
    repo
}

#[test]
fn test_compact_and_full_load_agree() {
    let repo = indexed_repo();
    let paths = repo.index_paths();

    let compact = load_index(&paths).unwrap();
    assert_eq!(compact.source, IndexSource::Compact);
    let full = load_full(&paths.index_file).unwrap();
    assert_eq!(compact.index.commits, full.commits);
    assert_eq!(compact.index.checksum, full.checksum);
}

#[test]
fn test_edited_index_json_fails_integrity_check() {
    let repo = indexed_repo();
    let paths = repo.index_paths();

    let raw = std::fs::read_to_string(&paths.index_file).unwrap();
    let tampered = raw.replace("Add README with setup instructions", "Add README");
    assert_ne!(raw, tampered);
    std::fs::write(&paths.index_file, tampered).unwrap();

    let err = load_full(&paths.index_file).unwrap_err();
    assert!(matches!(err, GitsemError::Integrity { .. }));
    assert_eq!(ExitCode::from_error(&err), ExitCode::BlockingError);
}

#[test]
fn test_doctor_regenerates_missing_sidecars() {
    let repo = indexed_repo();
    let repo_paths = repo.paths();
    let paths = repo.index_paths();

    std::fs::remove_file(&paths.compact_meta_file).unwrap();
    let checks = run_doctor_checks(&repo_paths, &paths);
    let compact = checks.iter().find(|c| c.name == "compact metadata").unwrap();
    assert!(!compact.ok);
    assert_eq!(load_index(&paths).unwrap().source, IndexSource::Full);

    let report = run_doctor_fixes(&repo_paths, &paths).unwrap();
    assert!(
        report
            .actions
            .iter()
            .any(|a| a.contains("regenerated compact index sidecars"))
    );
    assert!(repo_paths.metadata_path.exists());

    let checks = run_doctor_checks(&repo_paths, &paths);
    let agreement = checks.iter().find(|c| c.name == "sidecar agreement").unwrap();
    assert!(agreement.ok, "{}", agreement.detail);
    assert_eq!(load_index(&paths).unwrap().source, IndexSource::Compact);
}
