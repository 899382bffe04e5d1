//! Health checks and repair for on-disk index state.

use crate::error::{ErrorContext, GitsemResult};
use crate::storage::compact::read_compact_meta;
use crate::storage::index_store::{load_full, load_index, load_index_lenient, save_index};
use crate::storage::metadata::InitMetadata;
use crate::storage::paths::{IndexPaths, RepoPaths};
use crate::types::SemanticIndex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl DoctorCheck {
    fn new(name: &'static str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok,
            detail: detail.into(),
        }
    }

    fn presence(name: &'static str, path: &std::path::Path) -> Self {
        let ok = path.exists();
        let state = if ok { "found at" } else { "missing at" };
        Self::new(name, ok, format!("{state} {}", path.display()))
    }
}

/// Outcome of a repair pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DoctorReport {
    pub actions: Vec<String>,
    pub warnings: Vec<String>,
}

/// Size of the compact vector file, if the metadata names a non-empty one.
fn compact_vector_bytes(paths: &IndexPaths) -> Result<u64, String> {
    let meta = read_compact_meta(&paths.compact_meta_file).map_err(|e| e.to_string())?;
    let path = paths.dir.join(&meta.vector.file);
    std::fs::metadata(&path)
        .map(|m| m.len())
        .map_err(|e| format!("{}: {e}", path.display()))
}

/// Compact checksum equals the full-index checksum.
fn sidecar_agrees(paths: &IndexPaths) -> Result<bool, String> {
    let full = load_full(&paths.index_file).map_err(|e| e.to_string())?;
    let meta = read_compact_meta(&paths.compact_meta_file).map_err(|e| e.to_string())?;
    Ok(full.checksum.is_some() && meta.checksum == full.checksum)
}

pub fn run_doctor_checks(repo: &RepoPaths, paths: &IndexPaths) -> Vec<DoctorCheck> {
    let mut checks = vec![
        DoctorCheck::presence("index", &paths.index_file),
        DoctorCheck::presence("compact metadata", &paths.compact_meta_file),
    ];

    checks.push(match compact_vector_bytes(paths) {
        Ok(bytes) if bytes > 0 => {
            DoctorCheck::new("compact vectors", true, format!("found ({bytes} bytes)"))
        }
        Ok(_) => DoctorCheck::new("compact vectors", false, "vector file is empty"),
        Err(reason) => DoctorCheck::new(
            "compact vectors",
            false,
            format!("missing or unreadable: {reason}"),
        ),
    });

    checks.push(match InitMetadata::load(&repo.metadata_path) {
        Ok(Some(meta)) => DoctorCheck::new(
            "model metadata",
            true,
            format!("model {} at {}", meta.model_name, repo.metadata_path.display()),
        ),
        Ok(None) => DoctorCheck::presence("model metadata", &repo.metadata_path),
        Err(e) => DoctorCheck::new("model metadata", false, e.to_string()),
    });

    checks.push(DoctorCheck::presence(
        "model cache directory",
        &repo.model_cache_dir(),
    ));

    checks.push(match load_index(paths) {
        Ok(loaded) => DoctorCheck::new(
            "index readability",
            true,
            format!(
                "{} commits loaded from the {} index",
                loaded.index.commits.len(),
                loaded.source.as_str()
            ),
        ),
        Err(e) => DoctorCheck::new("index readability", false, format!("failed to load: {e}")),
    });

    checks.push(match sidecar_agrees(paths) {
        Ok(true) => DoctorCheck::new("sidecar agreement", true, "compact checksum matches index.json"),
        Ok(false) => DoctorCheck::new(
            "sidecar agreement",
            false,
            "compact checksum differs from index.json",
        ),
        Err(reason) => DoctorCheck::new("sidecar agreement", false, reason),
    });

    checks
}

/// Repair what can be repaired from a readable `index.json`.
pub fn run_doctor_fixes(repo: &RepoPaths, paths: &IndexPaths) -> GitsemResult<DoctorReport> {
    let mut report = DoctorReport::default();

    for dir in [&repo.semantic_dir, &repo.cache_dir, &paths.dir] {
        std::fs::create_dir_all(dir).write_path(dir)?;
    }
    report
        .actions
        .push(format!("ensured semantic directories at {}", repo.semantic_dir.display()));

    let mut recovered: Option<SemanticIndex> = None;
    if paths.index_file.exists() {
        match load_full(&paths.index_file) {
            Ok(index) => recovered = Some(index),
            Err(e) => {
                report.warnings.push(format!("strict load failed: {e}"));
                match load_index_lenient(&paths.index_file) {
                    Ok(index) => {
                        report
                            .actions
                            .push("parsed legacy index.json directly for recovery".to_string());
                        recovered = Some(index);
                    }
                    Err(e) => report.warnings.push(format!("legacy parse failed: {e}")),
                }
            }
        }
    }

    if let Some(index) = recovered.as_mut() {
        let vectors_ok = matches!(compact_vector_bytes(paths), Ok(bytes) if bytes > 0);
        let agrees = sidecar_agrees(paths).unwrap_or(false);
        if !paths.compact_meta_file.exists() || !vectors_ok || !agrees {
            save_index(paths, index, None)?;
            report
                .actions
                .push("regenerated compact index sidecars from index.json".to_string());
        }
    }

    if !repo.metadata_path.exists() {
        match &recovered {
            Some(index) => {
                InitMetadata::new(index.model_name.clone()).save(&repo.metadata_path)?;
                report
                    .actions
                    .push("recreated metadata.json from current index model".to_string());
            }
            None => report.warnings.push(
                "metadata.json still missing (no readable index available to infer model)"
                    .to_string(),
            ),
        }
    }

    if report.actions.len() == 1 && report.warnings.is_empty() {
        report.actions.push("no changes needed".to_string());
    }

    for action in &report.actions {
        tracing::info!(action = %action, "doctor");
    }
    for warning in &report.warnings {
        tracing::warn!(warning = %warning, "doctor");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IndexedCommit, VectorDtype};
    use tempfile::TempDir;

    fn setup() -> (TempDir, RepoPaths, IndexPaths) {
        let temp_dir = TempDir::new().unwrap();
        let repo = RepoPaths::from_dirs(temp_dir.path(), temp_dir.path().join(".git"));
        let paths = repo.legacy.clone();
        (temp_dir, repo, paths)
    }

    fn saved_index(paths: &IndexPaths) -> SemanticIndex {
        let mut index = SemanticIndex::new("gitsem/hash-4", "/repo");
        index.commits.push(IndexedCommit {
            hash: "abc".to_string(),
            author: "Ada".to_string(),
            date: "2024-01-01T00:00:00+00:00".to_string(),
            message: "initial".to_string(),
            files: vec!["a.rs".to_string()],
            embedding: vec![1.0, 0.0, 0.0, 0.0].into(),
        });
        save_index(paths, &mut index, None).unwrap();
        index
    }

    fn check<'a>(checks: &'a [DoctorCheck], name: &str) -> &'a DoctorCheck {
        checks.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn test_checks_on_healthy_index() {
        let (_dir, repo, paths) = setup();
        saved_index(&paths);
        let checks = run_doctor_checks(&repo, &paths);
        assert!(check(&checks, "index").ok);
        assert!(check(&checks, "compact vectors").ok);
        assert!(check(&checks, "index readability").ok);
        assert!(check(&checks, "sidecar agreement").ok);
        assert!(!check(&checks, "model metadata").ok);
    }

    #[test]
    fn test_fix_regenerates_missing_sidecar_and_metadata() {
        let (_dir, repo, paths) = setup();
        saved_index(&paths);
        std::fs::remove_file(&paths.compact_meta_file).unwrap();
        std::fs::remove_file(paths.vector_file(VectorDtype::F32)).unwrap();

        let report = run_doctor_fixes(&repo, &paths).unwrap();
        assert!(report.actions.iter().any(|a| a.contains("regenerated compact")));
        assert!(report.actions.iter().any(|a| a.contains("recreated metadata.json")));

        let checks = run_doctor_checks(&repo, &paths);
        assert!(checks.iter().filter(|c| c.name != "model cache directory").all(|c| c.ok));
    }

    #[test]
    fn test_fix_recovers_tampered_index_leniently() {
        let (_dir, repo, paths) = setup();
        saved_index(&paths);
        let raw = std::fs::read_to_string(&paths.index_file).unwrap();
        std::fs::write(&paths.index_file, raw.replace("initial", "edited")).unwrap();

        let report = run_doctor_fixes(&repo, &paths).unwrap();
        assert!(report.warnings.iter().any(|w| w.contains("strict load failed")));
        assert!(report.actions.iter().any(|a| a.contains("legacy index.json")));

        let loaded = load_index(&paths).unwrap();
        assert_eq!(loaded.index.commits[0].message, "edited");
    }

    #[test]
    fn test_fix_without_index_warns() {
        let (_dir, repo, paths) = setup();
        let report = run_doctor_fixes(&repo, &paths).unwrap();
        assert!(report.warnings.iter().any(|w| w.contains("metadata.json still missing")));
        assert!(repo.cache_dir.exists());
    }

    #[test]
    fn test_healthy_fix_is_a_no_op() {
        let (_dir, repo, paths) = setup();
        let index = saved_index(&paths);
        InitMetadata::new(index.model_name).save(&repo.metadata_path).unwrap();
        let report = run_doctor_fixes(&repo, &paths).unwrap();
        assert!(report.actions.iter().any(|a| a == "no changes needed"));
        assert!(report.warnings.is_empty());
    }
}
