//! On-disk index storage.
//!
//! The full `index.json` is authoritative. The compact sidecar
//! (`index.meta.json` + `index.vec.{f32,f16}`) is a cache regenerated on
//! every save and preferred on load once it validates.

pub mod checksum;
pub mod compact;
pub mod doctor;
pub mod index_store;
pub mod metadata;
pub mod paths;
pub mod vectors;

pub use checksum::{compute_checksum, index_checksum};
pub use compact::{AnnDescriptor, CompactIndexMeta, read_compact_meta};
pub use doctor::{DoctorCheck, DoctorReport, run_doctor_checks, run_doctor_fixes};
pub use index_store::{
    IndexSource, IndexStats, LoadedIndex, index_stats, load_ann_handle, load_full, load_index,
    load_index_lenient, save_index,
};
pub use metadata::InitMetadata;
pub use paths::{IndexPaths, RepoPaths, model_key};
pub use vectors::{CompactVectors, Embedding};

use crate::error::{ErrorContext, GitsemError, GitsemResult};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

/// Write `bytes` to a sibling temp file and rename it over `path`.
///
/// Readers either see the old file or the new one, never a torn write.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> GitsemResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).write_path(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).write_path(parent)?;
    temp.write_all(bytes).write_path(path)?;
    temp.as_file().sync_all().write_path(path)?;
    temp.persist(path).map_err(|e| e.error).write_path(path)?;
    Ok(())
}

/// Commit hashes are the index key; a repeat makes the file invalid.
pub(crate) fn check_unique_hashes<'a>(
    path: &Path,
    hashes: impl IntoIterator<Item = &'a str>,
) -> GitsemResult<()> {
    let mut seen = HashSet::new();
    for hash in hashes {
        if !seen.insert(hash) {
            return Err(GitsemError::format(path, format!("duplicate commit hash {hash}")));
        }
    }
    Ok(())
}

/// Remove `path`, treating "already gone" as success.
pub(crate) fn remove_if_exists(path: &Path) -> GitsemResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).write_path(path),
    }
}
