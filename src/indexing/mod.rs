//! Turning commit history into a semantic index.

pub mod pipeline;
pub mod text;
pub mod update;

pub use pipeline::{
    IndexReport, IndexRequest, MAX_BATCH_SIZE, MIN_BATCH_SIZE, dedupe_commits, embed_commits,
    maybe_build_ann, run_index, validate_batch_size,
};
pub use text::{build_embedding_text, patch_summary};
pub use update::{UpdateReport, UpdateRequest, run_update};
