//! Semantic search over git commit history.
//!
//! Commits are embedded into a compact on-disk index and ranked with a
//! hybrid of cosine similarity, BM25 and recency.

// Debug macro for consistent debug output
#[macro_export]
macro_rules! debug_print {
    ($self:expr, $($arg:tt)*) => {
        if $crate::config::is_global_debug_enabled() {
            eprintln!("DEBUG: {}", format!($($arg)*));
        }
    };
}

pub mod benchmark;
pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod git;
pub mod indexing;
pub mod io;
pub mod lexical;
pub mod logging;
pub mod plugins;
pub mod ranking;
pub mod search;
pub mod storage;
pub mod topk;
pub mod types;
pub mod vector;

pub use config::Settings;
pub use error::{GitsemError, GitsemResult};
pub use git::{CommitSource, GitRepository, ReadCommitsOptions};
pub use indexing::{IndexRequest, UpdateRequest, run_index, run_update};
pub use plugins::{Plugin, PluginRegistry};
pub use ranking::ScoreWeights;
pub use search::{SearchContext, SearchOptions, SearchPayload, execute_search};
pub use storage::{IndexPaths, RepoPaths, load_index, save_index};
pub use types::{CommitRecord, IndexedCommit, SemanticIndex, VectorDtype};
pub use vector::{Embedder, HashEmbedder};
