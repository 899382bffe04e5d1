//! Lexical (BM25) scoring.

pub mod bm25;
pub mod cache;

pub use bm25::{BM25_B, BM25_K1, LexicalCache, bm25_scores, tokenize};
pub use cache::{DEFAULT_CACHE_CAPACITY, LexicalCacheStore};
