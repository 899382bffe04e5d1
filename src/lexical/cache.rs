//! Bounded store of lexical caches, one per index content checksum.

use crate::lexical::bm25::LexicalCache;
use crate::types::SemanticIndex;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Open indices kept warm at once.
pub const DEFAULT_CACHE_CAPACITY: usize = 4;

/// Owned by whoever issues queries (a CLI run, a serve session).
///
/// Building happens outside the lock, so concurrent misses for the same
/// checksum may both build; the last insert wins and both results are equal.
pub struct LexicalCacheStore {
    entries: Mutex<LruCache<String, Arc<LexicalCache>>>,
}

impl LexicalCacheStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cached statistics for `index`, building them on a miss.
    ///
    /// Indices without a checksum are never cached.
    pub fn get_or_build(&self, index: &SemanticIndex) -> Arc<LexicalCache> {
        let Some(key) = index.checksum.as_deref() else {
            return Arc::new(LexicalCache::build(&index.commits));
        };

        if let Some(hit) = self.entries.lock().get(key) {
            tracing::debug!(checksum = %key, "lexical cache hit");
            return Arc::clone(hit);
        }

        let built = Arc::new(LexicalCache::build(&index.commits));
        self.entries.lock().put(key.to_string(), Arc::clone(&built));
        tracing::debug!(checksum = %key, docs = built.total_docs(), "lexical cache built");
        built
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for LexicalCacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
