use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Thread-safe LRU cache for query embeddings.
///
/// Queries are keyed by their whitespace-normalized text, so `"what is  AuthService"`
/// and `" what is AuthService "` share one entry. The retriever itself never writes
/// shared state at query time; this cache lives inside the embedding collaborator.
pub struct QueryEmbeddingCache {
    cache: Mutex<LruCache<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryEmbeddingCache {
    /// Create a cache holding at most `capacity` query vectors (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Mutex::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn key(query: &str) -> String {
        query.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Vec<f32>>> {
        // A panic while holding the lock cannot leave a half-written vector behind.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a query vector, counting the hit or miss.
    pub fn get(&self, query: &str) -> Option<Vec<f32>> {
        let found = self.lock().get(&Self::key(query)).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn put(&self, query: &str, embedding: Vec<f32>) {
        self.lock().put(Self::key(query), embedding);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}
