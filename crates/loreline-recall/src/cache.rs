// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LRU + TTL cache in front of the embedding backend.
//!
//! Keys are normalized (trimmed, lowercased) so trivially equivalent
//! queries share an entry; the backend is always invoked with the
//! original text. The cache is transparent: a hit and a miss return the
//! same vector for the same input, and any anomaly degrades to a
//! pass-through call.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use loreline_config::CacheConfig;
use loreline_core::{EmbeddingAdapter, LorelineError};

struct CacheEntry {
    embedding: Vec<f32>,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() < ttl
    }
}

/// Caching wrapper around an [`EmbeddingAdapter`].
///
/// Capacity is bounded by LRU eviction; staleness is bounded by a TTL
/// checked on read and enforced in the background by a sweeper task.
pub struct EmbeddingCache {
    backend: Arc<dyn EmbeddingAdapter>,
    entries: Arc<Mutex<LruCache<String, CacheEntry>>>,
    ttl: Duration,
    sweep_interval: Duration,
    cancel: CancellationToken,
}

impl EmbeddingCache {
    pub fn new(config: &CacheConfig, backend: Arc<dyn EmbeddingAdapter>) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend,
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            ttl: Duration::from_secs(config.ttl_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
            cancel: CancellationToken::new(),
        }
    }

    /// Embed `text`, serving fresh cached vectors without touching the
    /// backend.
    ///
    /// Concurrent misses for the same key may each call the backend;
    /// whichever write lands last wins, and both callers get a correct
    /// vector.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, LorelineError> {
        let key = cache_key(text);

        {
            let mut entries = self.entries.lock().await;
            // `get` refreshes LRU recency on hit.
            match entries.get(&key) {
                Some(entry) if entry.is_fresh(self.ttl) => {
                    trace!(key = %key, "embedding cache hit");
                    return Ok(entry.embedding.clone());
                }
                Some(_) => {
                    entries.pop(&key);
                }
                None => {}
            }
        }

        let embedding = self.backend.embed(text).await?;

        let mut entries = self.entries.lock().await;
        entries.put(
            key,
            CacheEntry {
                embedding: embedding.clone(),
                inserted_at: Instant::now(),
            },
        );
        Ok(embedding)
    }

    /// Current number of cached entries, fresh or stale.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop every expired entry now. The sweeper calls this on its
    /// interval; exposed for tests and manual maintenance.
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(self.ttl))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        if !stale.is_empty() {
            debug!(swept = stale.len(), "swept expired embeddings");
        }
        stale.len()
    }

    /// Start the background sweep loop. Runs until [`shutdown`] or the
    /// returned handle is dropped by the runtime at exit.
    ///
    /// [`shutdown`]: EmbeddingCache::shutdown
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("embedding cache sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        cache.sweep_expired().await;
                    }
                }
            }
        })
    }

    /// Stop the background sweeper.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

fn cache_key(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder that counts backend invocations.
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingAdapter for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, LorelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Stable per-input vector derived from byte content.
            let seed = text.bytes().map(|b| b as f32).sum::<f32>().max(1.0);
            Ok((0..8).map(|i| (seed + i as f32) / 1000.0).collect())
        }
    }

    fn config(capacity: usize, ttl_secs: u64) -> CacheConfig {
        CacheConfig {
            capacity,
            ttl_secs,
            sweep_interval_secs: 60,
        }
    }

    #[tokio::test]
    async fn hit_skips_the_backend_and_matches_cold_result() {
        let backend = CountingEmbedder::new();
        let cache = EmbeddingCache::new(&config(10, 300), backend.clone());

        let cold = cache.embed("the one ring").await.unwrap();
        assert_eq!(backend.calls(), 1);

        let warm = cache.embed("the one ring").await.unwrap();
        assert_eq!(backend.calls(), 1, "second call must be served from cache");
        assert_eq!(cold, warm);
    }

    #[tokio::test]
    async fn keys_are_normalized() {
        let backend = CountingEmbedder::new();
        let cache = EmbeddingCache::new(&config(10, 300), backend.clone());

        cache.embed("  The One Ring  ").await.unwrap();
        cache.embed("the one ring").await.unwrap();
        assert_eq!(backend.calls(), 1, "equivalent inputs share one entry");
    }

    #[tokio::test]
    async fn lru_evicts_oldest_at_capacity() {
        let backend = CountingEmbedder::new();
        let cache = EmbeddingCache::new(&config(2, 300), backend.clone());

        cache.embed("alpha").await.unwrap();
        cache.embed("beta").await.unwrap();
        // Touch alpha so beta becomes least-recently-used.
        cache.embed("alpha").await.unwrap();
        cache.embed("gamma").await.unwrap();
        assert_eq!(cache.len().await, 2);

        let calls_before = backend.calls();
        cache.embed("alpha").await.unwrap();
        assert_eq!(backend.calls(), calls_before, "alpha survived eviction");

        cache.embed("beta").await.unwrap();
        assert_eq!(backend.calls(), calls_before + 1, "beta was evicted");
    }

    #[tokio::test]
    async fn expired_entry_falls_through_to_backend() {
        let backend = CountingEmbedder::new();
        // Zero TTL: every entry is stale the moment it lands.
        let cache = EmbeddingCache::new(&config(10, 0), backend.clone());

        cache.embed("palantir").await.unwrap();
        cache.embed("palantir").await.unwrap();
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_entries() {
        let backend = CountingEmbedder::new();
        let cache = EmbeddingCache::new(&config(10, 0), backend.clone());
        cache.embed("stale entry").await.unwrap();
        assert_eq!(cache.len().await, 1);

        let swept = cache.sweep_expired().await;
        assert_eq!(swept, 1);
        assert!(cache.is_empty().await);

        let fresh_cache = EmbeddingCache::new(&config(10, 300), backend.clone());
        fresh_cache.embed("fresh entry").await.unwrap();
        assert_eq!(fresh_cache.sweep_expired().await, 0);
        assert_eq!(fresh_cache.len().await, 1);
    }

    #[tokio::test]
    async fn sweeper_task_stops_on_shutdown() {
        let backend = CountingEmbedder::new();
        let cache = Arc::new(EmbeddingCache::new(&config(10, 300), backend));
        let handle = cache.spawn_sweeper();

        cache.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn backend_error_propagates() {
        struct FailingEmbedder;

        #[async_trait]
        impl EmbeddingAdapter for FailingEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>, LorelineError> {
                Err(LorelineError::Embedding {
                    message: "backend unavailable".to_string(),
                    source: None,
                })
            }
        }

        let cache = EmbeddingCache::new(&config(10, 300), Arc::new(FailingEmbedder));
        let result = cache.embed("anything").await;
        assert!(result.is_err());
        // Failures are never cached.
        assert!(cache.is_empty().await);
    }
}
