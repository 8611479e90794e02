// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval-augmented context for chat applications.
//!
//! The pipeline: source documents are chunked into token windows,
//! embedded (through an LRU+TTL cache), and stored content-addressed in
//! SQLite. At prompt time the [`Retriever`] embeds the query, ranks
//! chunks by cosine similarity in three buckets, and composes a context
//! block. Indexing runs through a durable [`JobQueue`] so primary
//! writes never block on the embedding backend.
//!
//! [`Recall`] wires the pieces together for hosts that want the whole
//! subsystem behind one handle.

pub mod cache;
pub mod chunker;
pub mod indexer;
pub mod queue;
pub mod retriever;

pub use cache::EmbeddingCache;
pub use chunker::{Chunker, TextChunk};
pub use indexer::Indexer;
pub use queue::JobQueue;
pub use retriever::{RetrieveOptions, RetrievedContext, Retriever, ScoredChunk};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use loreline_config::LorelineConfig;
use loreline_core::{EmbeddingAdapter, JobPayload, LorelineError, SourceCatalog};
use loreline_storage::Database;

/// The assembled retrieval subsystem.
///
/// Owns the database handle, cache, indexer, retriever, and job queue,
/// plus the background tasks' cancellation token.
pub struct Recall {
    db: Arc<Database>,
    cache: Arc<EmbeddingCache>,
    indexer: Arc<Indexer>,
    retriever: Retriever,
    queue: Arc<JobQueue>,
    cancel: CancellationToken,
    tasks: std::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl Recall {
    /// Build the subsystem from configuration. Opens (and migrates) the
    /// database but starts no background tasks; call [`start`] for those.
    ///
    /// [`start`]: Recall::start
    pub async fn new(
        config: &LorelineConfig,
        embedder: Arc<dyn EmbeddingAdapter>,
        catalog: Arc<dyn SourceCatalog>,
    ) -> Result<Self, LorelineError> {
        let db = Arc::new(Database::open(&config.storage.database_path).await?);
        let cache = Arc::new(EmbeddingCache::new(&config.cache, embedder));
        let chunker = Chunker::new(&config.chunking)?;
        let indexer = Arc::new(Indexer::new(
            Arc::clone(&db),
            chunker,
            Arc::clone(&cache),
            catalog,
        ));
        let retriever = Retriever::new(
            Arc::clone(&db),
            Arc::clone(&cache),
            config.retrieval.clone(),
        );
        let queue = Arc::new(JobQueue::new(
            Arc::clone(&db),
            Arc::clone(&indexer),
            config.jobs.clone(),
        ));

        Ok(Self {
            db,
            cache,
            indexer,
            retriever,
            queue,
            cancel: CancellationToken::new(),
            tasks: std::sync::Mutex::new(Vec::new()),
        })
    }

    /// Start the job worker and the cache sweeper.
    pub fn start(&self) {
        let worker = self.queue.spawn_worker(self.cancel.clone());
        let sweeper = self.cache.spawn_sweeper();
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(worker);
            tasks.push(sweeper);
        }
        info!("recall subsystem started");
    }

    /// Enqueue an indexing job; returns once the job row is durable.
    pub async fn enqueue(&self, owner_id: &str, payload: &JobPayload) -> Result<i64, LorelineError> {
        self.queue.enqueue(owner_id, payload).await
    }

    /// Retrieve ranked context for a query.
    pub async fn retrieve(
        &self,
        owner_id: &str,
        query: &str,
        opts: &RetrieveOptions,
    ) -> Result<RetrievedContext, LorelineError> {
        self.retriever.retrieve(owner_id, query, opts).await
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Stop background tasks, let in-flight work finish, and checkpoint
    /// the database.
    pub async fn shutdown(&self) -> Result<(), LorelineError> {
        self.cancel.cancel();
        self.cache.shutdown();
        let handles: Vec<_> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            let _ = handle.await;
        }
        self.db.close().await?;
        info!("recall subsystem stopped");
        Ok(())
    }
}
