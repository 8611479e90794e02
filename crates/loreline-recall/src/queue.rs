// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable background execution of indexing work.
//!
//! Write paths enqueue and return immediately; a single worker loop
//! claims jobs oldest-first, executes them against the indexer, and
//! applies retry policy on failure. A per-owner drain exists for tests
//! and for callers that need read-your-writes before retrieving.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use loreline_config::JobsConfig;
use loreline_core::{Job, JobPayload, JobStatus, LorelineError};
use loreline_storage::{queries, Database};

use crate::indexer::Indexer;

/// Interval between retention sweeps inside the worker loop.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Claims and executes indexing jobs.
pub struct JobQueue {
    db: Arc<Database>,
    indexer: Arc<Indexer>,
    config: JobsConfig,
}

impl JobQueue {
    pub fn new(db: Arc<Database>, indexer: Arc<Indexer>, config: JobsConfig) -> Self {
        Self {
            db,
            indexer,
            config,
        }
    }

    /// Append a pending job. Fire-and-forget from the caller's side;
    /// returns the job id for inspection.
    pub async fn enqueue(&self, owner_id: &str, payload: &JobPayload) -> Result<i64, LorelineError> {
        queries::jobs::enqueue(&self.db, owner_id, payload, self.config.max_retries).await
    }

    /// Claim and execute the oldest pending job. Returns whether a job
    /// was found.
    pub async fn process_next(&self) -> Result<bool, LorelineError> {
        match queries::jobs::claim_next(&self.db).await? {
            Some(job) => {
                self.run_claimed(job).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Synchronously drain every pending job for one owner. Returns the
    /// number of jobs executed (completed or failed alike).
    pub async fn process_pending_for_user(&self, owner_id: &str) -> Result<usize, LorelineError> {
        let mut processed = 0;
        while let Some(job) = queries::jobs::claim_next_for_owner(&self.db, owner_id).await? {
            self.run_claimed(job).await?;
            processed += 1;
        }
        if processed > 0 {
            debug!(owner_id, processed, "owner queue drained");
        }
        Ok(processed)
    }

    /// Reap terminal jobs past the retention window.
    pub async fn cleanup(&self) -> Result<usize, LorelineError> {
        queries::jobs::cleanup(&self.db, self.config.retention_days).await
    }

    /// Execute one claimed job and resolve its terminal/retry state.
    ///
    /// Execution failures are absorbed into job state (retry or
    /// dead-letter), never returned; only storage failures while
    /// resolving state propagate.
    async fn run_claimed(&self, job: Job) -> Result<(), LorelineError> {
        let job_id = job.id;
        match self.execute(&job).await {
            Ok(()) => {
                queries::jobs::complete(&self.db, job_id).await?;
                debug!(job_id, job_type = %job.job_type, "job completed");
            }
            Err(e) => {
                let message = e.to_string();
                let status = queries::jobs::fail(&self.db, job_id, &message).await?;
                match status {
                    JobStatus::Failed => {
                        error!(job_id, job_type = %job.job_type, error = %message,
                            "job dead-lettered after exhausting retries");
                    }
                    _ => {
                        warn!(job_id, job_type = %job.job_type, error = %message,
                            retry = job.retry_count + 1, "job failed, returned to queue");
                    }
                }
            }
        }
        Ok(())
    }

    /// Decode the payload and dispatch to the indexer.
    async fn execute(&self, job: &Job) -> Result<(), LorelineError> {
        let payload: JobPayload = serde_json::from_str(&job.payload)
            .map_err(|e| LorelineError::Payload(format!("undecodable job payload: {e}")))?;

        match payload {
            JobPayload::IndexLore {
                source_id,
                title,
                content,
            } => {
                self.indexer
                    .index_lore(&job.owner_id, source_id, &title, &content)
                    .await
            }
            JobPayload::IndexCharacter {
                source_id,
                name,
                bio,
            } => {
                self.indexer
                    .index_character(&job.owner_id, source_id, &name, &bio)
                    .await
            }
            JobPayload::IndexMessage {
                conversation_id,
                character_ref,
                role,
                content,
            } => {
                self.indexer
                    .index_message(&job.owner_id, &conversation_id, character_ref, role, &content)
                    .await
            }
            JobPayload::DeleteChunks {
                source_type,
                source_id,
            } => {
                self.indexer
                    .delete_chunks_for_source(&job.owner_id, source_type, source_id)
                    .await
                    .map(|_| ())
            }
        }
    }

    /// Start the polling worker loop. One job per iteration; when the
    /// queue is empty the loop sleeps for the configured poll interval.
    /// Retention cleanup runs on its own coarser cadence inside the
    /// same loop.
    pub fn spawn_worker(self: &Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(self);
        let poll_interval = Duration::from_secs(queue.config.poll_interval_secs.max(1));
        tokio::spawn(async move {
            info!("job worker started");
            let mut last_cleanup = tokio::time::Instant::now();
            loop {
                if cancel.is_cancelled() {
                    info!("job worker stopped");
                    break;
                }

                // An in-flight job always runs to completion; cancellation
                // is only observed between iterations and during idle sleep.
                let idle = match queue.process_next().await {
                    Ok(true) => false,
                    Ok(false) => true,
                    Err(e) => {
                        error!(error = %e, "job worker iteration failed");
                        true
                    }
                };

                if last_cleanup.elapsed() >= CLEANUP_INTERVAL {
                    if let Err(e) = queue.cleanup().await {
                        warn!(error = %e, "job cleanup failed");
                    }
                    last_cleanup = tokio::time::Instant::now();
                }

                if idle {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("job worker stopped");
                            break;
                        }
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use loreline_config::{CacheConfig, ChunkingConfig};
    use loreline_core::traits::{CharacterDoc, LoreDoc, SourceCatalog};
    use loreline_core::{EmbeddingAdapter, MessageRole, SourceType};
    use tempfile::tempdir;

    use crate::cache::EmbeddingCache;
    use crate::chunker::Chunker;

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingAdapter for UnitEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LorelineError> {
            let mut v = vec![0.0; loreline_core::EMBEDDING_DIM];
            v[0] = 1.0;
            Ok(v)
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingAdapter for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LorelineError> {
            Err(LorelineError::Embedding {
                message: "embedding service unreachable".to_string(),
                source: None,
            })
        }
    }

    struct EmptyCatalog;

    #[async_trait]
    impl SourceCatalog for EmptyCatalog {
        async fn lore_for_owner(&self, _owner_id: &str) -> Result<Vec<LoreDoc>, LorelineError> {
            Ok(vec![])
        }

        async fn characters_for_owner(
            &self,
            _owner_id: &str,
        ) -> Result<Vec<CharacterDoc>, LorelineError> {
            Ok(vec![])
        }
    }

    async fn setup_with(
        embedder: Arc<dyn EmbeddingAdapter>,
    ) -> (Arc<Database>, Arc<JobQueue>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("queue_test.db");
        let db = Arc::new(Database::open(db_path.to_str().unwrap()).await.unwrap());
        let cache = Arc::new(EmbeddingCache::new(&CacheConfig::default(), embedder));
        let chunker = Chunker::new(&ChunkingConfig::default()).unwrap();
        let indexer = Arc::new(Indexer::new(
            Arc::clone(&db),
            chunker,
            cache,
            Arc::new(EmptyCatalog),
        ));
        let queue = Arc::new(JobQueue::new(
            Arc::clone(&db),
            indexer,
            JobsConfig::default(),
        ));
        (db, queue, dir)
    }

    async fn setup() -> (Arc<Database>, Arc<JobQueue>, tempfile::TempDir) {
        setup_with(Arc::new(UnitEmbedder)).await
    }

    #[tokio::test]
    async fn enqueued_lore_is_indexed_by_process_next() {
        let (db, queue, _dir) = setup().await;

        let id = queue
            .enqueue(
                "user-1",
                &JobPayload::IndexLore {
                    source_id: 1,
                    title: "The One Ring".to_string(),
                    content: "One Ring to rule them all.".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(queue.process_next().await.unwrap());

        let job = queries::jobs::get_job(&db, id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);

        let chunks = queries::chunks::chunks_for_source(&db, "user-1", SourceType::Lore, Some(1))
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("One Ring to rule them all."));
        assert_eq!(chunks[0].title.as_deref(), Some("The One Ring"));
        assert_eq!(chunks[0].embedding.len(), loreline_core::EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn process_next_reports_empty_queue() {
        let (_db, queue, _dir) = setup().await;
        assert!(!queue.process_next().await.unwrap());
    }

    #[tokio::test]
    async fn drain_processes_only_the_requested_owner() {
        let (db, queue, _dir) = setup().await;

        for source_id in 1..=3 {
            queue
                .enqueue(
                    "user-1",
                    &JobPayload::IndexLore {
                        source_id,
                        title: format!("Doc {source_id}"),
                        content: "content".to_string(),
                    },
                )
                .await
                .unwrap();
        }
        queue
            .enqueue(
                "user-2",
                &JobPayload::IndexLore {
                    source_id: 9,
                    title: "Other".to_string(),
                    content: "content".to_string(),
                },
            )
            .await
            .unwrap();

        let processed = queue.process_pending_for_user("user-1").await.unwrap();
        assert_eq!(processed, 3);

        assert_eq!(
            queries::jobs::count_by_status(&db, JobStatus::Pending)
                .await
                .unwrap(),
            1,
            "the other owner's job stays pending"
        );
    }

    #[tokio::test]
    async fn delete_job_removes_chunks() {
        let (db, queue, _dir) = setup().await;

        queue
            .enqueue(
                "user-1",
                &JobPayload::IndexLore {
                    source_id: 5,
                    title: "Doomed".to_string(),
                    content: "To be deleted.".to_string(),
                },
            )
            .await
            .unwrap();
        queue
            .enqueue(
                "user-1",
                &JobPayload::DeleteChunks {
                    source_type: SourceType::Lore,
                    source_id: Some(5),
                },
            )
            .await
            .unwrap();

        // FIFO: index first, then delete.
        assert!(queue.process_next().await.unwrap());
        assert!(queue.process_next().await.unwrap());

        let chunks = queries::chunks::chunks_for_source(&db, "user-1", SourceType::Lore, Some(5))
            .await
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn message_job_lands_in_memory_bucket() {
        let (db, queue, _dir) = setup().await;

        queue
            .enqueue(
                "user-1",
                &JobPayload::IndexMessage {
                    conversation_id: "conv-1".to_string(),
                    character_ref: Some(7),
                    role: MessageRole::User,
                    content: "Is the ring safe?".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(queue.process_next().await.unwrap());

        let chunks = queries::chunks::message_candidates(&db, "user-1", Some("conv-1".to_string()), None)
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "User: Is the ring safe?");
    }

    #[tokio::test]
    async fn transient_failures_exhaust_retries_and_dead_letter() {
        let (db, queue, _dir) = setup_with(Arc::new(FailingEmbedder)).await;

        let id = queue
            .enqueue(
                "user-1",
                &JobPayload::IndexLore {
                    source_id: 1,
                    title: "Unreachable".to_string(),
                    content: "content".to_string(),
                },
            )
            .await
            .unwrap();

        // Three attempts, each found and failed.
        for _ in 0..3 {
            assert!(queue.process_next().await.unwrap());
        }
        // Dead-lettered: nothing left to claim.
        assert!(!queue.process_next().await.unwrap());

        let job = queries::jobs::get_job(&db, id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 3);
        assert!(job
            .error
            .as_deref()
            .unwrap()
            .contains("embedding service unreachable"));
    }

    #[tokio::test]
    async fn undecodable_payload_is_dead_lettered() {
        let (db, queue, _dir) = setup().await;

        // A row whose payload no longer decodes (schema drift, manual edit).
        db.connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.execute(
                    "INSERT INTO jobs (owner_id, job_type, payload, max_retries) \
                     VALUES ('user-1', 'index_lore', '{\"job_type\":\"reticulate_splines\"}', 3)",
                    [],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .unwrap();

        for _ in 0..3 {
            assert!(queue.process_next().await.unwrap());
        }
        assert!(!queue.process_next().await.unwrap());

        assert_eq!(
            queries::jobs::count_by_status(&db, JobStatus::Failed)
                .await
                .unwrap(),
            1
        );
        let job = queries::jobs::get_job(&db, 1).await.unwrap().unwrap();
        assert!(job.error.as_deref().unwrap().contains("undecodable job payload"));
    }

    #[tokio::test]
    async fn failed_index_leaves_primary_write_unaffected() {
        // The write path only enqueues; a dead embedding backend must not
        // make enqueue fail.
        let (db, queue, _dir) = setup_with(Arc::new(FailingEmbedder)).await;

        let id = queue
            .enqueue(
                "user-1",
                &JobPayload::IndexLore {
                    source_id: 1,
                    title: "Doc".to_string(),
                    content: "content".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(id > 0);
        assert_eq!(
            queries::jobs::count_by_status(&db, JobStatus::Pending)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn worker_loop_processes_jobs_until_cancelled() {
        let (db, queue, _dir) = setup().await;

        let id = queue
            .enqueue(
                "user-1",
                &JobPayload::IndexLore {
                    source_id: 1,
                    title: "Background".to_string(),
                    content: "Indexed by the worker.".to_string(),
                },
            )
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let handle = queue.spawn_worker(cancel.clone());

        // Wait for the worker to pick the job up.
        let mut completed = false;
        for _ in 0..50 {
            let job = queries::jobs::get_job(&db, id).await.unwrap().unwrap();
            if job.status == JobStatus::Completed {
                completed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(completed, "worker should complete the job");

        cancel.cancel();
        handle.await.unwrap();
    }
}
