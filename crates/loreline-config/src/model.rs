// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration data model with serde validation.
//!
//! Every field carries a default so a missing TOML file yields a fully
//! working configuration. `deny_unknown_fields` catches typos at load time.

use serde::{Deserialize, Serialize};

/// Root configuration for the Loreline retrieval subsystem.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LorelineConfig {
    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Token-window chunking settings.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Retrieval ranking settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Background job queue settings.
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "loreline.db".to_string()
}

/// Token-window chunking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk. Values below 50 are clamped up to 50.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Tokens of overlap between consecutive chunks. Clamped to
    /// `max_tokens / 4` so the window always advances.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap: default_overlap(),
        }
    }
}

fn default_max_tokens() -> usize {
    512
}

fn default_overlap() -> usize {
    64
}

/// Embedding cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of cached embeddings before LRU eviction.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Seconds before a cached embedding is considered stale.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Interval between background sweeps of expired entries.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Retrieval ranking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Minimum cosine similarity for a chunk to be returned (0.0-1.0).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Maximum results returned per retrieval bucket.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            top_k: default_top_k(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    0.5
}

fn default_top_k() -> usize {
    6
}

/// Background job queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JobsConfig {
    /// Maximum retry attempts before a job is dead-lettered.
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,

    /// Seconds the worker loop sleeps when no job is pending.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Days completed/failed jobs are retained before cleanup.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            poll_interval_secs: default_poll_interval_secs(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_max_retries() -> i64 {
    3
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_retention_days() -> u32 {
    7
}
