// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Similarity retrieval over the chunk store.
//!
//! A query is embedded once, scored against three candidate buckets
//! (character, lore, conversation memory), thresholded, truncated to
//! top-k per bucket, and composed into a prompt-ready context block.

use std::sync::Arc;

use tracing::debug;

use loreline_config::RetrievalConfig;
use loreline_core::types::cosine_similarity;
use loreline_core::{LorelineError, StoredChunk};
use loreline_storage::{queries, Database};

use crate::cache::EmbeddingCache;

/// Scoping options for one retrieval call.
#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    /// Restrict the message bucket to this conversation.
    pub conversation_id: Option<String>,
    /// Restrict the character bucket to this persona, and the message
    /// bucket to turns involving it.
    pub character_ref: Option<i64>,
    /// Per-bucket result cap; falls back to the configured top_k.
    pub top_k: Option<usize>,
}

/// One ranked result.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub title: Option<String>,
    pub content: String,
    pub score: f32,
}

/// The three ranked buckets for a query.
#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    pub lore: Vec<ScoredChunk>,
    pub characters: Vec<ScoredChunk>,
    pub memories: Vec<ScoredChunk>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.lore.is_empty() && self.characters.is_empty() && self.memories.is_empty()
    }

    /// Render the buckets as a human-readable context block for prompt
    /// splicing. Character context leads, then lore, then conversation
    /// memory. Empty buckets are omitted entirely; an empty context
    /// renders as an empty string.
    pub fn compose(&self) -> String {
        let mut out = String::new();
        append_section(&mut out, "[Character Information]", &self.characters);
        append_section(&mut out, "[World Lore]", &self.lore);
        append_section(&mut out, "[Conversation Memory]", &self.memories);
        out
    }
}

fn append_section(out: &mut String, header: &str, items: &[ScoredChunk]) {
    if items.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(header);
    out.push('\n');
    for (i, item) in items.iter().enumerate() {
        match &item.title {
            Some(title) => {
                out.push_str(&format!("{}. [{}] {}\n", i + 1, title, item.content));
            }
            None => {
                out.push_str(&format!("{}. {}\n", i + 1, item.content));
            }
        }
    }
}

/// Scores stored chunks against query embeddings.
pub struct Retriever {
    db: Arc<Database>,
    cache: Arc<EmbeddingCache>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(db: Arc<Database>, cache: Arc<EmbeddingCache>, config: RetrievalConfig) -> Self {
        Self { db, cache, config }
    }

    /// Retrieve ranked context for `query`, scoped by `opts`.
    ///
    /// A blank query short-circuits to an empty context without touching
    /// the embedding backend. Embedding failures propagate to the caller
    /// since retrieval sits on the request path.
    pub async fn retrieve(
        &self,
        owner_id: &str,
        query: &str,
        opts: &RetrieveOptions,
    ) -> Result<RetrievedContext, LorelineError> {
        if query.trim().is_empty() {
            return Ok(RetrievedContext::default());
        }

        let query_embedding = self.cache.embed(query).await?;
        let top_k = opts.top_k.unwrap_or(self.config.top_k);
        let threshold = self.config.similarity_threshold as f32;

        let lore = queries::chunks::lore_candidates(&self.db, owner_id).await?;
        let characters =
            queries::chunks::character_candidates(&self.db, owner_id, opts.character_ref).await?;
        let messages = queries::chunks::message_candidates(
            &self.db,
            owner_id,
            opts.conversation_id.clone(),
            opts.character_ref,
        )
        .await?;

        let context = RetrievedContext {
            lore: rank(lore, &query_embedding, threshold, top_k),
            characters: rank(characters, &query_embedding, threshold, top_k),
            memories: rank(messages, &query_embedding, threshold, top_k),
        };

        debug!(
            owner_id,
            lore = context.lore.len(),
            characters = context.characters.len(),
            memories = context.memories.len(),
            "retrieval complete"
        );
        Ok(context)
    }
}

/// Score, threshold, sort descending, truncate.
fn rank(
    candidates: Vec<StoredChunk>,
    query_embedding: &[f32],
    threshold: f32,
    top_k: usize,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .filter_map(|chunk| {
            let score = cosine_similarity(query_embedding, &chunk.embedding);
            if score >= threshold {
                Some(ScoredChunk {
                    title: chunk.title,
                    content: chunk.content,
                    score,
                })
            } else {
                None
            }
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}
