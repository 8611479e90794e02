// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns source rows into stored chunks.
//!
//! Each source type has one canonical text shape; canonical text runs
//! through the chunker, each chunk is embedded, and the results are
//! upserted. Indexing the same content twice is a no-op by virtue of the
//! store's content-addressed uniqueness key.

use std::sync::Arc;

use tracing::{debug, error, info};

use loreline_core::traits::SourceCatalog;
use loreline_core::{Chunk, LorelineError, MessageRole, SourceType};
use loreline_storage::{queries, Database};

use crate::cache::EmbeddingCache;
use crate::chunker::Chunker;

/// Builds and persists chunks for lore, characters, and messages.
pub struct Indexer {
    db: Arc<Database>,
    chunker: Chunker,
    cache: Arc<EmbeddingCache>,
    catalog: Arc<dyn SourceCatalog>,
}

impl Indexer {
    pub fn new(
        db: Arc<Database>,
        chunker: Chunker,
        cache: Arc<EmbeddingCache>,
        catalog: Arc<dyn SourceCatalog>,
    ) -> Self {
        Self {
            db,
            chunker,
            cache,
            catalog,
        }
    }

    /// Index one lore document. Blank content is skipped outright.
    pub async fn index_lore(
        &self,
        owner_id: &str,
        source_id: i64,
        title: &str,
        content: &str,
    ) -> Result<(), LorelineError> {
        if content.trim().is_empty() {
            debug!(owner_id, source_id, "skipping empty lore document");
            return Ok(());
        }
        let canonical = format!("{title}\n\n{content}");
        self.index_canonical(
            owner_id,
            SourceType::Lore,
            Some(source_id),
            None,
            None,
            Some(title.to_string()),
            &canonical,
        )
        .await
        .inspect_err(|e| {
            error!(owner_id, source_id, error = %e, "lore indexing failed");
        })
    }

    /// Index one character bio. Blank bios are skipped outright.
    pub async fn index_character(
        &self,
        owner_id: &str,
        source_id: i64,
        name: &str,
        bio: &str,
    ) -> Result<(), LorelineError> {
        if bio.trim().is_empty() {
            debug!(owner_id, source_id, "skipping character with empty bio");
            return Ok(());
        }
        let canonical = format!("Character: {name}\nBio: {bio}");
        self.index_canonical(
            owner_id,
            SourceType::Character,
            Some(source_id),
            None,
            None,
            Some(name.to_string()),
            &canonical,
        )
        .await
        .inspect_err(|e| {
            error!(owner_id, source_id, error = %e, "character indexing failed");
        })
    }

    /// Index one chat turn into the conversation-memory bucket.
    pub async fn index_message(
        &self,
        owner_id: &str,
        conversation_id: &str,
        character_ref: Option<i64>,
        role: MessageRole,
        content: &str,
    ) -> Result<(), LorelineError> {
        if content.trim().is_empty() {
            debug!(owner_id, conversation_id, "skipping empty message");
            return Ok(());
        }
        let canonical = format!("{}: {}", role.label(), content);
        self.index_canonical(
            owner_id,
            SourceType::Message,
            None,
            Some(conversation_id.to_string()),
            character_ref,
            None,
            &canonical,
        )
        .await
        .inspect_err(|e| {
            error!(owner_id, conversation_id, error = %e, "message indexing failed");
        })
    }

    /// Remove chunks for a source. `source_id = None` wipes the whole
    /// type for the owner.
    pub async fn delete_chunks_for_source(
        &self,
        owner_id: &str,
        source_type: SourceType,
        source_id: Option<i64>,
    ) -> Result<usize, LorelineError> {
        let deleted = queries::chunks::delete_by_source(&self.db, owner_id, source_type, source_id)
            .await?;
        debug!(owner_id, source_type = source_type.as_str(), deleted, "chunks deleted");
        Ok(deleted)
    }

    /// Rebuild every lore and character chunk for an owner from current
    /// catalog content.
    ///
    /// The wipe covers the whole type, so chunks of since-deleted rows
    /// are repaired too. Message chunks are untouched: transcripts are
    /// append-only and have no catalog to rebuild from.
    pub async fn reindex_all_for_user(&self, owner_id: &str) -> Result<(), LorelineError> {
        let lore_docs = self.catalog.lore_for_owner(owner_id).await?;
        let character_docs = self.catalog.characters_for_owner(owner_id).await?;

        self.delete_chunks_for_source(owner_id, SourceType::Lore, None)
            .await?;
        self.delete_chunks_for_source(owner_id, SourceType::Character, None)
            .await?;

        for doc in &lore_docs {
            self.index_lore(owner_id, doc.id, &doc.title, &doc.content)
                .await?;
        }
        for doc in &character_docs {
            self.index_character(owner_id, doc.id, &doc.name, &doc.bio)
                .await?;
        }

        info!(
            owner_id,
            lore = lore_docs.len(),
            characters = character_docs.len(),
            "reindex complete"
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn index_canonical(
        &self,
        owner_id: &str,
        source_type: SourceType,
        source_id: Option<i64>,
        conversation_id: Option<String>,
        character_ref: Option<i64>,
        title: Option<String>,
        canonical: &str,
    ) -> Result<(), LorelineError> {
        let chunks = self.chunker.chunk(canonical)?;
        let chunk_count = chunks.len();

        for text_chunk in chunks {
            if text_chunk.content.trim().is_empty() {
                continue;
            }
            let embedding = self.cache.embed(&text_chunk.content).await?;
            let chunk = Chunk {
                owner_id: owner_id.to_string(),
                source_type,
                source_id,
                conversation_id: conversation_id.clone(),
                character_ref,
                title: title.clone(),
                content: text_chunk.content,
                embedding,
                token_count: text_chunk.token_count,
            };
            queries::chunks::upsert_chunk(&self.db, &chunk).await?;
        }

        debug!(
            owner_id,
            source_type = source_type.as_str(),
            chunks = chunk_count,
            "source indexed"
        );
        Ok(())
    }
}
