// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chunk store operations: content-addressed upsert, delete-by-source,
//! and scoped candidate fetches for retrieval.

use rusqlite::params;
use sha2::{Digest, Sha256};

use loreline_core::types::{blob_to_vec, vec_to_blob};
use loreline_core::{Chunk, LorelineError, SourceType, StoredChunk};

use crate::database::Database;

const CHUNK_COLUMNS: &str = "id, owner_id, source_type, source_id, conversation_id, \
     character_ref, title, content, embedding, token_count, content_hash, \
     created_at, updated_at";

/// SHA-256 hex digest of chunk content.
///
/// Computed here, not by callers, so the uniqueness key can never drift
/// from the stored text.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Insert a chunk, or update it in place on uniqueness-key conflict.
///
/// The conflict target is `(owner_id, source_type, source_id, content_hash)`:
/// re-indexing identical content collapses to a timestamp bump, changed
/// content hashes differently and lands as a new row. A single atomic
/// statement, safe under concurrent upserts for the same key
/// (last-writer-wins).
pub async fn upsert_chunk(db: &Database, chunk: &Chunk) -> Result<(), LorelineError> {
    let owner_id = chunk.owner_id.clone();
    let source_type = chunk.source_type.as_str().to_string();
    let source_id = chunk.source_id;
    let conversation_id = chunk.conversation_id.clone();
    let character_ref = chunk.character_ref;
    let title = chunk.title.clone();
    let content = chunk.content.clone();
    let embedding_blob = vec_to_blob(&chunk.embedding);
    let token_count = chunk.token_count as i64;
    let hash = content_hash(&chunk.content);

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO chunks (owner_id, source_type, source_id, conversation_id, \
                 character_ref, title, content, embedding, token_count, content_hash) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT (owner_id, source_type, source_id, content_hash) DO UPDATE SET \
                 conversation_id = excluded.conversation_id, \
                 character_ref = excluded.character_ref, \
                 title = excluded.title, \
                 content = excluded.content, \
                 embedding = excluded.embedding, \
                 token_count = excluded.token_count, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![
                    owner_id,
                    source_type,
                    source_id,
                    conversation_id,
                    character_ref,
                    title,
                    content,
                    embedding_blob,
                    token_count,
                    hash,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete all chunks matching the scope.
///
/// `source_id = None` deletes every chunk of that type for the owner
/// (full wipe before reindex). Returns the number of rows removed.
pub async fn delete_by_source(
    db: &Database,
    owner_id: &str,
    source_type: SourceType,
    source_id: Option<i64>,
) -> Result<usize, LorelineError> {
    let owner_id = owner_id.to_string();
    let source_type = source_type.as_str().to_string();
    db.connection()
        .call(move |conn| {
            let deleted = match source_id {
                Some(sid) => conn.execute(
                    "DELETE FROM chunks WHERE owner_id = ?1 AND source_type = ?2 AND source_id = ?3",
                    params![owner_id, source_type, sid],
                )?,
                None => conn.execute(
                    "DELETE FROM chunks WHERE owner_id = ?1 AND source_type = ?2",
                    params![owner_id, source_type],
                )?,
            };
            Ok(deleted)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All lore chunks for an owner.
///
/// Lore is deliberately unrestricted by document scope so newly added
/// lore is discoverable from older conversations.
pub async fn lore_candidates(
    db: &Database,
    owner_id: &str,
) -> Result<Vec<StoredChunk>, LorelineError> {
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks \
                 WHERE owner_id = ?1 AND source_type = 'lore'"
            ))?;
            let chunks = stmt
                .query_map(params![owner_id], |row| Ok(row_to_chunk(row)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(chunks)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Character chunks for an owner, optionally restricted to one persona
/// (the character's row id).
pub async fn character_candidates(
    db: &Database,
    owner_id: &str,
    character_ref: Option<i64>,
) -> Result<Vec<StoredChunk>, LorelineError> {
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut sql = format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks \
                 WHERE owner_id = ? AND source_type = 'character'"
            );
            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&owner_id];
            if let Some(ref cref) = character_ref {
                sql.push_str(" AND source_id = ?");
                params.push(cref);
            }
            let mut stmt = conn.prepare(&sql)?;
            let chunks = stmt
                .query_map(params.as_slice(), |row| Ok(row_to_chunk(row)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(chunks)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Message chunks for an owner, optionally restricted to a conversation
/// and/or persona.
pub async fn message_candidates(
    db: &Database,
    owner_id: &str,
    conversation_id: Option<String>,
    character_ref: Option<i64>,
) -> Result<Vec<StoredChunk>, LorelineError> {
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut sql = format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks \
                 WHERE owner_id = ? AND source_type = 'message'"
            );
            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&owner_id];
            if let Some(ref conv) = conversation_id {
                sql.push_str(" AND conversation_id = ?");
                params.push(conv);
            }
            if let Some(ref cref) = character_ref {
                sql.push_str(" AND character_ref = ?");
                params.push(cref);
            }
            let mut stmt = conn.prepare(&sql)?;
            let chunks = stmt
                .query_map(params.as_slice(), |row| Ok(row_to_chunk(row)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(chunks)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Chunks for one logical source, ordered by id (tests and operator inspection).
pub async fn chunks_for_source(
    db: &Database,
    owner_id: &str,
    source_type: SourceType,
    source_id: Option<i64>,
) -> Result<Vec<StoredChunk>, LorelineError> {
    let owner_id = owner_id.to_string();
    let source_type = source_type.as_str().to_string();
    db.connection()
        .call(move |conn| {
            let mut sql = format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks \
                 WHERE owner_id = ? AND source_type = ?"
            );
            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&owner_id, &source_type];
            if let Some(ref sid) = source_id {
                sql.push_str(" AND source_id = ?");
                params.push(sid);
            }
            sql.push_str(" ORDER BY id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let chunks = stmt
                .query_map(params.as_slice(), |row| Ok(row_to_chunk(row)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(chunks)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Convert a rusqlite Row to a StoredChunk.
fn row_to_chunk(row: &rusqlite::Row) -> StoredChunk {
    let source_type_str: String = row.get(2).unwrap_or_default();
    let embedding_blob: Vec<u8> = row.get(8).unwrap_or_default();
    let token_count: i64 = row.get(9).unwrap_or(0);

    StoredChunk {
        id: row.get(0).unwrap_or_default(),
        owner_id: row.get(1).unwrap_or_default(),
        source_type: SourceType::from_str_value(&source_type_str),
        source_id: row.get(3).unwrap_or(None),
        conversation_id: row.get(4).unwrap_or(None),
        character_ref: row.get(5).unwrap_or(None),
        title: row.get(6).unwrap_or(None),
        content: row.get(7).unwrap_or_default(),
        embedding: blob_to_vec(&embedding_blob),
        token_count: token_count as usize,
        content_hash: row.get(10).unwrap_or_default(),
        created_at: row.get(11).unwrap_or_default(),
        updated_at: row.get(12).unwrap_or_default(),
    }
}
