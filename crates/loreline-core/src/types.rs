// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Loreline workspace.

use serde::{Deserialize, Serialize};

/// Embedding dimensions produced by the reference model (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Which retrieval bucket a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// User-authored world/lore document.
    Lore,
    /// Character bio/persona document.
    Character,
    /// A single chat transcript turn.
    Message,
    /// Extracted long-term memory (written by external collaborators).
    Memory,
}

impl SourceType {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Lore => "lore",
            SourceType::Character => "character",
            SourceType::Message => "message",
            SourceType::Memory => "memory",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "lore" => SourceType::Lore,
            "character" => SourceType::Character,
            "message" => SourceType::Message,
            _ => SourceType::Memory,
        }
    }
}

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    /// Display label used when building canonical chunk text.
    pub fn label(&self) -> &'static str {
        match self {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        }
    }
}

/// A unit of indexed text ready for upsert into the chunk store.
///
/// The content hash is not carried here; the store computes it from
/// `content` at upsert time so the uniqueness key can never drift from
/// the stored text.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Tenant/user that owns this chunk. All queries are scoped by it.
    pub owner_id: String,
    /// Retrieval bucket.
    pub source_type: SourceType,
    /// Originating lore/character row; None for message-derived chunks.
    pub source_id: Option<i64>,
    /// Conversation the chunk was derived from (message chunks only).
    pub conversation_id: Option<String>,
    /// Persona the chunk is tied to (message chunks only).
    pub character_ref: Option<i64>,
    /// Display label (document title or character name).
    pub title: Option<String>,
    /// The chunk's literal content, post-chunking.
    pub content: String,
    /// Normalized embedding vector.
    pub embedding: Vec<f32>,
    /// Tokens consumed by this chunk under the chunking tokenizer.
    pub token_count: usize,
}

/// A chunk row read back from the store.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: i64,
    pub owner_id: String,
    pub source_type: SourceType,
    pub source_id: Option<i64>,
    pub conversation_id: Option<String>,
    pub character_ref: Option<i64>,
    pub title: Option<String>,
    pub content: String,
    pub embedding: Vec<f32>,
    pub token_count: usize,
    /// SHA-256 hex digest of `content`.
    pub content_hash: String,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-update timestamp.
    pub updated_at: String,
}

/// Lifecycle status of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

/// Typed payload for a background job, tagged by `job_type`.
///
/// One variant per job type keeps payload shape statically checked:
/// a claimed row either decodes into exactly one of these or fails as a
/// payload error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
pub enum JobPayload {
    IndexLore {
        source_id: i64,
        title: String,
        content: String,
    },
    IndexCharacter {
        source_id: i64,
        name: String,
        bio: String,
    },
    IndexMessage {
        conversation_id: String,
        character_ref: Option<i64>,
        role: MessageRole,
        content: String,
    },
    DeleteChunks {
        source_type: SourceType,
        source_id: Option<i64>,
    },
}

impl JobPayload {
    /// The `job_type` column value for this payload.
    pub fn job_type(&self) -> &'static str {
        match self {
            JobPayload::IndexLore { .. } => "index_lore",
            JobPayload::IndexCharacter { .. } => "index_character",
            JobPayload::IndexMessage { .. } => "index_message",
            JobPayload::DeleteChunks { .. } => "delete_chunks",
        }
    }
}

/// A unit of deferred indexing work.
///
/// `payload` stays raw JSON until execution so that undecodable payloads
/// surface as job failures (retried, then dead-lettered) rather than
/// poisoning the claim path.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub owner_id: String,
    pub job_type: String,
    pub payload: String,
    pub status: JobStatus,
    pub retry_count: i64,
    pub max_retries: i64,
    /// Last failure message, retained for operator inspection.
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub processed_at: Option<String>,
}

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert SQLite BLOB back to f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

/// Compute cosine similarity between two vectors.
///
/// Defined as `dot(a,b) / (|a| * |b|)`, or 0.0 when either norm is zero.
/// Vectors of mismatched length compare over the shorter prefix; callers
/// are expected to pass same-dimension vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_round_trip() {
        for st in [
            SourceType::Lore,
            SourceType::Character,
            SourceType::Message,
            SourceType::Memory,
        ] {
            assert_eq!(SourceType::from_str_value(st.as_str()), st);
        }
    }

    #[test]
    fn job_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from_str_value(status.as_str()), status);
        }
    }

    #[test]
    fn job_payload_tagged_serialization() {
        let payload = JobPayload::IndexLore {
            source_id: 5,
            title: "The One Ring".to_string(),
            content: "Sauron's ring.".to_string(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""job_type":"index_lore""#));

        let parsed: JobPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.job_type(), "index_lore");
        match parsed {
            JobPayload::IndexLore { source_id, title, .. } => {
                assert_eq!(source_id, 5);
                assert_eq!(title, "The One Ring");
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn job_payload_unknown_type_fails_to_decode() {
        let result =
            serde_json::from_str::<JobPayload>(r#"{"job_type":"reticulate_splines"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn job_type_matches_variant() {
        let delete = JobPayload::DeleteChunks {
            source_type: SourceType::Lore,
            source_id: Some(1),
        };
        assert_eq!(delete.job_type(), "delete_chunks");
        let msg = JobPayload::IndexMessage {
            conversation_id: "conv-1".to_string(),
            character_ref: None,
            role: MessageRole::User,
            content: "hello".to_string(),
        };
        assert_eq!(msg.job_type(), "index_message");
    }

    #[test]
    fn vec_to_blob_roundtrip() {
        let original = vec![0.1_f32, 0.2, 0.3, -0.5, 1.0];
        let blob = vec_to_blob(&original);
        assert_eq!(blob.len(), original.len() * 4);
        let recovered = blob_to_vec(&blob);
        for (a, b) in original.iter().zip(recovered.iter()) {
            assert!((a - b).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn cosine_similarity_self_is_one() {
        let v = vec![0.3_f32, -0.7, 0.2, 0.9];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6, "got {sim}");
    }

    #[test]
    fn cosine_similarity_bounds() {
        let a = vec![1.0_f32, 2.0, 3.0];
        let b = vec![-4.0_f32, 5.0, -6.0];
        let sim = cosine_similarity(&a, &b);
        assert!((-1.0..=1.0).contains(&sim));
    }

    #[test]
    fn cosine_similarity_zero_vector_is_zero() {
        let zero = vec![0.0_f32; 4];
        let v = vec![1.0_f32, 2.0, 3.0, 4.0];
        assert_eq!(cosine_similarity(&zero, &v), 0.0);
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn cosine_similarity_opposite() {
        let a = vec![1.0_f32, 0.0];
        let b = vec![-1.0_f32, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn message_role_labels() {
        assert_eq!(MessageRole::User.label(), "User");
        assert_eq!(MessageRole::Assistant.label(), "Assistant");
    }
}
