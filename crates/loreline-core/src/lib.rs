// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Loreline retrieval subsystem.
//!
//! This crate provides the foundational trait definitions, error type, and
//! domain types used throughout the Loreline workspace. The embedding
//! backend and the document CRUD layer are external collaborators reached
//! through the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LorelineError;
pub use traits::{CharacterDoc, EmbeddingAdapter, LoreDoc, SourceCatalog};
pub use types::{
    Chunk, Job, JobPayload, JobStatus, MessageRole, SourceType, StoredChunk, EMBEDDING_DIM,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_construct() {
        let _config = LorelineError::Config("test".into());
        let _storage = LorelineError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _embedding = LorelineError::Embedding {
            message: "test".into(),
            source: None,
        };
        let _payload = LorelineError::Payload("test".into());
        let _internal = LorelineError::Internal("test".into());
    }

    #[test]
    fn error_display_includes_context() {
        let err = LorelineError::Embedding {
            message: "model unavailable".into(),
            source: None,
        };
        assert!(err.to_string().contains("model unavailable"));
    }

    #[test]
    fn traits_are_object_safe() {
        fn _embedder(_: &dyn EmbeddingAdapter) {}
        fn _catalog(_: &dyn SourceCatalog) {}
    }
}
