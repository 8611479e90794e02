// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::LorelineError;

/// Adapter for generating vector embeddings from text.
///
/// Consumed as an opaque, deterministic function: the same text must
/// produce the same vector. Implementations wrap whatever inference
/// backend the host application uses (local ONNX, remote API).
#[async_trait]
pub trait EmbeddingAdapter: Send + Sync {
    /// Generates a fixed-length embedding for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LorelineError>;

    /// Vector dimensionality this adapter produces.
    fn dimensions(&self) -> usize {
        crate::types::EMBEDDING_DIM
    }
}
