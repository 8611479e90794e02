// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-window chunking over the cl100k_base tokenizer.
//!
//! Chunk boundaries are deterministic for a given input and settings:
//! the same document always produces the same chunks, which keeps
//! content hashes stable across reindexes.

use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::trace;

use loreline_config::ChunkingConfig;
use loreline_core::LorelineError;

/// Minimum usable window size. Smaller configured values are clamped up.
const MIN_MAX_TOKENS: usize = 50;

/// One slice of a document, sized in tokenizer tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub content: String,
    pub token_count: usize,
}

/// Splits text into overlapping token windows.
pub struct Chunker {
    bpe: CoreBPE,
    max_tokens: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Result<Self, LorelineError> {
        let bpe = cl100k_base()
            .map_err(|e| LorelineError::Internal(format!("tokenizer init failed: {e}")))?;
        let max_tokens = config.max_tokens.max(MIN_MAX_TOKENS);
        // Overlap capped at a quarter window so the start always advances.
        let overlap = config.overlap.min(max_tokens / 4);
        Ok(Self {
            bpe,
            max_tokens,
            overlap,
        })
    }

    /// Split `text` into chunks of at most `max_tokens` tokens, with
    /// consecutive chunks sharing `overlap` tokens.
    ///
    /// Text that fits in one window (including empty text) comes back as
    /// a single chunk with the original string untouched.
    pub fn chunk(&self, text: &str) -> Result<Vec<TextChunk>, LorelineError> {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= self.max_tokens {
            return Ok(vec![TextChunk {
                content: text.to_string(),
                token_count: tokens.len(),
            }]);
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.max_tokens).min(tokens.len());
            let window = tokens[start..end].to_vec();
            let token_count = window.len();
            let content = self
                .bpe
                .decode(window)
                .map_err(|e| LorelineError::Internal(format!("token decode failed: {e}")))?;
            chunks.push(TextChunk {
                content,
                token_count,
            });
            if end == tokens.len() {
                break;
            }
            start += self.max_tokens - self.overlap;
        }

        trace!(
            total_tokens = tokens.len(),
            chunks = chunks.len(),
            "chunked document"
        );
        Ok(chunks)
    }

    /// Token count of `text` under the chunking tokenizer.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}
