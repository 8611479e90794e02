// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams to the external collaborators this subsystem consumes.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod catalog;
pub mod embedding;

pub use catalog::{CharacterDoc, LoreDoc, SourceCatalog};
pub use embedding::EmbeddingAdapter;
