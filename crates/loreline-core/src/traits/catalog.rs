// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source catalog trait bridging to the external CRUD layer.
//!
//! Full re-indexing needs the current lore and character documents for a
//! user, but their CRUD storage lives outside this subsystem. The host
//! application implements this trait over its own tables.

use async_trait::async_trait;

use crate::error::LorelineError;

/// A lore document as the host application currently stores it.
#[derive(Debug, Clone)]
pub struct LoreDoc {
    pub id: i64,
    pub title: String,
    pub content: String,
}

/// A character document as the host application currently stores it.
#[derive(Debug, Clone)]
pub struct CharacterDoc {
    pub id: i64,
    pub name: String,
    pub bio: String,
}

/// Read access to the documents owned by a user.
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// All lore documents owned by the user.
    async fn lore_for_owner(&self, owner_id: &str) -> Result<Vec<LoreDoc>, LorelineError>;

    /// All character documents owned by the user.
    async fn characters_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<CharacterDoc>, LorelineError>;
}
