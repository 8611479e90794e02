// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for Loreline.
//!
//! Two tables back the whole subsystem: `chunks` (content-addressed
//! indexed text with embeddings) and `jobs` (durable indexing queue).
//! All access goes through [`Database`], a single serialized writer.

pub mod database;
pub mod migrations;
pub mod queries;

pub use database::Database;
