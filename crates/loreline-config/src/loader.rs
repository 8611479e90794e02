// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./loreline.toml` > `~/.config/loreline/loreline.toml`
//! with environment variable overrides via `LORELINE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::LorelineConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `~/.config/loreline/loreline.toml` (user XDG config)
/// 3. `./loreline.toml` (local directory)
/// 4. `LORELINE_*` environment variables
pub fn load_config() -> Result<LorelineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LorelineConfig::default()))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("loreline/loreline.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("loreline.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<LorelineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LorelineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LorelineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LorelineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `LORELINE_JOBS_MAX_RETRIES` must map to
/// `jobs.max_retries`, not `jobs.max.retries`.
fn env_provider() -> Env {
    Env::prefixed("LORELINE_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("storage_", "storage.", 1)
            .replacen("chunking_", "chunking.", 1)
            .replacen("cache_", "cache.", 1)
            .replacen("retrieval_", "retrieval.", 1)
            .replacen("jobs_", "jobs.", 1);
        mapped.into()
    })
}
