// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Loreline retrieval subsystem.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, and environment
//! variable overrides via the `LORELINE_` prefix.
//!
//! # Usage
//!
//! ```no_run
//! use loreline_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("database: {}", config.storage.database_path);
//! ```

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{CacheConfig, ChunkingConfig, JobsConfig, LorelineConfig, RetrievalConfig};
pub use validation::ConfigError;

/// Load configuration from the XDG hierarchy and validate it.
pub fn load_and_validate() -> Result<LorelineConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(vec![ConfigError::Validation {
            message: err.to_string(),
        }]),
    }
}

/// Load configuration from a TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<LorelineConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(vec![ConfigError::Validation {
            message: err.to_string(),
        }]),
    }
}
