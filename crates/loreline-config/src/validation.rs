// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as threshold ranges and non-zero capacities.

use thiserror::Error;

use crate::model::LorelineConfig;

/// A single configuration validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{message}")]
    Validation { message: String },
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LorelineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    let threshold = config.retrieval.similarity_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        errors.push(ConfigError::Validation {
            message: format!(
                "retrieval.similarity_threshold must be within 0.0-1.0, got {threshold}"
            ),
        });
    }

    if config.retrieval.top_k == 0 {
        errors.push(ConfigError::Validation {
            message: "retrieval.top_k must be at least 1".to_string(),
        });
    }

    if config.cache.capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "cache.capacity must be at least 1".to_string(),
        });
    }

    if config.jobs.max_retries < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "jobs.max_retries must be non-negative, got {}",
                config.jobs.max_retries
            ),
        });
    }

    if config.jobs.poll_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "jobs.poll_interval_secs must be at least 1".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    #[test]
    fn default_config_is_valid() {
        let config = LorelineConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let config = load_config_from_str(
            r#"
            [retrieval]
            similarity_threshold = 1.5
            "#,
        )
        .unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("similarity_threshold"));
    }

    #[test]
    fn all_errors_are_collected() {
        let config = load_config_from_str(
            r#"
            [storage]
            database_path = ""

            [cache]
            capacity = 0

            [retrieval]
            top_k = 0
            "#,
        )
        .unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3, "all failures should be reported: {errors:?}");
    }
}
