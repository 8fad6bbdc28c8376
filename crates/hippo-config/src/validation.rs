// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, positive periods, and mode-specific requirements.

use crate::diagnostic::ConfigError;
use crate::model::HippoConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &HippoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.brain.storage_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "brain.storage_dir must not be empty".to_string(),
        });
    }

    if config.brain.interaction_period == 0 {
        errors.push(ConfigError::Validation {
            message: "brain.interaction_period must be at least 1".to_string(),
        });
    }

    if config.brain.maintenance_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "brain.maintenance_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.brain.shutdown_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "brain.shutdown_timeout_secs must be at least 1".to_string(),
        });
    }

    let level = config.agent.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "agent.log_level `{}` is not one of {}",
                config.agent.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    let mode = config.embeddings.mode.to_lowercase();
    let needs_base_url = matches!(mode.as_str(), "openai_compat" | "openai-compatible");
    let has_base_url = config
        .embeddings
        .base_url
        .as_deref()
        .is_some_and(|u| !u.trim().is_empty());
    if needs_base_url && !has_base_url {
        errors.push(ConfigError::Validation {
            message: "embeddings.base_url is required when embeddings.mode is `openai_compat`"
                .to_string(),
        });
    }

    if config.embeddings.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "embeddings.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.provider.base_url.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "provider.base_url must not be empty".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
