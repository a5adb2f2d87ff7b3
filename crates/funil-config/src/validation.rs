// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes. Collects every violation instead of failing fast.

use crate::diagnostic::ConfigError;
use crate::model::FunilConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &FunilConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.gateway.port == 0 {
        errors.push(ConfigError::Validation {
            message: "gateway.port must not be 0".to_string(),
        });
    }

    if config.guard.dedup_ttl_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "guard.dedup_ttl_secs must be at least 1".to_string(),
        });
    }

    if config.followup.sweep_interval_secs < 5 {
        errors.push(ConfigError::Validation {
            message: format!(
                "followup.sweep_interval_secs must be at least 5, got {}",
                config.followup.sweep_interval_secs
            ),
        });
    }

    if config.worker.workers == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.workers must be at least 1".to_string(),
        });
    }

    if config.worker.queue_capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.queue_capacity must be at least 1".to_string(),
        });
    }

    if !(0.0..=2.0).contains(&config.openai.temperature) {
        errors.push(ConfigError::Validation {
            message: format!(
                "openai.temperature must be between 0.0 and 2.0, got {}",
                config.openai.temperature
            ),
        });
    }

    if config.openai.history_turns == 0 {
        errors.push(ConfigError::Validation {
            message: "openai.history_turns must be at least 1".to_string(),
        });
    }

    if config.agent.history_limit == 0 {
        errors.push(ConfigError::Validation {
            message: "agent.history_limit must be at least 1".to_string(),
        });
    }

    if config.crm.enabled && config.crm.api_token.is_none() {
        errors.push(ConfigError::Validation {
            message: "crm.api_token is required when crm.enabled = true".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
