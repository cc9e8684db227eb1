// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::EntoforceConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &EntoforceConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.dispatch.default_max_load < 1 {
        fail(format!(
            "dispatch.default_max_load must be at least 1, got {}",
            config.dispatch.default_max_load
        ));
    }

    let intake = &config.intake;
    if intake.min_phone_digits < 1 {
        fail("intake.min_phone_digits must be at least 1".to_string());
    }
    if intake.min_phone_digits > intake.max_phone_digits {
        fail(format!(
            "intake.min_phone_digits ({}) must not exceed intake.max_phone_digits ({})",
            intake.min_phone_digits, intake.max_phone_digits
        ));
    }

    if config.gateway.host.trim().is_empty() {
        fail("gateway.host must not be empty".to_string());
    }
    let has_token = config
        .gateway
        .bearer_token
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty());
    if config.gateway.enabled && !has_token {
        fail("gateway.bearer_token is required when gateway.enabled = true".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &EntoforceConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        let config = EntoforceConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = EntoforceConfig::default();
        config.storage.database_path = "  ".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("database_path")));
    }

    #[test]
    fn zero_max_load_fails_validation() {
        let mut config = EntoforceConfig::default();
        config.dispatch.default_max_load = 0;
        assert!(messages(&config).iter().any(|m| m.contains("default_max_load")));
    }

    #[test]
    fn inverted_phone_bounds_fail_validation() {
        let mut config = EntoforceConfig::default();
        config.intake.min_phone_digits = 16;
        assert!(messages(&config).iter().any(|m| m.contains("must not exceed")));
    }

    #[test]
    fn enabled_gateway_needs_token() {
        let mut config = EntoforceConfig::default();
        config.gateway.enabled = true;
        assert!(messages(&config).iter().any(|m| m.contains("bearer_token")));

        config.gateway.bearer_token = Some("secret".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = EntoforceConfig::default();
        config.storage.database_path.clear();
        config.dispatch.default_max_load = 0;
        config.gateway.host.clear();
        assert_eq!(validate_config(&config).unwrap_err().len(), 3);
    }
}
