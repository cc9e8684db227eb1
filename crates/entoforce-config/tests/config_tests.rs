// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Entoforce configuration system.

use entoforce_config::diagnostic::ConfigError;
use entoforce_config::model::EntoforceConfig;
use entoforce_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[service]
name = "entoforce-test"
log_level = "debug"

[telegram]
client_bot_token = "111:client"
technician_bot_token = "222:tech"

[storage]
database_path = "/tmp/entoforce-test.db"
wal_mode = false

[dispatch]
default_max_load = 5
max_reservation_retries = 2
max_auto_reassignments = 0

[intake]
min_phone_digits = 7
max_phone_digits = 12
min_address_len = 3

[gateway]
enabled = true
host = "0.0.0.0"
port = 8080
bearer_token = "s3cret"
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should load");
    assert_eq!(config.service.name, "entoforce-test");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.telegram.client_bot_token.as_deref(), Some("111:client"));
    assert_eq!(config.telegram.technician_bot_token.as_deref(), Some("222:tech"));
    assert_eq!(config.storage.database_path, "/tmp/entoforce-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.dispatch.default_max_load, 5);
    assert_eq!(config.dispatch.max_reservation_retries, 2);
    assert_eq!(config.dispatch.max_auto_reassignments, 0);
    assert_eq!(config.intake.min_phone_digits, 7);
    assert_eq!(config.intake.max_phone_digits, 12);
    assert_eq!(config.intake.min_address_len, 3);
    assert!(config.gateway.enabled);
    assert_eq!(config.gateway.port, 8080);
}

#[test]
fn defaults_are_sensible() {
    let config = EntoforceConfig::default();
    assert_eq!(config.service.name, "entoforce");
    assert_eq!(config.service.log_level, "info");
    assert!(config.telegram.client_bot_token.is_none());
    assert!(config.storage.database_path.ends_with("entoforce.db"));
    assert!(config.storage.wal_mode);
    assert_eq!(config.dispatch.default_max_load, 3);
    assert_eq!(config.dispatch.max_reservation_retries, 3);
    assert_eq!(config.dispatch.max_auto_reassignments, 1);
    assert_eq!(config.intake.min_phone_digits, 10);
    assert_eq!(config.intake.max_phone_digits, 15);
    assert_eq!(config.intake.min_address_len, 5);
    assert!(!config.gateway.enabled);
    assert_eq!(config.gateway.host, "127.0.0.1");
    assert_eq!(config.gateway.port, 3000);
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("[service]\nname = \"only\"\n").expect("should load");
    assert_eq!(config.service.name, "only");
    assert_eq!(config.dispatch.default_max_load, 3);
}

#[test]
fn unknown_key_suggests_correction() {
    let toml = r#"
[dispatch]
default_max_lod = 4
"#;
    let errors = load_and_validate_str(toml).expect_err("unknown key should fail");
    let found = errors.iter().any(|e| {
        matches!(
            e,
            ConfigError::UnknownKey { key, suggestion, .. }
                if key == "default_max_lod" && suggestion.as_deref() == Some("default_max_load")
        )
    });
    assert!(found, "expected an UnknownKey with a suggestion, got: {errors:?}");
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let errors = load_and_validate_str("[billing]\nenabled = true\n")
        .expect_err("unknown section should fail");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "billing")));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[gateway]\nport = \"eighty\"\n")
        .expect_err("string port should fail");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::InvalidType { .. })));
}

#[test]
fn validation_runs_after_load() {
    let errors = load_and_validate_str("[gateway]\nenabled = true\n")
        .expect_err("gateway without token should fail");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("bearer_token"))));
}

#[test]
fn config_error_renders_with_miette() {
    let err = ConfigError::Validation {
        message: "dispatch.default_max_load must be at least 1, got 0".into(),
    };
    let handler = miette::GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &err as &dyn miette::Diagnostic)
        .expect("should render");
    assert!(buf.contains("default_max_load"));
}
