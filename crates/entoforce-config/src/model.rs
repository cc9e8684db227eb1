// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Entoforce dispatch service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Entoforce configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EntoforceConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Telegram bot tokens for the client and technician bots.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Assignment coordinator tuning.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Intake validation limits.
    #[serde(default)]
    pub intake: IntakeConfig,

    /// HTTP intake surface.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "entoforce".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram bot configuration. A missing token disables that bot.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Token of the bot clients talk to.
    #[serde(default)]
    pub client_bot_token: Option<String>,

    /// Token of the bot technicians talk to.
    #[serde(default)]
    pub technician_bot_token: Option<String>,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("entoforce").join("entoforce.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "entoforce.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// Assignment coordinator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// `max_load` given to technicians registered without an explicit value.
    #[serde(default = "default_max_load")]
    pub default_max_load: u32,

    /// How many times `assign` re-selects after losing a reservation race.
    #[serde(default = "default_reservation_retries")]
    pub max_reservation_retries: u32,

    /// Automatic re-offers per order after declines and timeouts.
    #[serde(default = "default_auto_reassignments")]
    pub max_auto_reassignments: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_max_load: default_max_load(),
            max_reservation_retries: default_reservation_retries(),
            max_auto_reassignments: default_auto_reassignments(),
        }
    }
}

fn default_max_load() -> u32 {
    3
}

fn default_reservation_retries() -> u32 {
    3
}

fn default_auto_reassignments() -> u32 {
    1
}

/// Limits applied to client intake input.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntakeConfig {
    #[serde(default = "default_min_phone_digits")]
    pub min_phone_digits: usize,

    #[serde(default = "default_max_phone_digits")]
    pub max_phone_digits: usize,

    /// Minimum address length after trimming.
    #[serde(default = "default_min_address_len")]
    pub min_address_len: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            min_phone_digits: default_min_phone_digits(),
            max_phone_digits: default_max_phone_digits(),
            min_address_len: default_min_address_len(),
        }
    }
}

fn default_min_phone_digits() -> usize {
    10
}

fn default_max_phone_digits() -> usize {
    15
}

fn default_min_address_len() -> usize {
    5
}

/// HTTP intake surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Enable the HTTP server.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on `/api/*` routes.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}
