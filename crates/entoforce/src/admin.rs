// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administration subcommands: technician registration, listings and
//! `config check`.
//!
//! Each command opens the configured SQLite database, does its work and
//! checkpoints the WAL before returning.

use entoforce_config::model::EntoforceConfig;
use entoforce_core::{
    EntoforceError, NewTechnician, Order, OrderStatus, Repository, Technician,
};
use entoforce_storage::SqliteRepository;

/// Open and migrate the configured database.
async fn open_repository(config: &EntoforceConfig) -> Result<SqliteRepository, EntoforceError> {
    let repo = SqliteRepository::new(config.storage.clone());
    repo.initialize().await?;
    Ok(repo)
}

/// A fresh link token for the technician bot's `/start <token>`.
pub fn generate_channel_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Validate the input and register a technician with a new link token.
pub async fn add_technician(
    repo: &dyn Repository,
    name: &str,
    max_load: u32,
) -> Result<Technician, EntoforceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EntoforceError::validation("name", "must not be empty"));
    }
    if max_load == 0 {
        return Err(EntoforceError::validation("max_load", "must be at least 1"));
    }

    let technician = repo
        .create_technician(&NewTechnician {
            name: name.to_string(),
            channel_token: generate_channel_token(),
            max_load,
        })
        .await?;
    tracing::info!(
        technician_id = %technician.id,
        max_load,
        "technician registered"
    );
    Ok(technician)
}

fn technician_row(technician: &Technician) -> String {
    let link = match technician.channel_address.as_deref() {
        Some(address) => format!("linked to {address}"),
        None => "not linked".to_string(),
    };
    format!(
        "#{:<4} {:<20} load {}/{}  {}",
        technician.id.0, technician.name, technician.load, technician.max_load, link
    )
}

fn order_row(order: &Order) -> String {
    let technician = order
        .technician_id
        .map(|id| format!("technician #{id}"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "#{:<5} {:<12} {:<16} {:<10} {:<10} {}",
        order.id.0,
        order.status.to_string(),
        technician,
        order.intake.object_type,
        order.intake.insect_quantity,
        order.created_at.format("%Y-%m-%d %H:%M"),
    )
}

/// `entoforce technician add --name <name> [--max-load <n>]`
pub async fn run_technician_add(
    config: &EntoforceConfig,
    name: &str,
    max_load: Option<u32>,
) -> Result<(), EntoforceError> {
    let repo = open_repository(config).await?;
    let max_load = max_load.unwrap_or(config.dispatch.default_max_load);
    let result = add_technician(&repo, name, max_load).await;
    repo.close().await?;

    let technician = result?;
    println!("Registered technician #{} ({}).", technician.id, technician.name);
    if let Some(token) = technician.channel_token.as_deref() {
        println!("Link token: {token}");
        println!("Ask the technician to send `/start {token}` to the technician bot.");
    }
    Ok(())
}

/// `entoforce technician list`
pub async fn run_technician_list(config: &EntoforceConfig) -> Result<(), EntoforceError> {
    let repo = open_repository(config).await?;
    let technicians = repo.list_technicians().await;
    repo.close().await?;

    let technicians = technicians?;
    if technicians.is_empty() {
        println!("No technicians registered.");
    }
    for technician in &technicians {
        println!("{}", technician_row(technician));
    }
    Ok(())
}

/// `entoforce orders list [--status <status>]`
pub async fn run_orders_list(
    config: &EntoforceConfig,
    status: Option<OrderStatus>,
) -> Result<(), EntoforceError> {
    let repo = open_repository(config).await?;
    let orders = repo.list_orders(status).await;
    repo.close().await?;

    let orders = orders?;
    if orders.is_empty() {
        println!("No orders.");
    }
    for order in &orders {
        println!("{}", order_row(order));
    }
    Ok(())
}

/// Effective settings, one `section.key = value` per line. Secrets are
/// reported as set or unset only.
pub fn config_summary(config: &EntoforceConfig) -> Vec<String> {
    let secret = |value: &Option<String>| {
        if value.as_deref().is_some_and(|v| !v.is_empty()) {
            "set"
        } else {
            "unset"
        }
    };

    vec![
        format!("service.name = {}", config.service.name),
        format!("service.log_level = {}", config.service.log_level),
        format!(
            "telegram.client_bot_token = {}",
            secret(&config.telegram.client_bot_token)
        ),
        format!(
            "telegram.technician_bot_token = {}",
            secret(&config.telegram.technician_bot_token)
        ),
        format!("storage.database_path = {}", config.storage.database_path),
        format!("storage.wal_mode = {}", config.storage.wal_mode),
        format!(
            "dispatch.default_max_load = {}",
            config.dispatch.default_max_load
        ),
        format!(
            "dispatch.max_reservation_retries = {}",
            config.dispatch.max_reservation_retries
        ),
        format!(
            "dispatch.max_auto_reassignments = {}",
            config.dispatch.max_auto_reassignments
        ),
        format!(
            "intake.phone_digits = {}..={}",
            config.intake.min_phone_digits, config.intake.max_phone_digits
        ),
        format!("intake.min_address_len = {}", config.intake.min_address_len),
        format!("gateway.enabled = {}", config.gateway.enabled),
        format!(
            "gateway.listen = {}:{}",
            config.gateway.host, config.gateway.port
        ),
        format!(
            "gateway.bearer_token = {}",
            secret(&config.gateway.bearer_token)
        ),
    ]
}

/// `entoforce config check`. Reaching this point means validation passed.
pub fn run_config_check(config: &EntoforceConfig) {
    println!("Configuration is valid.");
    for line in config_summary(config) {
        println!("  {line}");
    }
}
