// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entoforce - pest-control dispatch service.
//!
//! This is the binary entry point: `serve` runs the bots and the HTTP
//! intake, the remaining subcommands administer the database.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use entoforce_core::OrderStatus;

/// Entoforce - pest-control dispatch service.
#[derive(Parser, Debug)]
#[command(name = "entoforce", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the bots and the HTTP intake.
    Serve,
    /// Manage technicians.
    Technician {
        #[command(subcommand)]
        action: TechnicianCommands,
    },
    /// Inspect orders.
    Orders {
        #[command(subcommand)]
        action: OrdersCommands,
    },
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum TechnicianCommands {
    /// Register a technician and print their link token.
    Add {
        #[arg(long)]
        name: String,
        /// Concurrent orders this technician may hold (defaults to `dispatch.default_max_load`).
        #[arg(long)]
        max_load: Option<u32>,
    },
    /// List registered technicians with their load.
    List,
}

#[derive(Subcommand, Debug)]
enum OrdersCommands {
    /// List orders, newest first.
    List {
        /// Only orders in this status (new, offered, in_progress, completed, declined, unassigned).
        #[arg(long)]
        status: Option<OrderStatus>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validate configuration and print the effective settings.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => entoforce_config::load_and_validate_path(path),
        None => entoforce_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            entoforce_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Technician { action }) => match action {
            TechnicianCommands::Add { name, max_load } => {
                admin::run_technician_add(&config, &name, max_load).await
            }
            TechnicianCommands::List => admin::run_technician_list(&config).await,
        },
        Some(Commands::Orders { action }) => match action {
            OrdersCommands::List { status } => admin::run_orders_list(&config, status).await,
        },
        Some(Commands::Config { action }) => match action {
            ConfigCommands::Check => {
                admin::run_config_check(&config);
                Ok(())
            }
        },
        None => {
            println!("entoforce: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports epoch advancing; the system allocator would fail.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    #[serial_test::serial]
    fn binary_loads_config_defaults() {
        let config =
            entoforce_config::load_and_validate().expect("default config should be valid");
        assert_eq!(config.service.name, "entoforce");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_technician_add() {
        let cli = Cli::try_parse_from([
            "entoforce", "technician", "add", "--name", "Ivan", "--max-load", "2",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Technician {
                action: TechnicianCommands::Add { name, max_load },
            }) => {
                assert_eq!(name, "Ivan");
                assert_eq!(max_load, Some(2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_order_status_filter() {
        let cli = Cli::try_parse_from(["entoforce", "orders", "list", "--status", "in_progress"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Orders {
                action: OrdersCommands::List {
                    status: Some(OrderStatus::InProgress)
                }
            })
        ));

        assert!(Cli::try_parse_from(["entoforce", "orders", "list", "--status", "lost"]).is_err());
    }

    #[test]
    fn config_flag_is_global() {
        let cli =
            Cli::try_parse_from(["entoforce", "config", "check", "--config", "/tmp/e.toml"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/e.toml")));
    }
}
