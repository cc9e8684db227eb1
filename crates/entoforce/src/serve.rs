// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `entoforce serve` command implementation.
//!
//! Wires storage, the Telegram bots (through the gateway multiplexer), the
//! assignment coordinator, the intake service and the event loop, plus the
//! optional HTTP intake. Runs until SIGINT/SIGTERM.

use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use entoforce_agent::{EventLoop, GatewayMultiplexer, IntakeService, shutdown};
use entoforce_config::model::EntoforceConfig;
use entoforce_core::{EntoforceError, MessagingGateway, PluginAdapter, Repository};
use entoforce_dispatch::Coordinator;
use entoforce_storage::SqliteRepository;

/// Runs the dispatch service until a shutdown signal arrives.
pub async fn run_serve(config: EntoforceConfig) -> Result<(), EntoforceError> {
    init_tracing(&config.service.log_level);

    info!(service = config.service.name.as_str(), "starting entoforce serve");

    let mut mux = build_multiplexer(&config)?;
    ensure_intake_configured(mux.gateway_count(), http_intake_enabled(&config))?;

    // Initialize storage.
    let storage = SqliteRepository::new(config.storage.clone());
    storage.initialize().await?;
    let repo: Arc<dyn Repository> = Arc::new(storage);

    // Connect all bots via multiplexer.
    mux.connect().await?;
    info!(gateways = mux.gateway_count(), "gateway multiplexer connected");
    let gateway: Arc<dyn MessagingGateway> = Arc::new(mux);

    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&repo),
        Arc::clone(&gateway),
        config.dispatch.clone(),
    ));
    let intake = Arc::new(IntakeService::new(
        Arc::clone(&coordinator),
        config.intake.clone(),
    ));
    let event_loop = EventLoop::new(
        Arc::clone(&gateway),
        Arc::clone(&coordinator),
        Arc::clone(&intake),
    );

    // Install signal handler.
    let cancel = shutdown::install_signal_handler();
    let tracker = TaskTracker::new();

    #[cfg(feature = "gateway")]
    if config.gateway.enabled {
        let server_config = entoforce_gateway::ServerConfig::from(&config.gateway);
        let state = entoforce_gateway::ApiState::new(
            Arc::clone(&coordinator),
            Arc::clone(&intake),
            config.gateway.bearer_token.clone(),
        );
        let server_cancel = cancel.clone();
        tracker.spawn(async move {
            if let Err(e) =
                entoforce_gateway::start_server(&server_config, state, server_cancel.clone()).await
            {
                error!(error = %e, "gateway server failed, shutting down");
                server_cancel.cancel();
            }
        });
    }
    tracker.close();

    info!("entoforce ready");
    let run_result = event_loop.run(cancel.clone()).await;

    // The event loop also stops when every bot closes; take the HTTP server down with it.
    cancel.cancel();
    tracker.wait().await;

    if let Err(e) = gateway.shutdown().await {
        warn!(error = %e, "gateway shutdown error");
    }
    repo.close().await?;
    run_result?;

    info!("entoforce serve shutdown complete");
    Ok(())
}

/// One Telegram gateway per configured bot token.
fn build_multiplexer(config: &EntoforceConfig) -> Result<GatewayMultiplexer, EntoforceError> {
    #[cfg_attr(not(feature = "telegram"), allow(unused_mut))]
    let mut mux = GatewayMultiplexer::new();

    #[cfg(feature = "telegram")]
    {
        use entoforce_core::ConversationKind;
        use entoforce_telegram::TelegramGateway;

        let telegram = &config.telegram;
        for (kind, token) in [
            (
                ConversationKind::ClientIntake,
                telegram.client_bot_token.as_deref(),
            ),
            (
                ConversationKind::TechnicianIntake,
                telegram.technician_bot_token.as_deref(),
            ),
        ] {
            if token.is_none_or(str::is_empty) {
                warn!(kind = %kind, "no bot token configured, conversations of this kind are disabled");
                continue;
            }
            let gateway = TelegramGateway::new(kind, telegram)?;
            mux.add_gateway(kind, Box::new(gateway));
            info!(kind = %kind, "telegram bot registered");
        }
    }

    #[cfg(not(feature = "telegram"))]
    if config.telegram.client_bot_token.is_some() || config.telegram.technician_bot_token.is_some()
    {
        warn!("telegram tokens configured but telegram support is not compiled in");
    }

    Ok(mux)
}

fn http_intake_enabled(config: &EntoforceConfig) -> bool {
    if config.gateway.enabled && !cfg!(feature = "gateway") {
        warn!("gateway.enabled is set but HTTP support is not compiled in");
    }
    cfg!(feature = "gateway") && config.gateway.enabled
}

/// Refuse to start a service nobody can reach.
fn ensure_intake_configured(gateways: usize, http_enabled: bool) -> Result<(), EntoforceError> {
    if gateways == 0 && !http_enabled {
        return Err(EntoforceError::Config(
            "nothing to serve: configure telegram.client_bot_token / \
             telegram.technician_bot_token or enable [gateway]"
                .to_string(),
        ));
    }
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("entoforce={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
