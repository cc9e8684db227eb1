// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The inbound side of the service: gateway events in, conversation steps out.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use entoforce_core::{ConversationKind, EntoforceError, InboundEvent, MessagingGateway};
use entoforce_dispatch::Coordinator;

use crate::client_intake::ClientIntakeFlow;
use crate::engine::ConversationEngine;
use crate::intake::IntakeService;
use crate::technician_intake::TechnicianIntakeFlow;

/// Routes inbound events to the conversation engine for their kind.
pub struct EventLoop {
    gateway: Arc<dyn MessagingGateway>,
    clients: ConversationEngine<ClientIntakeFlow>,
    technicians: ConversationEngine<TechnicianIntakeFlow>,
}

impl EventLoop {
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        coordinator: Arc<Coordinator>,
        intake: Arc<IntakeService>,
    ) -> Self {
        let clients = ConversationEngine::new(ClientIntakeFlow::new(intake), Arc::clone(&gateway));
        let technicians =
            ConversationEngine::new(TechnicianIntakeFlow::new(coordinator), Arc::clone(&gateway));
        Self {
            gateway,
            clients,
            technicians,
        }
    }

    pub fn clients(&self) -> &ConversationEngine<ClientIntakeFlow> {
        &self.clients
    }

    pub fn technicians(&self) -> &ConversationEngine<TechnicianIntakeFlow> {
        &self.technicians
    }

    /// Handle one inbound event and wait until its conversation step is done.
    pub async fn on_event(&self, event: InboundEvent) {
        let _ = self.route(event).await;
    }

    fn route(&self, event: InboundEvent) -> oneshot::Receiver<()> {
        debug!(party = %event.party, kind = %event.kind, "routing inbound event");
        match event.kind {
            ConversationKind::ClientIntake => self.clients.dispatch(event.party, event.payload),
            ConversationKind::TechnicianIntake => {
                self.technicians.dispatch(event.party, event.payload)
            }
        }
    }

    /// Pull events from the gateway until `cancel` fires or the gateway closes.
    ///
    /// Events are queued without waiting, so a slow conversation never
    /// holds up other parties.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), EntoforceError> {
        info!("event loop running");

        loop {
            tokio::select! {
                event = self.gateway.receive() => {
                    match event {
                        Ok(event) => {
                            drop(self.route(event));
                        }
                        Err(EntoforceError::Internal(reason)) => {
                            error!(reason = %reason, "gateway closed, stopping event loop");
                            break;
                        }
                        Err(e) => {
                            error!(error = %e, "gateway receive error");
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping event loop");
                    break;
                }
            }
        }

        self.clients.shutdown().await;
        self.technicians.shutdown().await;
        info!("event loop stopped");
        Ok(())
    }
}
