// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway multiplexer that aggregates the client and technician transports into one.
//!
//! The multiplexer spawns a receive task per child gateway that forwards
//! inbound events to a shared mpsc channel, tagging each with the
//! conversation kind the child serves. Outbound messages are routed to the
//! child registered for the message's `channel`.
//!
//! Only the receive tasks hold senders after `connect()`, so once every child
//! has closed, [`MessagingGateway::receive`] on the multiplexer returns
//! [`EntoforceError::Internal`] as well.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

use entoforce_core::{
    AdapterType, ConversationKind, EntoforceError, GatewayCapabilities, HealthStatus,
    InboundEvent, MessageId, MessagingGateway, OutboundMessage, PluginAdapter,
};

const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Aggregates one gateway per conversation kind behind a single
/// `MessagingGateway`.
pub struct GatewayMultiplexer {
    /// Child gateways, stored before connect().
    pending: Vec<(ConversationKind, Box<dyn MessagingGateway>)>,
    /// Connected child gateways (moved here after connect()).
    connected: Vec<(ConversationKind, Arc<dyn MessagingGateway>)>,
    inbound_rx: Mutex<mpsc::Receiver<InboundEvent>>,
    /// Handed to the receive tasks by connect(); `None` afterwards.
    inbound_tx: Option<mpsc::Sender<InboundEvent>>,
}

impl Default for GatewayMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayMultiplexer {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(512);
        Self {
            pending: Vec::new(),
            connected: Vec::new(),
            inbound_rx: Mutex::new(inbound_rx),
            inbound_tx: Some(inbound_tx),
        }
    }

    /// Register the gateway serving `kind`. Must be called before `connect()`.
    pub fn add_gateway(&mut self, kind: ConversationKind, gateway: Box<dyn MessagingGateway>) {
        self.pending.push((kind, gateway));
    }

    /// Number of gateways registered (pending + connected).
    pub fn gateway_count(&self) -> usize {
        self.pending.len() + self.connected.len()
    }

    fn route(&self, kind: ConversationKind) -> Option<&Arc<dyn MessagingGateway>> {
        self.connected
            .iter()
            .find(|(served, _)| *served == kind)
            .map(|(_, gateway)| gateway)
    }
}

#[async_trait]
impl PluginAdapter for GatewayMultiplexer {
    fn name(&self) -> &str {
        "multiplexer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Gateway
    }

    async fn health_check(&self) -> Result<HealthStatus, EntoforceError> {
        let mut reasons = Vec::new();
        for (kind, gateway) in &self.connected {
            match gateway.health_check().await? {
                HealthStatus::Healthy => {}
                HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
                    reasons.push(format!("{kind}: {reason}"));
                }
            }
        }

        if reasons.is_empty() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(reasons.join("; ")))
        }
    }

    async fn shutdown(&self) -> Result<(), EntoforceError> {
        for (kind, gateway) in &self.connected {
            if let Err(e) = gateway.shutdown().await {
                warn!(kind = %kind, error = %e, "gateway shutdown error");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingGateway for GatewayMultiplexer {
    fn capabilities(&self) -> GatewayCapabilities {
        let mut caps = GatewayCapabilities {
            supports_choices: true,
            supports_contact_request: true,
            max_message_length: None,
        };
        for (_, gateway) in &self.connected {
            let child = gateway.capabilities();
            caps.supports_choices &= child.supports_choices;
            caps.supports_contact_request &= child.supports_contact_request;
            caps.max_message_length = match (caps.max_message_length, child.max_message_length) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        caps
    }

    async fn connect(&mut self) -> Result<(), EntoforceError> {
        let Some(inbound_tx) = self.inbound_tx.take() else {
            return Err(EntoforceError::Internal(
                "multiplexer is already connected".into(),
            ));
        };

        for (kind, mut gateway) in std::mem::take(&mut self.pending) {
            gateway.connect().await?;
            info!(kind = %kind, gateway = gateway.name(), "gateway connected via multiplexer");

            let gateway: Arc<dyn MessagingGateway> = Arc::from(gateway);
            self.connected.push((kind, Arc::clone(&gateway)));

            let tx = inbound_tx.clone();
            tokio::spawn(async move {
                loop {
                    match gateway.receive().await {
                        Ok(mut event) => {
                            event.kind = kind;
                            if tx.send(event).await.is_err() {
                                // Multiplexer was dropped.
                                break;
                            }
                        }
                        Err(EntoforceError::Internal(reason)) => {
                            info!(kind = %kind, reason = %reason, "gateway closed, stopping receive task");
                            break;
                        }
                        Err(e) => {
                            warn!(kind = %kind, error = %e, "gateway receive error");
                            tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                        }
                    }
                }
            });
        }

        // Without children nothing can ever arrive; keep the channel open so
        // receive() waits instead of reporting a closed transport.
        if self.connected.is_empty() {
            self.inbound_tx = Some(inbound_tx);
        }

        info!(gateways = self.connected.len(), "gateway multiplexer connected");
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, EntoforceError> {
        match self.route(msg.channel) {
            Some(gateway) => gateway.send(msg).await,
            None => {
                warn!(kind = %msg.channel, "no gateway registered for outbound message");
                Err(EntoforceError::Delivery {
                    recipient: msg.recipient.to_string(),
                    message: format!("no gateway for {}", msg.channel),
                    source: None,
                })
            }
        }
    }

    async fn receive(&self) -> Result<InboundEvent, EntoforceError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| EntoforceError::Internal("multiplexer inbound channel closed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplexer_new() {
        let mux = GatewayMultiplexer::new();
        assert_eq!(mux.name(), "multiplexer");
        assert_eq!(mux.adapter_type(), AdapterType::Gateway);
        assert_eq!(mux.gateway_count(), 0);
    }

    #[tokio::test]
    async fn multiplexer_empty_health_check() {
        let mux = GatewayMultiplexer::new();
        assert_eq!(mux.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    /// A transport that has already stopped.
    struct StoppedGateway;

    #[async_trait]
    impl PluginAdapter for StoppedGateway {
        fn name(&self) -> &str {
            "stopped"
        }

        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }

        fn adapter_type(&self) -> AdapterType {
            AdapterType::Gateway
        }

        async fn health_check(&self) -> Result<HealthStatus, EntoforceError> {
            Ok(HealthStatus::Unhealthy("stopped".into()))
        }

        async fn shutdown(&self) -> Result<(), EntoforceError> {
            Ok(())
        }
    }

    #[async_trait]
    impl MessagingGateway for StoppedGateway {
        fn capabilities(&self) -> GatewayCapabilities {
            GatewayCapabilities {
                supports_choices: false,
                supports_contact_request: false,
                max_message_length: None,
            }
        }

        async fn connect(&mut self) -> Result<(), EntoforceError> {
            Ok(())
        }

        async fn send(&self, _msg: OutboundMessage) -> Result<MessageId, EntoforceError> {
            Err(EntoforceError::Internal("stopped".into()))
        }

        async fn receive(&self) -> Result<InboundEvent, EntoforceError> {
            Err(EntoforceError::Internal("stopped".into()))
        }
    }

    #[tokio::test]
    async fn closes_once_every_child_has_closed() {
        let mut mux = GatewayMultiplexer::new();
        mux.add_gateway(ConversationKind::ClientIntake, Box::new(StoppedGateway));
        mux.add_gateway(ConversationKind::TechnicianIntake, Box::new(StoppedGateway));
        mux.connect().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), mux.receive())
            .await
            .expect("receive should not hang once all children closed");
        assert!(matches!(result, Err(EntoforceError::Internal(_))));
    }

    #[tokio::test]
    async fn without_children_receive_waits() {
        let mut mux = GatewayMultiplexer::new();
        mux.connect().await.unwrap();
        let result = tokio::time::timeout(Duration::from_millis(50), mux.receive()).await;
        assert!(result.is_err(), "receive returned early: {result:?}");
    }

    #[tokio::test]
    async fn connect_twice_is_refused() {
        let mut mux = GatewayMultiplexer::new();
        mux.add_gateway(ConversationKind::ClientIntake, Box::new(StoppedGateway));
        mux.connect().await.unwrap();
        assert!(mux.connect().await.is_err());
    }

    #[tokio::test]
    async fn unrouted_send_is_a_delivery_failure() {
        let mux = GatewayMultiplexer::new();
        let msg = OutboundMessage::text(
            ConversationKind::TechnicianIntake,
            entoforce_core::PartyId::new("42"),
            "hello",
        );
        let err = mux.send(msg).await.unwrap_err();
        assert!(matches!(err, EntoforceError::Delivery { ref recipient, .. } if recipient == "42"));
    }
}
