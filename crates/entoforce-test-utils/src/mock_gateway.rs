// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging gateway for deterministic testing.
//!
//! `MockGateway` implements `MessagingGateway` with injectable inbound events,
//! captured outbound messages, and per-recipient delivery failures.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use entoforce_core::{
    AdapterType, ConversationKind, EntoforceError, EventPayload, GatewayCapabilities,
    HealthStatus, InboundEvent, MessageId, MessagingGateway, OutboundMessage, PartyId,
    PluginAdapter,
};

/// A mock messaging gateway for testing.
///
/// Provides two queues:
/// - **inbound**: events injected via `inject()` are returned by `receive()`
/// - **sent**: messages passed to `send()` are captured and retrievable via `sent_messages()`
///
/// Recipients registered with `fail_recipient()` get a `Delivery` error
/// instead; their messages are not captured. Clones share all queues, so a
/// clone can be boxed into a multiplexer while the test keeps inspecting it.
///
/// After `close()`, `receive()` drains what is queued and then reports the
/// transport as gone with `EntoforceError::Internal`.
#[derive(Clone)]
pub struct MockGateway {
    inbound: Arc<Mutex<VecDeque<InboundEvent>>>,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    failing: Arc<Mutex<HashSet<PartyId>>>,
    notify: Arc<Notify>,
    closed: Arc<AtomicBool>,
}

impl MockGateway {
    /// Create a new mock gateway with empty queues.
    pub fn new() -> Self {
        Self {
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
            notify: Arc::new(Notify::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Inject an inbound event into the receive queue.
    pub async fn inject(&self, event: InboundEvent) {
        self.inbound.lock().await.push_back(event);
        self.notify.notify_one();
    }

    /// Stop the transport, as when a bot's polling ends for good.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // notify_one keeps a permit, so a receiver that has not parked yet still wakes.
        self.notify.notify_one();
    }

    /// Shorthand for injecting `payload` from `party` on `kind`.
    pub async fn inject_payload(&self, party: &str, kind: ConversationKind, payload: EventPayload) {
        self.inject(InboundEvent::new(PartyId::new(party), kind, payload))
            .await;
    }

    /// Make every later send to `recipient` fail.
    pub async fn fail_recipient(&self, recipient: PartyId) {
        self.failing.lock().await.insert(recipient);
    }

    /// Let `recipient` receive messages again.
    pub async fn restore_recipient(&self, recipient: &PartyId) {
        self.failing.lock().await.remove(recipient);
    }

    /// Get all messages that were delivered through `send()`.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    /// Messages delivered to one recipient, oldest first.
    pub async fn sent_to(&self, recipient: &str) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.recipient.as_str() == recipient)
            .cloned()
            .collect()
    }

    /// The most recent message delivered to `recipient`.
    pub async fn last_to(&self, recipient: &str) -> Option<OutboundMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.recipient.as_str() == recipient)
            .cloned()
    }

    /// Get the count of delivered messages.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Clear all captured messages.
    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockGateway {
    fn name(&self) -> &str {
        "mock-gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Gateway
    }

    async fn health_check(&self) -> Result<HealthStatus, EntoforceError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), EntoforceError> {
        Ok(())
    }
}

#[async_trait]
impl MessagingGateway for MockGateway {
    fn capabilities(&self) -> GatewayCapabilities {
        GatewayCapabilities {
            supports_choices: true,
            supports_contact_request: true,
            max_message_length: None,
        }
    }

    async fn connect(&mut self) -> Result<(), EntoforceError> {
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, EntoforceError> {
        if self.failing.lock().await.contains(&msg.recipient) {
            return Err(EntoforceError::Delivery {
                recipient: msg.recipient.to_string(),
                message: "recipient unreachable".to_string(),
                source: None,
            });
        }
        let id = format!("mock-msg-{}", uuid::Uuid::new_v4());
        self.sent.lock().await.push(msg);
        Ok(MessageId(id))
    }

    async fn receive(&self) -> Result<InboundEvent, EntoforceError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Ok(event);
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(EntoforceError::Internal("mock gateway closed".into()));
            }
            self.notify.notified().await;
        }
    }
}
