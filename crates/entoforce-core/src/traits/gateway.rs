// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging gateway trait for chat transports (Telegram, mocks, multiplexers).

use async_trait::async_trait;

use crate::error::EntoforceError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{GatewayCapabilities, InboundEvent, MessageId, OutboundMessage};

/// Bidirectional messaging transport.
///
/// `send` reports delivery success per recipient; there is no ordering
/// guarantee across recipients. A failed send is returned as
/// [`EntoforceError::Delivery`] and must never be propagated across flows.
#[async_trait]
pub trait MessagingGateway: PluginAdapter {
    /// Returns the capabilities supported by this transport.
    fn capabilities(&self) -> GatewayCapabilities;

    /// Establishes a connection to the messaging platform.
    async fn connect(&mut self) -> Result<(), EntoforceError>;

    /// Delivers a message to its recipient.
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, EntoforceError>;

    /// Receives the next inbound event.
    ///
    /// Returns [`EntoforceError::Internal`] once the transport has stopped
    /// for good; other errors are transient.
    async fn receive(&self) -> Result<InboundEvent, EntoforceError>;
}
