// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Entoforce dispatch service.
//!
//! This crate provides the entity types, the error type, and the adapter
//! traits (repository and messaging gateway) shared by every other crate in
//! the workspace.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{EntoforceError, RETRY_LATER_MESSAGE};
pub use types::{
    AdapterType, ChoiceOption, Client, ClientContact, ClientId, ConversationKind, EventPayload,
    FieldReport, GatewayCapabilities, HealthStatus, InboundEvent, IntakeDetails, MessageId,
    NewOrder, NewTechnician, Order, OrderId, OrderStatus, OutboundMessage, PartyId, Technician,
    TechnicianId,
};

// Re-export all adapter traits at crate root.
pub use traits::{MessagingGateway, PluginAdapter, Repository};
