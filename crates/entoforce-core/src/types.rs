// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Entoforce service.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a technician.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechnicianId(pub i64);

/// Unique identifier for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub i64);

/// Unique identifier for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl fmt::Display for TechnicianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a party on a messaging channel (a chat id for Telegram).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub String);

impl PartyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Repository,
    Gateway,
}

// --- Entities ---

/// Lifecycle of an order.
///
/// `New -> Offered -> InProgress -> Completed`, with `Offered` falling back to
/// `New`/`Unassigned`/`Declined` when the technician declines or times out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Offered,
    InProgress,
    Completed,
    Declined,
    Unassigned,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::New,
        OrderStatus::Offered,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Declined,
        OrderStatus::Unassigned,
    ];

    /// Statuses from which the coordinator may start a new offer.
    pub fn is_assignable(self) -> bool {
        matches!(
            self,
            OrderStatus::New | OrderStatus::Unassigned | OrderStatus::Declined
        )
    }

    /// Statuses in which exactly one technician holds the order.
    pub fn holds_technician(self) -> bool {
        matches!(self, OrderStatus::Offered | OrderStatus::InProgress)
    }
}

/// A field technician ("disinsector").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    pub id: TechnicianId,
    pub name: String,
    /// Secret used to link a messaging account to this technician.
    pub channel_token: Option<String>,
    /// Messaging address, `None` until the technician links their account.
    pub channel_address: Option<String>,
    pub load: u32,
    pub max_load: u32,
    pub last_assigned: Option<DateTime<Utc>>,
}

impl Technician {
    pub fn is_linked(&self) -> bool {
        self.channel_token.is_some() && self.channel_address.is_some()
    }

    pub fn has_capacity(&self) -> bool {
        self.load < self.max_load
    }

    /// Linked and below `max_load`: the only technicians the selector considers.
    pub fn is_eligible(&self) -> bool {
        self.is_linked() && self.has_capacity()
    }

    pub fn spare_capacity(&self) -> u32 {
        self.max_load.saturating_sub(self.load)
    }
}

/// Input for registering a technician.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTechnician {
    pub name: String,
    pub channel_token: String,
    pub max_load: u32,
}

/// A client, deduplicated by phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// Contact details collected at intake; `phone` is already normalised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContact {
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// Fields collected from the client when the request is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeDetails {
    pub object_type: String,
    pub insect_quantity: String,
    pub has_experience: bool,
}

/// Fields collected from the technician after accepting an offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReport {
    pub chemical_type: String,
    pub area: String,
    pub poison_type: String,
    pub insect_type: String,
    pub estimated_cost: String,
}

/// A pest-control service request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub client_id: ClientId,
    pub technician_id: Option<TechnicianId>,
    pub status: OrderStatus,
    pub intake: IntakeDetails,
    /// `None` until the technician intake conversation commits.
    pub report: Option<FieldReport>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub client_id: ClientId,
    pub intake: IntakeDetails,
}

// --- Messaging ---

/// Which FSM governs an exchange; also selects the bot a message travels through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    ClientIntake,
    TechnicianIntake,
}

/// The content of an inbound event after transport decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// `/start`, optionally with an argument (the technician link token).
    Start(Option<String>),
    /// Free-text message.
    Text(String),
    /// A pick from a constrained option set; carries the option value.
    Choice(String),
    /// A shared phone contact.
    Contact(String),
    /// Explicit cancel of the active conversation.
    Cancel,
}

/// An inbound event received from a messaging gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub party: PartyId,
    pub kind: ConversationKind,
    pub payload: EventPayload,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(party: PartyId, kind: ConversationKind, payload: EventPayload) -> Self {
        Self {
            party,
            kind,
            payload,
            received_at: Utc::now(),
        }
    }
}

/// A labelled action the recipient can pick; `value` comes back as `EventPayload::Choice`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: String,
    pub value: String,
}

impl ChoiceOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// An outbound message to be sent via a messaging gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: ConversationKind,
    pub recipient: PartyId,
    pub text: String,
    pub choices: Vec<ChoiceOption>,
    /// Ask the transport to offer a "share my phone number" affordance.
    pub request_contact: bool,
}

impl OutboundMessage {
    pub fn text(channel: ConversationKind, recipient: PartyId, text: impl Into<String>) -> Self {
        Self {
            channel,
            recipient,
            text: text.into(),
            choices: Vec::new(),
            request_contact: false,
        }
    }

    pub fn with_choices(mut self, choices: Vec<ChoiceOption>) -> Self {
        self.choices = choices;
        self
    }
}

/// Capabilities reported by a messaging gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCapabilities {
    pub supports_choices: bool,
    pub supports_contact_request: bool,
    pub max_message_length: Option<usize>,
}
