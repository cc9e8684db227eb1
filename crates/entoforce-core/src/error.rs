// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Entoforce dispatch service.

use thiserror::Error;

use crate::types::{OrderId, OrderStatus, TechnicianId};

/// Text shown to a party when a storage or transport failure interrupts their request.
pub const RETRY_LATER_MESSAGE: &str =
    "Something went wrong while processing your request. Please try again later.";

/// The primary error type used across all Entoforce adapter traits and core operations.
///
/// "No technician available" is deliberately absent: it is an expected outcome
/// and travels as `AssignOutcome::NoCapacity` inside `Ok`.
#[derive(Debug, Error)]
pub enum EntoforceError {
    /// Configuration errors (invalid TOML, missing tokens, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Repository backend errors (connection, query failure, constraint violation).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The messaging transport could not reach a party.
    #[error("delivery to {recipient} failed: {message}")]
    Delivery {
        recipient: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed intake input. Recovered by re-prompting the same state.
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// A concurrent reservation took the technician's last unit of capacity.
    #[error("technician {technician_id} has no spare capacity")]
    ReservationConflict { technician_id: TechnicianId },

    /// The order is not in a status that allows the requested action.
    #[error("order {order_id} cannot {action} while {status}")]
    InvalidTransition {
        order_id: OrderId,
        status: OrderStatus,
        action: &'static str,
    },

    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EntoforceError {
    /// Shorthand for a validation failure on `field`.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Wraps any storage-layer error.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Shorthand for a missing entity.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true for errors the party can fix by re-entering input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Text safe to show to a client or technician.
    ///
    /// Validation problems are explained; storage and transport failures are
    /// reduced to a generic retry-later message, details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::InvalidTransition { order_id, .. } => {
                format!("Order #{order_id} is no longer available for this action.")
            }
            Self::NotFound { entity, .. } => format!("The requested {entity} was not found."),
            _ => RETRY_LATER_MESSAGE.to_string(),
        }
    }
}
