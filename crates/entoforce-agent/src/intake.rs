// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order creation entry point shared by the client conversation and the HTTP surface.

use std::sync::Arc;

use tracing::info;

use entoforce_config::model::IntakeConfig;
use entoforce_core::{ClientContact, EntoforceError, IntakeDetails, NewOrder, OrderId};
use entoforce_dispatch::{AssignOutcome, Coordinator};

use crate::options;
use crate::validate;

/// Everything a client supplies when requesting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub client_name: String,
    pub phone: String,
    pub address: String,
    pub object_type: String,
    pub insect_quantity: String,
    pub has_experience: bool,
}

/// The created order and what happened when it was handed to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub order_id: OrderId,
    pub outcome: AssignOutcome,
}

/// Validates a request, upserts the client, creates the order and assigns it.
pub struct IntakeService {
    coordinator: Arc<Coordinator>,
    config: IntakeConfig,
}

impl IntakeService {
    pub fn new(coordinator: Arc<Coordinator>, config: IntakeConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Create an order without a conversation.
    ///
    /// Nothing is written when validation fails. "No technician available"
    /// is a successful submission with `AssignOutcome::NoCapacity`: the order
    /// is stored as `Unassigned` and waits until a later `Coordinator::assign`
    /// finds capacity.
    pub async fn submit_order(&self, request: OrderRequest) -> Result<Submission, EntoforceError> {
        let contact = ClientContact {
            name: validate::validate_name(&request.client_name)?,
            phone: validate::normalize_phone(&request.phone, &self.config)?,
            address: validate::validate_address(&request.address, &self.config)?,
        };
        let object_type = options::resolve(options::OBJECT_TYPES, &request.object_type)
            .ok_or_else(|| EntoforceError::validation("object_type", "Unknown object type."))?;
        let insect_quantity =
            options::resolve(options::INSECT_QUANTITIES, &request.insect_quantity).ok_or_else(
                || EntoforceError::validation("insect_quantity", "Unknown insect quantity."),
            )?;

        let repo = self.coordinator.repository();
        let client = repo.find_or_create_client_by_phone(&contact).await?;
        let order = repo
            .create_order(&NewOrder {
                client_id: client.id,
                intake: IntakeDetails {
                    object_type: object_type.to_string(),
                    insect_quantity: insect_quantity.to_string(),
                    has_experience: request.has_experience,
                },
            })
            .await?;
        info!(order_id = %order.id, client_id = %client.id, "order created");

        let outcome = self.coordinator.assign(order.id).await?;
        Ok(Submission {
            order_id: order.id,
            outcome,
        })
    }
}
