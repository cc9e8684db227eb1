// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assignment coordinator: select, reserve, offer, then accept, decline or time out.
//!
//! Work on one order is serialized by a per-order async mutex; different
//! orders proceed in parallel. Two orders racing for the same technician's
//! last unit of capacity are arbitrated by the repository's transactional
//! reserve, and the loser re-selects from a fresh snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use entoforce_config::model::DispatchConfig;
use entoforce_core::{
    ConversationKind, EntoforceError, FieldReport, MessagingGateway, Order, OrderId, OrderStatus,
    OutboundMessage, PartyId, Repository, Technician, TechnicianId,
};

use crate::action::OfferAction;
use crate::selector::select;

/// Result of trying to place an order with a technician.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    /// The order is `Offered` to `technician`. `delivered` is false when the
    /// offer message could not be sent; the reservation stands regardless.
    Offered {
        technician: Technician,
        delivered: bool,
    },
    /// Nobody is eligible. The order is left `Unassigned`.
    NoCapacity,
}

/// Result of a decline or timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineOutcome {
    /// The order was automatically offered to another technician.
    Reoffered {
        technician: Technician,
        delivered: bool,
    },
    /// The automatic retry found nobody. The order is `Unassigned`.
    NoCapacity,
    /// The automatic retry budget was already spent. The order is `Declined`.
    Exhausted,
}

/// Result of an accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The order moved `Offered -> InProgress`.
    Accepted(Order),
    /// The same technician had already accepted; nothing changed.
    AlreadyAccepted(Order),
}

impl AcceptOutcome {
    pub fn order(&self) -> &Order {
        match self {
            AcceptOutcome::Accepted(order) | AcceptOutcome::AlreadyAccepted(order) => order,
        }
    }
}

/// Automatic re-offer bookkeeping for one order.
#[derive(Debug, Default)]
struct OfferHistory {
    declined_by: HashSet<TechnicianId>,
    auto_reassignments: u32,
}

/// Holds an order's lock; drops the map entry once nobody else wants it.
struct OrderGuard<'a> {
    locks: &'a DashMap<OrderId, Arc<Mutex<()>>>,
    order_id: OrderId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for OrderGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.order_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Orchestrates the offer protocol for every order.
pub struct Coordinator {
    repo: Arc<dyn Repository>,
    gateway: Arc<dyn MessagingGateway>,
    config: DispatchConfig,
    order_locks: DashMap<OrderId, Arc<Mutex<()>>>,
    history: DashMap<OrderId, OfferHistory>,
}

impl Coordinator {
    pub fn new(
        repo: Arc<dyn Repository>,
        gateway: Arc<dyn MessagingGateway>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            repo,
            gateway,
            config,
            order_locks: DashMap::new(),
            history: DashMap::new(),
        }
    }

    /// Offer an order to the next technician.
    ///
    /// Accepted from `New`, `Unassigned` and `Declined`. Starts a fresh
    /// automatic re-offer budget for the order.
    pub async fn assign(&self, order_id: OrderId) -> Result<AssignOutcome, EntoforceError> {
        let _guard = self.lock_order(order_id).await;
        self.history.remove(&order_id);
        self.assign_locked(order_id, &HashSet::new()).await
    }

    /// Accept an offer. Idempotent for the technician who already accepted.
    pub async fn accept(
        &self,
        order_id: OrderId,
        technician_id: TechnicianId,
    ) -> Result<AcceptOutcome, EntoforceError> {
        let _guard = self.lock_order(order_id).await;
        let order = self.load_order(order_id).await?;

        match (order.status, order.technician_id) {
            (OrderStatus::InProgress, Some(holder)) if holder == technician_id => {
                debug!(%order_id, %technician_id, "accept repeated");
                Ok(AcceptOutcome::AlreadyAccepted(order))
            }
            (OrderStatus::Offered, Some(holder)) if holder == technician_id => {
                let applied = self
                    .repo
                    .transition_order(
                        order_id,
                        Some(technician_id),
                        OrderStatus::Offered,
                        OrderStatus::InProgress,
                    )
                    .await?;
                if !applied {
                    let current = self.load_order(order_id).await?;
                    return Err(invalid(order_id, current.status, "accept"));
                }
                self.history.remove(&order_id);
                info!(%order_id, %technician_id, "offer accepted");
                Ok(AcceptOutcome::Accepted(Order {
                    status: OrderStatus::InProgress,
                    ..order
                }))
            }
            (status, _) => Err(invalid(order_id, status, "accept")),
        }
    }

    /// Decline an offer: release the technician and retry once without them.
    pub async fn decline(
        &self,
        order_id: OrderId,
        technician_id: TechnicianId,
    ) -> Result<DeclineOutcome, EntoforceError> {
        let _guard = self.lock_order(order_id).await;
        let order = self.load_order(order_id).await?;
        if order.status != OrderStatus::Offered || order.technician_id != Some(technician_id) {
            return Err(invalid(order_id, order.status, "decline"));
        }
        info!(%order_id, %technician_id, "offer declined");
        self.release_and_retry(order_id, technician_id).await
    }

    /// Expire an outstanding offer. Same release-and-retry path as [`decline`](Self::decline).
    pub async fn decline_on_timeout(
        &self,
        order_id: OrderId,
    ) -> Result<DeclineOutcome, EntoforceError> {
        let _guard = self.lock_order(order_id).await;
        let order = self.load_order(order_id).await?;
        let technician_id = match (order.status, order.technician_id) {
            (OrderStatus::Offered, Some(holder)) => holder,
            (status, _) => return Err(invalid(order_id, status, "time out")),
        };
        info!(%order_id, %technician_id, "offer timed out");

        if let Some(technician) = self.repo.get_technician(technician_id).await? {
            self.notify(
                &technician,
                order_id,
                format!("Offer for order #{order_id} has expired."),
                Vec::new(),
            )
            .await;
        }
        self.release_and_retry(order_id, technician_id).await
    }

    /// Finish an order: `InProgress -> Completed`, returning the technician's capacity.
    pub async fn complete(
        &self,
        order_id: OrderId,
        technician_id: TechnicianId,
    ) -> Result<Order, EntoforceError> {
        let _guard = self.lock_order(order_id).await;
        let order = self.load_order(order_id).await?;
        if order.status != OrderStatus::InProgress || order.technician_id != Some(technician_id) {
            return Err(invalid(order_id, order.status, "complete"));
        }
        self.repo
            .release_technician(technician_id, order_id, OrderStatus::Completed)
            .await?;
        self.history.remove(&order_id);
        info!(%order_id, %technician_id, "order completed");
        Ok(Order {
            status: OrderStatus::Completed,
            ..order
        })
    }

    /// Store the technician intake fields on an order the technician is working.
    pub async fn record_field_report(
        &self,
        order_id: OrderId,
        technician_id: TechnicianId,
        report: &FieldReport,
    ) -> Result<(), EntoforceError> {
        let _guard = self.lock_order(order_id).await;
        self.repo
            .record_field_report(order_id, technician_id, report)
            .await?;
        info!(%order_id, %technician_id, "field report recorded");
        Ok(())
    }

    /// The repository this coordinator writes through.
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    async fn lock_order(&self, order_id: OrderId) -> OrderGuard<'_> {
        let lock = self.order_locks.entry(order_id).or_default().clone();
        let guard = lock.lock_owned().await;
        OrderGuard {
            locks: &self.order_locks,
            order_id,
            guard: Some(guard),
        }
    }

    async fn load_order(&self, order_id: OrderId) -> Result<Order, EntoforceError> {
        self.repo
            .get_order(order_id)
            .await?
            .ok_or_else(|| EntoforceError::not_found("order", order_id))
    }

    /// Caller holds the order lock.
    async fn release_and_retry(
        &self,
        order_id: OrderId,
        technician_id: TechnicianId,
    ) -> Result<DeclineOutcome, EntoforceError> {
        self.repo
            .release_technician(technician_id, order_id, OrderStatus::New)
            .await?;

        let (exclude, spent) = {
            let mut history = self.history.entry(order_id).or_default();
            history.declined_by.insert(technician_id);
            (history.declined_by.clone(), history.auto_reassignments)
        };

        if spent >= self.config.max_auto_reassignments {
            self.history.remove(&order_id);
            self.repo
                .transition_order(order_id, None, OrderStatus::New, OrderStatus::Declined)
                .await?;
            info!(%order_id, "automatic re-offers exhausted, order declined");
            return Ok(DeclineOutcome::Exhausted);
        }

        if let Some(mut history) = self.history.get_mut(&order_id) {
            history.auto_reassignments += 1;
        }

        match self.assign_locked(order_id, &exclude).await? {
            AssignOutcome::Offered {
                technician,
                delivered,
            } => Ok(DeclineOutcome::Reoffered {
                technician,
                delivered,
            }),
            AssignOutcome::NoCapacity => {
                self.history.remove(&order_id);
                Ok(DeclineOutcome::NoCapacity)
            }
        }
    }

    /// Caller holds the order lock.
    async fn assign_locked(
        &self,
        order_id: OrderId,
        exclude: &HashSet<TechnicianId>,
    ) -> Result<AssignOutcome, EntoforceError> {
        let order = self.load_order(order_id).await?;
        if !order.status.is_assignable() {
            return Err(invalid(order_id, order.status, "be assigned"));
        }

        let mut reserved = None;
        for attempt in 0..=self.config.max_reservation_retries {
            let pool = self.repo.find_technicians_eligible().await?;
            let Some(candidate) = select(&pool, exclude) else {
                break;
            };
            let now = Utc::now();
            match self
                .repo
                .reserve_technician(candidate.id, order_id, now)
                .await
            {
                Ok(()) => {
                    reserved = Some(Technician {
                        load: candidate.load + 1,
                        last_assigned: Some(now),
                        ..candidate.clone()
                    });
                    break;
                }
                Err(EntoforceError::ReservationConflict { technician_id }) => {
                    debug!(%order_id, %technician_id, attempt, "reservation lost a race, reselecting");
                }
                Err(e) => return Err(e),
            }
        }

        let Some(technician) = reserved else {
            self.repo
                .transition_order(order_id, None, order.status, OrderStatus::Unassigned)
                .await?;
            info!(%order_id, "no technician available");
            return Ok(AssignOutcome::NoCapacity);
        };

        info!(%order_id, technician_id = %technician.id, "order offered");
        let delivered = self.send_offer(&technician, &order).await;
        Ok(AssignOutcome::Offered {
            technician,
            delivered,
        })
    }

    async fn send_offer(&self, technician: &Technician, order: &Order) -> bool {
        let address = match self.repo.get_client(order.client_id).await {
            Ok(Some(client)) => client.address,
            Ok(None) => "unknown".to_string(),
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "client lookup for offer failed");
                "unknown".to_string()
            }
        };
        let text = format!(
            "New order #{}.\nAddress: {}\nObject: {}\nInsects: {}\nDo you accept the order?",
            order.id, address, order.intake.object_type, order.intake.insect_quantity
        );
        let choices = vec![
            OfferAction::Accept(order.id).choice(),
            OfferAction::Decline(order.id).choice(),
        ];
        self.notify(technician, order.id, text, choices).await
    }

    /// Best-effort send to a technician. Failures are logged, never propagated.
    async fn notify(
        &self,
        technician: &Technician,
        order_id: OrderId,
        text: String,
        choices: Vec<entoforce_core::ChoiceOption>,
    ) -> bool {
        let Some(address) = technician.channel_address.as_deref() else {
            warn!(%order_id, technician_id = %technician.id, "technician has no channel address");
            return false;
        };
        let msg = OutboundMessage::text(
            ConversationKind::TechnicianIntake,
            PartyId::new(address),
            text,
        )
        .with_choices(choices);

        match self.gateway.send(msg).await {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    %order_id,
                    technician_id = %technician.id,
                    error = %e,
                    "delivery to technician failed"
                );
                false
            }
        }
    }
}

fn invalid(order_id: OrderId, status: OrderStatus, action: &'static str) -> EntoforceError {
    EntoforceError::InvalidTransition {
        order_id,
        status,
        action,
    }
}
