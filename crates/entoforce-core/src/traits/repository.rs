// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository trait for entity persistence backends (SQLite, in-memory).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EntoforceError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Client, ClientContact, ClientId, FieldReport, NewOrder, NewTechnician, Order, OrderId,
    OrderStatus, Technician, TechnicianId,
};

/// CRUD and filtered queries over technicians, clients, and orders.
///
/// Every call is atomic on its own. The two multi-entity operations,
/// [`reserve_technician`](Repository::reserve_technician) and
/// [`release_technician`](Repository::release_technician), are single
/// transactions so the technician's load and the order's binding can never
/// disagree.
#[async_trait]
pub trait Repository: PluginAdapter {
    /// Initializes the backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), EntoforceError>;

    /// Closes the backend, flushing pending writes.
    async fn close(&self) -> Result<(), EntoforceError>;

    // --- Technicians ---

    async fn create_technician(&self, new: &NewTechnician) -> Result<Technician, EntoforceError>;

    async fn get_technician(&self, id: TechnicianId)
    -> Result<Option<Technician>, EntoforceError>;

    async fn list_technicians(&self) -> Result<Vec<Technician>, EntoforceError>;

    async fn find_technician_by_token(
        &self,
        token: &str,
    ) -> Result<Option<Technician>, EntoforceError>;

    async fn find_technician_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Technician>, EntoforceError>;

    /// Binds a messaging address to a technician.
    async fn link_technician(
        &self,
        id: TechnicianId,
        address: &str,
    ) -> Result<(), EntoforceError>;

    /// Technicians that are linked and have `load < max_load`.
    async fn find_technicians_eligible(&self) -> Result<Vec<Technician>, EntoforceError>;

    /// Atomically takes one unit of the technician's capacity and offers the order to them.
    ///
    /// Increments `load`, stamps `last_assigned = at`, binds the order and
    /// sets it `Offered`. Fails with `ReservationConflict` when the technician
    /// has no spare capacity (or lost its link) at commit time, and with
    /// `InvalidTransition` when the order is already bound or not assignable.
    /// On failure nothing is written.
    async fn reserve_technician(
        &self,
        technician_id: TechnicianId,
        order_id: OrderId,
        at: DateTime<Utc>,
    ) -> Result<(), EntoforceError>;

    /// Atomically gives back one unit of capacity and moves the order to `next`.
    ///
    /// The order must currently be held by `technician_id`. The binding is
    /// cleared unless `next` is `Completed`.
    async fn release_technician(
        &self,
        technician_id: TechnicianId,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<(), EntoforceError>;

    // --- Clients ---

    /// Returns the client with `contact.phone`, creating it if absent.
    async fn find_or_create_client_by_phone(
        &self,
        contact: &ClientContact,
    ) -> Result<Client, EntoforceError>;

    async fn get_client(&self, id: ClientId) -> Result<Option<Client>, EntoforceError>;

    // --- Orders ---

    /// Creates an order with status `New`.
    async fn create_order(&self, new: &NewOrder) -> Result<Order, EntoforceError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, EntoforceError>;

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, EntoforceError>;

    /// Compare-and-set on the order status.
    ///
    /// Applies only if the order is in `from` and, when `technician` is
    /// given, bound to that technician. Returns whether the update applied.
    async fn transition_order(
        &self,
        id: OrderId,
        technician: Option<TechnicianId>,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, EntoforceError>;

    /// Writes the technician-collected fields onto an `InProgress` order held by `technician_id`.
    async fn record_field_report(
        &self,
        id: OrderId,
        technician_id: TechnicianId,
        report: &FieldReport,
    ) -> Result<(), EntoforceError>;
}
