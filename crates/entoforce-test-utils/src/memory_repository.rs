// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `Repository` for tests that do not need SQLite.
//!
//! Every call takes one async mutex over the whole state, so reserve and
//! release are as atomic here as the SQLite transactions they mirror.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use entoforce_core::{
    AdapterType, Client, ClientContact, ClientId, EntoforceError, FieldReport, HealthStatus,
    NewOrder, NewTechnician, Order, OrderId, OrderStatus, PluginAdapter, Repository, Technician,
    TechnicianId,
};

#[derive(Default)]
struct State {
    technicians: BTreeMap<TechnicianId, Technician>,
    clients: BTreeMap<ClientId, Client>,
    orders: BTreeMap<OrderId, Order>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn order_error(&self, order_id: OrderId, action: &'static str) -> EntoforceError {
        match self.orders.get(&order_id) {
            Some(order) => EntoforceError::InvalidTransition {
                order_id,
                status: order.status,
                action,
            },
            None => EntoforceError::not_found("order", order_id),
        }
    }
}

fn unique_violation(what: &str) -> EntoforceError {
    EntoforceError::storage(format!("UNIQUE constraint failed: {what}"))
}

/// A `Repository` held entirely in process memory.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginAdapter for MemoryRepository {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Repository
    }

    async fn health_check(&self) -> Result<HealthStatus, EntoforceError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), EntoforceError> {
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn initialize(&self) -> Result<(), EntoforceError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), EntoforceError> {
        Ok(())
    }

    async fn create_technician(&self, new: &NewTechnician) -> Result<Technician, EntoforceError> {
        let mut state = self.state.lock().await;
        if state
            .technicians
            .values()
            .any(|t| t.channel_token.as_deref() == Some(new.channel_token.as_str()))
        {
            return Err(unique_violation("technicians.channel_token"));
        }
        let technician = Technician {
            id: TechnicianId(state.next_id()),
            name: new.name.clone(),
            channel_token: Some(new.channel_token.clone()),
            channel_address: None,
            load: 0,
            max_load: new.max_load,
            last_assigned: None,
        };
        state.technicians.insert(technician.id, technician.clone());
        Ok(technician)
    }

    async fn get_technician(
        &self,
        id: TechnicianId,
    ) -> Result<Option<Technician>, EntoforceError> {
        Ok(self.state.lock().await.technicians.get(&id).cloned())
    }

    async fn list_technicians(&self) -> Result<Vec<Technician>, EntoforceError> {
        Ok(self.state.lock().await.technicians.values().cloned().collect())
    }

    async fn find_technician_by_token(
        &self,
        token: &str,
    ) -> Result<Option<Technician>, EntoforceError> {
        let state = self.state.lock().await;
        Ok(state
            .technicians
            .values()
            .find(|t| t.channel_token.as_deref() == Some(token))
            .cloned())
    }

    async fn find_technician_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Technician>, EntoforceError> {
        let state = self.state.lock().await;
        Ok(state
            .technicians
            .values()
            .find(|t| t.channel_address.as_deref() == Some(address))
            .cloned())
    }

    async fn link_technician(
        &self,
        id: TechnicianId,
        address: &str,
    ) -> Result<(), EntoforceError> {
        let mut state = self.state.lock().await;
        if state
            .technicians
            .values()
            .any(|t| t.id != id && t.channel_address.as_deref() == Some(address))
        {
            return Err(unique_violation("technicians.channel_address"));
        }
        let technician = state
            .technicians
            .get_mut(&id)
            .ok_or_else(|| EntoforceError::not_found("technician", id))?;
        technician.channel_address = Some(address.to_string());
        Ok(())
    }

    async fn find_technicians_eligible(&self) -> Result<Vec<Technician>, EntoforceError> {
        let state = self.state.lock().await;
        let mut eligible: Vec<Technician> = state
            .technicians
            .values()
            .filter(|t| t.is_eligible())
            .cloned()
            .collect();
        eligible.sort_by_key(|t| (t.last_assigned.is_some(), t.last_assigned, t.id));
        Ok(eligible)
    }

    async fn reserve_technician(
        &self,
        technician_id: TechnicianId,
        order_id: OrderId,
        at: DateTime<Utc>,
    ) -> Result<(), EntoforceError> {
        let mut state = self.state.lock().await;

        let has_capacity = state
            .technicians
            .get(&technician_id)
            .is_some_and(Technician::is_eligible);
        if !has_capacity {
            return Err(EntoforceError::ReservationConflict { technician_id });
        }

        let order_free = state
            .orders
            .get(&order_id)
            .is_some_and(|o| o.technician_id.is_none() && o.status.is_assignable());
        if !order_free {
            return Err(state.order_error(order_id, "be offered"));
        }

        if let Some(technician) = state.technicians.get_mut(&technician_id) {
            technician.load += 1;
            technician.last_assigned = Some(at);
        }
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.technician_id = Some(technician_id);
            order.status = OrderStatus::Offered;
        }
        Ok(())
    }

    async fn release_technician(
        &self,
        technician_id: TechnicianId,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<(), EntoforceError> {
        let mut state = self.state.lock().await;

        let held = state.orders.get(&order_id).is_some_and(|o| {
            o.technician_id == Some(technician_id) && o.status.holds_technician()
        });
        if !held {
            return Err(state.order_error(order_id, "be released"));
        }

        if let Some(order) = state.orders.get_mut(&order_id) {
            order.status = next;
            if next != OrderStatus::Completed {
                order.technician_id = None;
            }
        }
        if let Some(technician) = state.technicians.get_mut(&technician_id) {
            technician.load = technician.load.saturating_sub(1);
        }
        Ok(())
    }

    async fn find_or_create_client_by_phone(
        &self,
        contact: &ClientContact,
    ) -> Result<Client, EntoforceError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.clients.values().find(|c| c.phone == contact.phone) {
            return Ok(existing.clone());
        }
        let client = Client {
            id: ClientId(state.next_id()),
            name: contact.name.clone(),
            phone: contact.phone.clone(),
            address: contact.address.clone(),
        };
        state.clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn get_client(&self, id: ClientId) -> Result<Option<Client>, EntoforceError> {
        Ok(self.state.lock().await.clients.get(&id).cloned())
    }

    async fn create_order(&self, new: &NewOrder) -> Result<Order, EntoforceError> {
        let mut state = self.state.lock().await;
        if !state.clients.contains_key(&new.client_id) {
            return Err(EntoforceError::storage("FOREIGN KEY constraint failed"));
        }
        let order = Order {
            id: OrderId(state.next_id()),
            client_id: new.client_id,
            technician_id: None,
            status: OrderStatus::New,
            intake: new.intake.clone(),
            report: None,
            created_at: Utc::now(),
        };
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, EntoforceError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, EntoforceError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect())
    }

    async fn transition_order(
        &self,
        id: OrderId,
        technician: Option<TechnicianId>,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, EntoforceError> {
        let mut state = self.state.lock().await;
        let Some(order) = state.orders.get_mut(&id) else {
            return Ok(false);
        };
        if order.status != from || technician.is_some_and(|t| order.technician_id != Some(t)) {
            return Ok(false);
        }
        order.status = to;
        Ok(true)
    }

    async fn record_field_report(
        &self,
        id: OrderId,
        technician_id: TechnicianId,
        report: &FieldReport,
    ) -> Result<(), EntoforceError> {
        let mut state = self.state.lock().await;
        match state.orders.get_mut(&id) {
            Some(order)
                if order.status == OrderStatus::InProgress
                    && order.technician_id == Some(technician_id) =>
            {
                order.report = Some(report.clone());
                Ok(())
            }
            _ => Err(state.order_error(id, "record a field report")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entoforce_core::IntakeDetails;

    async fn linked(repo: &MemoryRepository, name: &str, max_load: u32) -> Technician {
        let tech = repo
            .create_technician(&NewTechnician {
                name: name.into(),
                channel_token: format!("tok-{name}"),
                max_load,
            })
            .await
            .unwrap();
        repo.link_technician(tech.id, &format!("chat-{name}"))
            .await
            .unwrap();
        repo.get_technician(tech.id).await.unwrap().unwrap()
    }

    async fn order(repo: &MemoryRepository) -> Order {
        let client = repo
            .find_or_create_client_by_phone(&ClientContact {
                name: "Anna".into(),
                phone: "5551234567".into(),
                address: "12 Elm St".into(),
            })
            .await
            .unwrap();
        repo.create_order(&NewOrder {
            client_id: client.id,
            intake: IntakeDetails {
                object_type: "apartment".into(),
                insect_quantity: "many".into(),
                has_experience: false,
            },
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn reserve_and_release_move_load_with_binding() {
        let repo = MemoryRepository::new();
        let tech = linked(&repo, "ivan", 1).await;
        let order = order(&repo).await;

        repo.reserve_technician(tech.id, order.id, Utc::now())
            .await
            .unwrap();
        let held = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(held.status, OrderStatus::Offered);
        assert_eq!(held.technician_id, Some(tech.id));
        assert_eq!(repo.get_technician(tech.id).await.unwrap().unwrap().load, 1);
        assert!(repo.find_technicians_eligible().await.unwrap().is_empty());

        repo.release_technician(tech.id, order.id, OrderStatus::New)
            .await
            .unwrap();
        let freed = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(freed.status, OrderStatus::New);
        assert_eq!(freed.technician_id, None);
        assert_eq!(repo.get_technician(tech.id).await.unwrap().unwrap().load, 0);
    }

    #[tokio::test]
    async fn full_technician_is_a_reservation_conflict() {
        let repo = MemoryRepository::new();
        let tech = linked(&repo, "ivan", 1).await;
        let first = order(&repo).await;
        let second = order(&repo).await;

        repo.reserve_technician(tech.id, first.id, Utc::now())
            .await
            .unwrap();
        let err = repo
            .reserve_technician(tech.id, second.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EntoforceError::ReservationConflict { .. }));
        let untouched = repo.get_order(second.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, OrderStatus::New);
    }

    #[tokio::test]
    async fn bound_order_rejects_second_reservation_without_touching_load() {
        let repo = MemoryRepository::new();
        let a = linked(&repo, "a", 2).await;
        let b = linked(&repo, "b", 2).await;
        let order = order(&repo).await;

        repo.reserve_technician(a.id, order.id, Utc::now())
            .await
            .unwrap();
        let err = repo
            .reserve_technician(b.id, order.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EntoforceError::InvalidTransition {
                status: OrderStatus::Offered,
                ..
            }
        ));
        assert_eq!(repo.get_technician(b.id).await.unwrap().unwrap().load, 0);
    }

    #[tokio::test]
    async fn completion_keeps_technician_on_record() {
        let repo = MemoryRepository::new();
        let tech = linked(&repo, "ivan", 2).await;
        let order = order(&repo).await;
        repo.reserve_technician(tech.id, order.id, Utc::now())
            .await
            .unwrap();
        assert!(
            repo.transition_order(
                order.id,
                Some(tech.id),
                OrderStatus::Offered,
                OrderStatus::InProgress
            )
            .await
            .unwrap()
        );

        repo.release_technician(tech.id, order.id, OrderStatus::Completed)
            .await
            .unwrap();
        let done = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(done.status, OrderStatus::Completed);
        assert_eq!(done.technician_id, Some(tech.id));
        assert_eq!(repo.get_technician(tech.id).await.unwrap().unwrap().load, 0);
    }

    #[tokio::test]
    async fn eligible_orders_never_assigned_first() {
        let repo = MemoryRepository::new();
        let a = linked(&repo, "a", 3).await;
        let b = linked(&repo, "b", 3).await;
        let order = order(&repo).await;
        repo.reserve_technician(a.id, order.id, Utc::now())
            .await
            .unwrap();

        let pool = repo.find_technicians_eligible().await.unwrap();
        assert_eq!(pool[0].id, b.id);
        assert_eq!(pool[1].id, a.id);
    }

    #[tokio::test]
    async fn address_cannot_be_linked_twice() {
        let repo = MemoryRepository::new();
        linked(&repo, "a", 1).await;
        let b = repo
            .create_technician(&NewTechnician {
                name: "b".into(),
                channel_token: "tok-b".into(),
                max_load: 1,
            })
            .await
            .unwrap();
        let err = repo.link_technician(b.id, "chat-a").await.unwrap_err();
        assert!(matches!(err, EntoforceError::Storage { .. }));
    }

    #[tokio::test]
    async fn same_phone_returns_existing_client() {
        let repo = MemoryRepository::new();
        let first = order(&repo).await;
        let second = order(&repo).await;
        assert_eq!(first.client_id, second.client_id);
        assert_eq!(repo.list_orders(None).await.unwrap()[0].id, second.id);
        assert_eq!(
            repo.list_orders(Some(OrderStatus::Offered))
                .await
                .unwrap()
                .len(),
            0
        );
    }
}
