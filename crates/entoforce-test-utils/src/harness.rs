// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the whole dispatch stack around a mock gateway:
//! a temp SQLite repository (or the in-memory one), the coordinator, the
//! intake service and the event loop with both conversation engines.

use std::sync::Arc;

use entoforce_agent::{EventLoop, IntakeService, OrderRequest, Submission};
use entoforce_config::model::{DispatchConfig, EntoforceConfig, IntakeConfig, StorageConfig};
use entoforce_core::{
    ConversationKind, EntoforceError, EventPayload, InboundEvent, NewTechnician, Order, OrderId,
    PartyId, Repository, Technician, TechnicianId,
};
use entoforce_dispatch::Coordinator;
use entoforce_storage::SqliteRepository;

use crate::memory_repository::MemoryRepository;
use crate::mock_gateway::MockGateway;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    dispatch: DispatchConfig,
    intake: IntakeConfig,
    in_memory: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            intake: IntakeConfig::default(),
            in_memory: false,
        }
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_intake(mut self, intake: IntakeConfig) -> Self {
        self.intake = intake;
        self
    }

    /// Use [`MemoryRepository`] instead of a temp SQLite file.
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, EntoforceError> {
        let mut config = EntoforceConfig {
            dispatch: self.dispatch,
            intake: self.intake,
            ..EntoforceConfig::default()
        };

        let (repo, temp_dir): (Arc<dyn Repository>, Option<tempfile::TempDir>) = if self.in_memory
        {
            (Arc::new(MemoryRepository::new()), None)
        } else {
            let temp_dir = tempfile::TempDir::new().map_err(EntoforceError::storage)?;
            let db_path = temp_dir.path().join("test.db");
            config.storage = StorageConfig {
                database_path: db_path.to_string_lossy().to_string(),
                wal_mode: true,
            };
            (
                Arc::new(SqliteRepository::new(config.storage.clone())),
                Some(temp_dir),
            )
        };
        repo.initialize().await?;

        let gateway = Arc::new(MockGateway::new());
        let coordinator = Arc::new(Coordinator::new(
            Arc::clone(&repo),
            gateway.clone(),
            config.dispatch.clone(),
        ));
        let intake = Arc::new(IntakeService::new(
            Arc::clone(&coordinator),
            config.intake.clone(),
        ));
        let event_loop = Arc::new(EventLoop::new(
            gateway.clone(),
            Arc::clone(&coordinator),
            Arc::clone(&intake),
        ));

        Ok(TestHarness {
            gateway,
            repo,
            coordinator,
            intake,
            event_loop,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock gateway and temp storage.
pub struct TestHarness {
    /// The mock messaging gateway shared by both conversation kinds.
    pub gateway: Arc<MockGateway>,
    /// SQLite (temp DB, cleaned up on drop) or in-memory repository.
    pub repo: Arc<dyn Repository>,
    pub coordinator: Arc<Coordinator>,
    pub intake: Arc<IntakeService>,
    pub event_loop: Arc<EventLoop>,
    pub config: EntoforceConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default configuration and SQLite storage.
    pub async fn new() -> Result<Self, EntoforceError> {
        Self::builder().build().await
    }

    /// The chat address a technician named `name` is linked to.
    pub fn technician_address(name: &str) -> String {
        format!("tech-{name}")
    }

    /// The link token a technician named `name` is registered with.
    pub fn technician_token(name: &str) -> String {
        format!("token-{name}")
    }

    /// Register a technician without linking a chat address.
    pub async fn add_unlinked_technician(
        &self,
        name: &str,
        max_load: u32,
    ) -> Result<Technician, EntoforceError> {
        self.repo
            .create_technician(&NewTechnician {
                name: name.to_string(),
                channel_token: Self::technician_token(name),
                max_load,
            })
            .await
    }

    /// Register a technician and link them to [`technician_address`](Self::technician_address).
    pub async fn add_technician(
        &self,
        name: &str,
        max_load: u32,
    ) -> Result<Technician, EntoforceError> {
        let technician = self.add_unlinked_technician(name, max_load).await?;
        self.repo
            .link_technician(technician.id, &Self::technician_address(name))
            .await?;
        self.technician(technician.id).await
    }

    pub async fn technician(&self, id: TechnicianId) -> Result<Technician, EntoforceError> {
        self.repo
            .get_technician(id)
            .await?
            .ok_or_else(|| EntoforceError::not_found("technician", id))
    }

    pub async fn order(&self, id: OrderId) -> Result<Order, EntoforceError> {
        self.repo
            .get_order(id)
            .await?
            .ok_or_else(|| EntoforceError::not_found("order", id))
    }

    /// Feed a client event through the event loop and wait for it to be handled.
    pub async fn client_says(&self, party: &str, payload: EventPayload) {
        self.event_loop
            .on_event(InboundEvent::new(
                PartyId::new(party),
                ConversationKind::ClientIntake,
                payload,
            ))
            .await;
    }

    /// Feed a technician event through the event loop and wait for it to be handled.
    pub async fn technician_says(&self, party: &str, payload: EventPayload) {
        self.event_loop
            .on_event(InboundEvent::new(
                PartyId::new(party),
                ConversationKind::TechnicianIntake,
                payload,
            ))
            .await;
    }

    pub async fn submit(&self, request: OrderRequest) -> Result<Submission, EntoforceError> {
        self.intake.submit_order(request).await
    }

    /// A valid request: apartment, many insects, no prior experience.
    pub fn sample_request(phone: &str) -> OrderRequest {
        OrderRequest {
            client_name: "Anna".to_string(),
            phone: phone.to_string(),
            address: "12 Elm St".to_string(),
            object_type: "apartment".to_string(),
            insect_quantity: "many".to_string(),
            has_experience: false,
        }
    }
}
