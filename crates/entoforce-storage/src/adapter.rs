// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `Repository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use entoforce_config::model::StorageConfig;
use entoforce_core::{
    AdapterType, Client, ClientContact, ClientId, EntoforceError, FieldReport, HealthStatus,
    NewOrder, NewTechnician, Order, OrderId, OrderStatus, PluginAdapter, Repository, Technician,
    TechnicianId,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed repository.
///
/// The database is opened lazily by [`Repository::initialize`]; every other
/// call fails with a storage error until then.
pub struct SqliteRepository {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteRepository {
    /// Create a repository for the configured database path without opening it.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, EntoforceError> {
        self.db.get().ok_or_else(|| EntoforceError::Storage {
            source: "repository not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteRepository {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Repository
    }

    async fn health_check(&self) -> Result<HealthStatus, EntoforceError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), EntoforceError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn initialize(&self) -> Result<(), EntoforceError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| EntoforceError::Storage {
            source: "repository already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite repository initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), EntoforceError> {
        self.db()?.close().await
    }

    // --- Technicians ---

    async fn create_technician(&self, new: &NewTechnician) -> Result<Technician, EntoforceError> {
        queries::technicians::create_technician(self.db()?, new).await
    }

    async fn get_technician(
        &self,
        id: TechnicianId,
    ) -> Result<Option<Technician>, EntoforceError> {
        queries::technicians::get_technician(self.db()?, id).await
    }

    async fn list_technicians(&self) -> Result<Vec<Technician>, EntoforceError> {
        queries::technicians::list_technicians(self.db()?).await
    }

    async fn find_technician_by_token(
        &self,
        token: &str,
    ) -> Result<Option<Technician>, EntoforceError> {
        queries::technicians::find_by_token(self.db()?, token).await
    }

    async fn find_technician_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Technician>, EntoforceError> {
        queries::technicians::find_by_address(self.db()?, address).await
    }

    async fn link_technician(
        &self,
        id: TechnicianId,
        address: &str,
    ) -> Result<(), EntoforceError> {
        if queries::technicians::link_technician(self.db()?, id, address).await? {
            Ok(())
        } else {
            Err(EntoforceError::not_found("technician", id))
        }
    }

    async fn find_technicians_eligible(&self) -> Result<Vec<Technician>, EntoforceError> {
        queries::technicians::find_eligible(self.db()?).await
    }

    async fn reserve_technician(
        &self,
        technician_id: TechnicianId,
        order_id: OrderId,
        at: DateTime<Utc>,
    ) -> Result<(), EntoforceError> {
        queries::assignments::reserve(self.db()?, technician_id, order_id, at).await
    }

    async fn release_technician(
        &self,
        technician_id: TechnicianId,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<(), EntoforceError> {
        queries::assignments::release(self.db()?, technician_id, order_id, next).await
    }

    // --- Clients ---

    async fn find_or_create_client_by_phone(
        &self,
        contact: &ClientContact,
    ) -> Result<Client, EntoforceError> {
        queries::clients::find_or_create_by_phone(self.db()?, contact).await
    }

    async fn get_client(&self, id: ClientId) -> Result<Option<Client>, EntoforceError> {
        queries::clients::get_client(self.db()?, id).await
    }

    // --- Orders ---

    async fn create_order(&self, new: &NewOrder) -> Result<Order, EntoforceError> {
        queries::orders::create_order(self.db()?, new).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, EntoforceError> {
        queries::orders::get_order(self.db()?, id).await
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, EntoforceError> {
        queries::orders::list_orders(self.db()?, status).await
    }

    async fn transition_order(
        &self,
        id: OrderId,
        technician: Option<TechnicianId>,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, EntoforceError> {
        queries::orders::transition_order(self.db()?, id, technician, from, to).await
    }

    async fn record_field_report(
        &self,
        id: OrderId,
        technician_id: TechnicianId,
        report: &FieldReport,
    ) -> Result<(), EntoforceError> {
        queries::orders::record_field_report(self.db()?, id, technician_id, report).await
    }
}
