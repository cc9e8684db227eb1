// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Entoforce dispatch service.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed queries over clients,
//! technicians, and orders. The capacity-touching operations live in
//! [`queries::assignments`] and run as one transaction each.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

mod codec;

pub use adapter::SqliteRepository;
pub use database::Database;
