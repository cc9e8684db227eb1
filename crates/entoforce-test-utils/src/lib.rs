// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Entoforce integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without Telegram or a real database.
//!
//! # Components
//!
//! - [`MockGateway`] - Messaging gateway with event injection, capture and failure injection
//! - [`MemoryRepository`] - In-memory repository with the same atomicity as SQLite
//! - [`TestHarness`] - The assembled stack

pub mod harness;
pub mod memory_repository;
pub mod mock_gateway;

pub use harness::TestHarness;
pub use memory_repository::MemoryRepository;
pub use mock_gateway::MockGateway;
