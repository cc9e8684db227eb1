// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP intake surface for the Entoforce dispatch service.
//!
//! Orders created over HTTP go through the same
//! [`IntakeService`](entoforce_agent::IntakeService) as the chat intake, and
//! the dispatch triggers call the same coordinator the technician bot uses.

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{ApiState, ServerConfig, router, start_server};
