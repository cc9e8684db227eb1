// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversations and intake for the Entoforce dispatch service.
//!
//! The [`EventLoop`] pulls events from the messaging gateway and hands each
//! to the [`ConversationEngine`] for its kind. The engine runs one task per
//! party and drives a [`ConversationFlow`]: client intake, which ends in
//! [`IntakeService::submit_order`], or the technician side, which links
//! accounts, answers offer buttons and collects the field report.

pub mod channel_mux;
pub mod client_intake;
pub mod engine;
pub mod event_loop;
pub mod flow;
pub mod intake;
pub mod options;
pub mod shutdown;
pub mod technician_intake;
pub mod validate;

pub use channel_mux::GatewayMultiplexer;
pub use client_intake::{ClientIntake, ClientIntakeFlow};
pub use engine::ConversationEngine;
pub use event_loop::EventLoop;
pub use flow::{ConversationFlow, Intercepted, Prompt, Takeover, Transition};
pub use intake::{IntakeService, OrderRequest, Submission};
pub use shutdown::install_signal_handler;
pub use technician_intake::{CompletedReport, Job, TechnicianIntake, TechnicianIntakeFlow};
