// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch engine for Entoforce.
//!
//! [`select`] is the pure ranking policy: linked technicians below their
//! `max_load`, least recently assigned first. [`Coordinator`] drives one
//! order at a time through reservation, offer, and the accept, decline or
//! timeout reply, with all capacity changes going through the repository's
//! transactional reserve/release calls.

pub mod action;
pub mod coordinator;
pub mod selector;

pub use action::OfferAction;
pub use coordinator::{AcceptOutcome, AssignOutcome, Coordinator, DeclineOutcome};
pub use selector::select;
