// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each function takes `&Database` and runs on the writer thread.

pub mod assignments;
pub mod clients;
pub mod orders;
pub mod technicians;
