// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Technician selection policy.

use std::collections::HashSet;

use entoforce_core::{Technician, TechnicianId};

/// Pick the technician who should receive the next offer.
///
/// Only eligible technicians (linked and below `max_load`) outside `exclude`
/// are considered. The one idle longest wins: never-assigned technicians come
/// first, then ascending `last_assigned`, with the ID breaking exact ties.
/// Returns `None` when nobody qualifies; that is a normal steady state.
pub fn select<'a>(
    pool: &'a [Technician],
    exclude: &HashSet<TechnicianId>,
) -> Option<&'a Technician> {
    pool.iter()
        .filter(|t| t.is_eligible() && !exclude.contains(&t.id))
        // `None < Some(_)`, so never-assigned technicians sort first.
        .min_by_key(|t| (t.last_assigned, t.id))
}
