// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reservation and release of technician capacity.
//!
//! These are the only queries that touch both a technician's `load` and an
//! order's binding, so each runs as a single transaction: either the load
//! counter and the order move together or neither changes.

use chrono::{DateTime, Utc};
use entoforce_core::{EntoforceError, OrderId, OrderStatus, TechnicianId};
use rusqlite::params;
use tracing::debug;

use crate::codec::encode_timestamp;
use crate::database::Database;
use crate::queries::orders::load_order;

/// Why a transaction was rolled back.
enum Rejected {
    NoCapacity,
    OrderMissing,
    OrderUnavailable(OrderStatus),
}

impl Rejected {
    fn into_error(
        self,
        technician_id: TechnicianId,
        order_id: OrderId,
        action: &'static str,
    ) -> EntoforceError {
        match self {
            Rejected::NoCapacity => EntoforceError::ReservationConflict { technician_id },
            Rejected::OrderMissing => EntoforceError::not_found("order", order_id),
            Rejected::OrderUnavailable(status) => EntoforceError::InvalidTransition {
                order_id,
                status,
                action,
            },
        }
    }
}

fn order_rejection(conn: &rusqlite::Connection, order_id: OrderId) -> rusqlite::Result<Rejected> {
    Ok(match load_order(conn, order_id)? {
        Some(order) => Rejected::OrderUnavailable(order.status),
        None => Rejected::OrderMissing,
    })
}

/// Take one unit of the technician's capacity and offer the order to them.
pub async fn reserve(
    db: &Database,
    technician_id: TechnicianId,
    order_id: OrderId,
    at: DateTime<Utc>,
) -> Result<(), EntoforceError> {
    let stamp = encode_timestamp(at);
    let outcome = db
        .connection()
        .call(move |conn| -> Result<Result<(), Rejected>, rusqlite::Error> {
            let tx = conn.transaction()?;

            let reserved = tx.execute(
                "UPDATE technicians SET load = load + 1, last_assigned = ?1
                 WHERE id = ?2
                   AND load < max_load
                   AND channel_token IS NOT NULL
                   AND channel_address IS NOT NULL",
                params![stamp, technician_id.0],
            )?;
            if reserved == 0 {
                // Dropping `tx` rolls back.
                return Ok(Err(Rejected::NoCapacity));
            }

            let bound = tx.execute(
                "UPDATE orders SET technician_id = ?1, status = 'offered',
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2
                   AND technician_id IS NULL
                   AND status IN ('new', 'unassigned', 'declined')",
                params![technician_id.0, order_id.0],
            )?;
            if bound == 0 {
                let rejected = order_rejection(&tx, order_id)?;
                tx.rollback()?;
                return Ok(Err(rejected));
            }

            tx.commit()?;
            Ok(Ok(()))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        Ok(()) => {
            debug!(%technician_id, %order_id, "technician reserved");
            Ok(())
        }
        Err(rejected) => Err(rejected.into_error(technician_id, order_id, "be offered")),
    }
}

/// Give back one unit of capacity and move the order to `next`.
///
/// The binding is cleared unless `next` is `Completed`.
pub async fn release(
    db: &Database,
    technician_id: TechnicianId,
    order_id: OrderId,
    next: OrderStatus,
) -> Result<(), EntoforceError> {
    let keep_binding = next == OrderStatus::Completed;
    let outcome = db
        .connection()
        .call(move |conn| -> Result<Result<(), Rejected>, rusqlite::Error> {
            let tx = conn.transaction()?;

            let released = tx.execute(
                "UPDATE orders SET status = ?1,
                        technician_id = CASE WHEN ?2 THEN technician_id ELSE NULL END,
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3
                   AND technician_id = ?4
                   AND status IN ('offered', 'in_progress')",
                params![next.to_string(), keep_binding, order_id.0, technician_id.0],
            )?;
            if released == 0 {
                let rejected = order_rejection(&tx, order_id)?;
                tx.rollback()?;
                return Ok(Err(rejected));
            }

            tx.execute(
                "UPDATE technicians SET load = MAX(load - 1, 0) WHERE id = ?1",
                params![technician_id.0],
            )?;
            tx.commit()?;
            Ok(Ok(()))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        Ok(()) => {
            debug!(%technician_id, %order_id, next = %next, "technician released");
            Ok(())
        }
        Err(rejected) => Err(rejected.into_error(technician_id, order_id, "be released")),
    }
}
