// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order creation, listing, status compare-and-set, and field reports.

use chrono::Utc;
use entoforce_core::{
    ClientId, EntoforceError, FieldReport, IntakeDetails, NewOrder, Order, OrderId, OrderStatus,
    TechnicianId,
};
use rusqlite::{params, OptionalExtension};

use crate::codec::{decode_status, decode_timestamp, encode_timestamp};
use crate::database::Database;

const ORDER_COLUMNS: &str = "id, client_id, technician_id, status, object_type, insect_quantity,
     has_experience, chemical_type, area, poison_type, insect_type, estimated_cost, created_at";

fn order_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    let status: String = row.get(3)?;
    let created_at: String = row.get(12)?;
    let report = match (
        row.get::<_, Option<String>>(7)?,
        row.get::<_, Option<String>>(8)?,
        row.get::<_, Option<String>>(9)?,
        row.get::<_, Option<String>>(10)?,
        row.get::<_, Option<String>>(11)?,
    ) {
        (
            Some(chemical_type),
            Some(area),
            Some(poison_type),
            Some(insect_type),
            Some(estimated_cost),
        ) => Some(FieldReport {
            chemical_type,
            area,
            poison_type,
            insect_type,
            estimated_cost,
        }),
        _ => None,
    };
    Ok(Order {
        id: OrderId(row.get(0)?),
        client_id: ClientId(row.get(1)?),
        technician_id: row.get::<_, Option<i64>>(2)?.map(TechnicianId),
        status: decode_status(3, &status)?,
        intake: IntakeDetails {
            object_type: row.get(4)?,
            insect_quantity: row.get(5)?,
            has_experience: row.get(6)?,
        },
        report,
        created_at: decode_timestamp(12, &created_at)?,
    })
}

/// Fetch one order inside an open connection or transaction.
pub(crate) fn load_order(
    conn: &rusqlite::Connection,
    id: OrderId,
) -> rusqlite::Result<Option<Order>> {
    conn.query_row(
        &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
        params![id.0],
        order_from_row,
    )
    .optional()
}

/// Insert an order with status `New`.
pub async fn create_order(db: &Database, new: &NewOrder) -> Result<Order, EntoforceError> {
    let new = new.clone();
    let created_at = Utc::now();
    let stamp = encode_timestamp(created_at);
    db.connection()
        .call(move |conn| -> Result<Order, rusqlite::Error> {
            conn.execute(
                "INSERT INTO orders (client_id, status, object_type, insect_quantity, has_experience, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    new.client_id.0,
                    OrderStatus::New.to_string(),
                    new.intake.object_type,
                    new.intake.insect_quantity,
                    new.intake.has_experience,
                    stamp,
                ],
            )?;
            Ok(Order {
                id: OrderId(conn.last_insert_rowid()),
                client_id: new.client_id,
                technician_id: None,
                status: OrderStatus::New,
                intake: new.intake,
                report: None,
                created_at,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_order(db: &Database, id: OrderId) -> Result<Option<Order>, EntoforceError> {
    db.connection()
        .call(move |conn| -> Result<Option<Order>, rusqlite::Error> { load_order(conn, id) })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List orders, optionally filtered by status, newest first.
pub async fn list_orders(
    db: &Database,
    status: Option<OrderStatus>,
) -> Result<Vec<Order>, EntoforceError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Order>, rusqlite::Error> {
            match status {
                Some(status) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {ORDER_COLUMNS} FROM orders WHERE status = ?1 ORDER BY id DESC"
                    ))?;
                    let rows = stmt.query_map(params![status.to_string()], order_from_row)?;
                    rows.collect()
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {ORDER_COLUMNS} FROM orders ORDER BY id DESC"
                    ))?;
                    let rows = stmt.query_map([], order_from_row)?;
                    rows.collect()
                }
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Move an order from `from` to `to` if it is still in `from`.
///
/// With `technician` set the order must also be bound to that technician.
/// The binding itself is left untouched; use the assignment queries to change it.
pub async fn transition_order(
    db: &Database,
    id: OrderId,
    technician: Option<TechnicianId>,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<bool, EntoforceError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let updated = conn.execute(
                "UPDATE orders SET status = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2 AND status = ?3 AND (?4 IS NULL OR technician_id = ?4)",
                params![to.to_string(), id.0, from.to_string(), technician.map(|t| t.0)],
            )?;
            Ok(updated == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Write the technician-collected fields onto an `InProgress` order.
pub async fn record_field_report(
    db: &Database,
    id: OrderId,
    technician_id: TechnicianId,
    report: &FieldReport,
) -> Result<(), EntoforceError> {
    let report = report.clone();
    let outcome = db
        .connection()
        .call(move |conn| -> Result<Result<(), Option<Order>>, rusqlite::Error> {
            let updated = conn.execute(
                "UPDATE orders SET chemical_type = ?1, area = ?2, poison_type = ?3,
                        insect_type = ?4, estimated_cost = ?5,
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?6 AND technician_id = ?7 AND status = 'in_progress'",
                params![
                    report.chemical_type,
                    report.area,
                    report.poison_type,
                    report.insect_type,
                    report.estimated_cost,
                    id.0,
                    technician_id.0,
                ],
            )?;
            if updated == 1 {
                Ok(Ok(()))
            } else {
                Ok(Err(load_order(conn, id)?))
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        Ok(()) => Ok(()),
        Err(None) => Err(EntoforceError::not_found("order", id)),
        Err(Some(order)) => Err(EntoforceError::InvalidTransition {
            order_id: id,
            status: order.status,
            action: "record a field report",
        }),
    }
}
