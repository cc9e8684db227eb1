// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Column encoding shared by the query modules.

use chrono::{DateTime, Utc};
use entoforce_core::{OrderStatus, TechnicianId, Technician};
use rusqlite::types::Type;

/// Fixed-width UTC timestamps so lexical order matches chronological order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub(crate) fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn decode_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn decode_status(idx: usize, raw: &str) -> rusqlite::Result<OrderStatus> {
    raw.parse::<OrderStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) const TECHNICIAN_COLUMNS: &str =
    "id, name, channel_token, channel_address, load, max_load, last_assigned";

pub(crate) fn technician_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Technician> {
    let last_assigned: Option<String> = row.get(6)?;
    Ok(Technician {
        id: TechnicianId(row.get(0)?),
        name: row.get(1)?,
        channel_token: row.get(2)?,
        channel_address: row.get(3)?,
        load: row.get(4)?,
        max_load: row.get(5)?,
        last_assigned: last_assigned
            .as_deref()
            .map(|raw| decode_timestamp(6, raw))
            .transpose()?,
    })
}
