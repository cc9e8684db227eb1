// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client lookup and lazy creation.

use entoforce_core::{Client, ClientContact, ClientId, EntoforceError};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;

fn client_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: ClientId(row.get(0)?),
        name: row.get(1)?,
        phone: row.get(2)?,
        address: row.get(3)?,
    })
}

/// Return the client owning `contact.phone`, inserting it first if absent.
///
/// An existing client keeps its stored name and address.
pub async fn find_or_create_by_phone(
    db: &Database,
    contact: &ClientContact,
) -> Result<Client, EntoforceError> {
    let contact = contact.clone();
    db.connection()
        .call(move |conn| -> Result<Client, rusqlite::Error> {
            conn.execute(
                "INSERT INTO clients (name, phone, address) VALUES (?1, ?2, ?3)
                 ON CONFLICT(phone) DO NOTHING",
                params![contact.name, contact.phone, contact.address],
            )?;
            conn.query_row(
                "SELECT id, name, phone, address FROM clients WHERE phone = ?1",
                params![contact.phone],
                client_from_row,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a client by ID.
pub async fn get_client(db: &Database, id: ClientId) -> Result<Option<Client>, EntoforceError> {
    db.connection()
        .call(move |conn| -> Result<Option<Client>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, name, phone, address FROM clients WHERE id = ?1",
                params![id.0],
                client_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
