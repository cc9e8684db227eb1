// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Technician registration, lookup, and channel linking.

use entoforce_core::{EntoforceError, NewTechnician, Technician, TechnicianId};
use rusqlite::{params, OptionalExtension};

use crate::codec::{technician_from_row, TECHNICIAN_COLUMNS};
use crate::database::Database;

/// Register a technician with zero load.
pub async fn create_technician(
    db: &Database,
    new: &NewTechnician,
) -> Result<Technician, EntoforceError> {
    let new = new.clone();
    db.connection()
        .call(move |conn| -> Result<Technician, rusqlite::Error> {
            conn.execute(
                "INSERT INTO technicians (name, channel_token, max_load) VALUES (?1, ?2, ?3)",
                params![new.name, new.channel_token, new.max_load],
            )?;
            Ok(Technician {
                id: TechnicianId(conn.last_insert_rowid()),
                name: new.name,
                channel_token: Some(new.channel_token),
                channel_address: None,
                load: 0,
                max_load: new.max_load,
                last_assigned: None,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

async fn find_one(
    db: &Database,
    filter: &'static str,
    value: rusqlite::types::Value,
) -> Result<Option<Technician>, EntoforceError> {
    db.connection()
        .call(move |conn| -> Result<Option<Technician>, rusqlite::Error> {
            let sql = format!("SELECT {TECHNICIAN_COLUMNS} FROM technicians WHERE {filter} = ?1");
            conn.query_row(&sql, params![value], technician_from_row)
                .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_technician(
    db: &Database,
    id: TechnicianId,
) -> Result<Option<Technician>, EntoforceError> {
    find_one(db, "id", id.0.into()).await
}

pub async fn find_by_token(
    db: &Database,
    token: &str,
) -> Result<Option<Technician>, EntoforceError> {
    find_one(db, "channel_token", token.to_string().into()).await
}

pub async fn find_by_address(
    db: &Database,
    address: &str,
) -> Result<Option<Technician>, EntoforceError> {
    find_one(db, "channel_address", address.to_string().into()).await
}

/// List every technician ordered by ID.
pub async fn list_technicians(db: &Database) -> Result<Vec<Technician>, EntoforceError> {
    db.connection()
        .call(|conn| -> Result<Vec<Technician>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TECHNICIAN_COLUMNS} FROM technicians ORDER BY id"
            ))?;
            let rows = stmt.query_map([], technician_from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Linked technicians with spare capacity, least recently assigned first.
pub async fn find_eligible(db: &Database) -> Result<Vec<Technician>, EntoforceError> {
    db.connection()
        .call(|conn| -> Result<Vec<Technician>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TECHNICIAN_COLUMNS} FROM technicians
                 WHERE channel_token IS NOT NULL
                   AND channel_address IS NOT NULL
                   AND load < max_load
                 ORDER BY last_assigned IS NOT NULL, last_assigned, id"
            ))?;
            let rows = stmt.query_map([], technician_from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Bind a messaging address to a technician. Returns false if the technician does not exist.
///
/// Fails with a storage error if another technician already owns `address`.
pub async fn link_technician(
    db: &Database,
    id: TechnicianId,
    address: &str,
) -> Result<bool, EntoforceError> {
    let address = address.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let updated = conn.execute(
                "UPDATE technicians SET channel_address = ?1 WHERE id = ?2",
                params![address, id.0],
            )?;
            Ok(updated == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn new_tech(name: &str, token: &str) -> NewTechnician {
        NewTechnician {
            name: name.to_string(),
            channel_token: token.to_string(),
            max_load: 3,
        }
    }

    #[tokio::test]
    async fn created_technician_is_unlinked_and_ineligible() {
        let (db, _dir) = setup_db().await;
        let tech = create_technician(&db, &new_tech("Ivan", "tok-1")).await.unwrap();
        assert!(!tech.is_linked());
        assert_eq!(get_technician(&db, tech.id).await.unwrap(), Some(tech.clone()));
        assert!(find_eligible(&db).await.unwrap().is_empty());
        assert_eq!(find_by_token(&db, "tok-1").await.unwrap(), Some(tech));
    }

    #[tokio::test]
    async fn linking_makes_technician_eligible() {
        let (db, _dir) = setup_db().await;
        let tech = create_technician(&db, &new_tech("Ivan", "tok-1")).await.unwrap();
        assert!(link_technician(&db, tech.id, "chat-100").await.unwrap());

        let found = find_by_address(&db, "chat-100").await.unwrap().unwrap();
        assert_eq!(found.id, tech.id);
        assert_eq!(find_eligible(&db).await.unwrap().len(), 1);
        assert!(!link_technician(&db, TechnicianId(404), "chat-1").await.unwrap());
    }

    #[tokio::test]
    async fn address_cannot_be_shared() {
        let (db, _dir) = setup_db().await;
        let a = create_technician(&db, &new_tech("A", "tok-a")).await.unwrap();
        let b = create_technician(&db, &new_tech("B", "tok-b")).await.unwrap();
        link_technician(&db, a.id, "chat-1").await.unwrap();
        let err = link_technician(&db, b.id, "chat-1").await.unwrap_err();
        assert!(matches!(err, EntoforceError::Storage { .. }));
    }

    #[tokio::test]
    async fn duplicate_token_is_rejected() {
        let (db, _dir) = setup_db().await;
        create_technician(&db, &new_tech("A", "same")).await.unwrap();
        assert!(create_technician(&db, &new_tech("B", "same")).await.is_err());
    }

    #[tokio::test]
    async fn eligible_list_puts_never_assigned_first() {
        let (db, _dir) = setup_db().await;
        for (name, token) in [("A", "a"), ("B", "b")] {
            let t = create_technician(&db, &new_tech(name, token)).await.unwrap();
            link_technician(&db, t.id, &format!("chat-{token}")).await.unwrap();
        }
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE technicians SET last_assigned = '2026-01-01T00:00:00.000000Z' WHERE name = 'A'",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let eligible = find_eligible(&db).await.unwrap();
        let names: Vec<_> = eligible.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }
}
