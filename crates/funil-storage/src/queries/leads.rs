// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead CRUD operations.

use funil_core::FunilError;
use funil_core::time::now_iso;
use rusqlite::params;

use crate::database::Database;
use crate::models::Lead;

pub(crate) const LEAD_COLUMNS: &str =
    "id, phone, name, email, profile, crm_id, origin, created_at, updated_at";

pub(crate) fn lead_from_row(row: &rusqlite::Row<'_>) -> Result<Lead, rusqlite::Error> {
    Ok(Lead {
        id: row.get(0)?,
        phone: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        profile: row.get(4)?,
        crm_id: row.get(5)?,
        origin: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Get a lead by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Lead>, FunilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"))?;
            match stmt.query_row(params![id], lead_from_row) {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a lead by phone number.
pub async fn get_by_phone(db: &Database, phone: &str) -> Result<Option<Lead>, FunilError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE phone = ?1"))?;
            match stmt.query_row(params![phone], lead_from_row) {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the external CRM id on a lead. Set-once: a lead that already has a
/// CRM id is left untouched. Returns whether the id was written.
pub async fn set_crm_id(db: &Database, lead_id: &str, crm_id: &str) -> Result<bool, FunilError> {
    let lead_id = lead_id.to_string();
    let crm_id = crm_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE leads SET crm_id = ?1, updated_at = ?2
                 WHERE id = ?3 AND crm_id IS NULL",
                params![crm_id, now_iso(), lead_id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Replace the free-form profile JSON on a lead.
pub async fn update_profile(
    db: &Database,
    lead_id: &str,
    profile_json: &str,
) -> Result<(), FunilError> {
    let lead_id = lead_id.to_string();
    let profile_json = profile_json.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE leads SET profile = ?1, updated_at = ?2 WHERE id = ?3",
                params![profile_json, now_iso(), lead_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::conversations;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn lead_created_with_conversation_is_queryable() {
        let (db, _dir) = setup_db().await;
        let lookup = conversations::get_or_create(&db, "5583999990001", Some("Maria"))
            .await
            .unwrap();

        let by_phone = get_by_phone(&db, "5583999990001").await.unwrap().unwrap();
        assert_eq!(by_phone.id, lookup.lead.id);
        assert_eq!(by_phone.name.as_deref(), Some("Maria"));
        assert_eq!(by_phone.origin, "whatsapp");

        let by_id = get(&db, &lookup.lead.id).await.unwrap().unwrap();
        assert_eq!(by_id.phone, "5583999990001");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_unknown_phone_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_by_phone(&db, "5500000000000").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn crm_id_is_set_once() {
        let (db, _dir) = setup_db().await;
        let lookup = conversations::get_or_create(&db, "5583999990002", None)
            .await
            .unwrap();

        assert!(set_crm_id(&db, &lookup.lead.id, "dc-123").await.unwrap());
        // Second write is refused.
        assert!(!set_crm_id(&db, &lookup.lead.id, "dc-456").await.unwrap());

        let lead = get(&db, &lookup.lead.id).await.unwrap().unwrap();
        assert_eq!(lead.crm_id.as_deref(), Some("dc-123"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_profile_replaces_json() {
        let (db, _dir) = setup_db().await;
        let lookup = conversations::get_or_create(&db, "5583999990003", None)
            .await
            .unwrap();

        update_profile(&db, &lookup.lead.id, r#"{"interest":"direito"}"#)
            .await
            .unwrap();

        let lead = get(&db, &lookup.lead.id).await.unwrap().unwrap();
        assert_eq!(lead.profile.as_deref(), Some(r#"{"interest":"direito"}"#));

        db.close().await.unwrap();
    }
}
