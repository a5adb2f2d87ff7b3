// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up row operations.
//!
//! Terminal transitions (`sent`, `cancelled`) are guarded UPDATEs on
//! `status = 'pending'`, so a duplicate sweep touching the same due row is a
//! safe no-op — the second writer sees zero affected rows and backs off.

use funil_core::FunilError;
use funil_core::time::now_iso;
use funil_core::types::{Followup, FollowupKind, FollowupStatus};
use rusqlite::params;

use crate::database::Database;
use crate::queries::parse_col;

const FOLLOWUP_COLUMNS: &str =
    "id, conversation_id, kind, scheduled_for, status, message, created_at, executed_at";

fn followup_from_row(row: &rusqlite::Row<'_>) -> Result<Followup, rusqlite::Error> {
    Ok(Followup {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        kind: parse_col(2, row.get::<_, String>(2)?)?,
        scheduled_for: row.get(3)?,
        status: parse_col(4, row.get::<_, String>(4)?)?,
        message: row.get(5)?,
        created_at: row.get(6)?,
        executed_at: row.get(7)?,
    })
}

/// A follow-up row to be created as part of a batch.
#[derive(Debug, Clone)]
pub struct NewFollowup {
    pub kind: FollowupKind,
    pub scheduled_for: String,
    pub message: String,
}

/// Insert a follow-up batch for a conversation, idempotently.
///
/// If any non-cancelled follow-up already exists for the conversation the
/// call is a no-op and returns `false`: calling twice without an intervening
/// cancellation never duplicates rows.
pub async fn insert_batch(
    db: &Database,
    conversation_id: &str,
    rows: Vec<NewFollowup>,
) -> Result<bool, FunilError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let existing: i64 = tx.query_row(
                "SELECT COUNT(*) FROM followups
                 WHERE conversation_id = ?1 AND status != 'cancelled'",
                params![conversation_id],
                |row| row.get(0),
            )?;
            if existing > 0 {
                tx.commit()?;
                return Ok(false);
            }
            let now = now_iso();
            for row in &rows {
                tx.execute(
                    "INSERT INTO followups (id, conversation_id, kind, scheduled_for, status, message, created_at)
                     VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6)",
                    params![
                        uuid::Uuid::new_v4().to_string(),
                        conversation_id,
                        row.kind.to_string(),
                        row.scheduled_for,
                        row.message,
                        now,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Cancel every pending follow-up of a conversation. Returns the count
/// cancelled; `sent` and already-`cancelled` rows are untouched.
pub async fn cancel_pending(db: &Database, conversation_id: &str) -> Result<usize, FunilError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let cancelled = conn.execute(
                "UPDATE followups SET status = 'cancelled'
                 WHERE conversation_id = ?1 AND status = 'pending'",
                params![conversation_id],
            )?;
            Ok(cancelled)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All pending follow-ups whose `scheduled_for` is at or before `now`.
pub async fn due(db: &Database, now: &str) -> Result<Vec<Followup>, FunilError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FOLLOWUP_COLUMNS} FROM followups
                 WHERE status = 'pending' AND scheduled_for <= ?1
                 ORDER BY scheduled_for ASC"
            ))?;
            let rows = stmt.query_map(params![now], followup_from_row)?;
            let mut followups = Vec::new();
            for row in rows {
                followups.push(row?);
            }
            Ok(followups)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a follow-up sent. Guarded on `pending`; returns `false` if another
/// writer already moved the row out of `pending`.
pub async fn mark_sent(db: &Database, id: &str) -> Result<bool, FunilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE followups SET status = 'sent', executed_at = ?1
                 WHERE id = ?2 AND status = 'pending'",
                params![now_iso(), id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a follow-up cancelled. Guarded on `pending`; returns `false` if the
/// row already left `pending`.
pub async fn mark_cancelled(db: &Database, id: &str) -> Result<bool, FunilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE followups SET status = 'cancelled'
                 WHERE id = ?1 AND status = 'pending'",
                params![id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

enum RescheduleTxOutcome {
    Applied,
    NotPending(FollowupStatus),
    NotFound,
}

/// Move a pending follow-up to a new fire time. Only legal while the target
/// is still `pending`.
pub async fn reschedule(db: &Database, id: &str, new_time: &str) -> Result<(), FunilError> {
    let id_owned = id.to_string();
    let new_time = new_time.to_string();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let status: Option<String> = {
                let result = tx.query_row(
                    "SELECT status FROM followups WHERE id = ?1",
                    params![id_owned],
                    |row| row.get(0),
                );
                match result {
                    Ok(s) => Some(s),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                }
            };
            let Some(status) = status else {
                return Ok(RescheduleTxOutcome::NotFound);
            };
            let status: FollowupStatus = parse_col(0, status)?;
            if status != FollowupStatus::Pending {
                return Ok(RescheduleTxOutcome::NotPending(status));
            }
            tx.execute(
                "UPDATE followups SET scheduled_for = ?1 WHERE id = ?2",
                params![new_time, id_owned],
            )?;
            tx.commit()?;
            Ok(RescheduleTxOutcome::Applied)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        RescheduleTxOutcome::Applied => Ok(()),
        RescheduleTxOutcome::NotPending(status) => Err(FunilError::InvalidTransition {
            detail: format!("cannot reschedule a {status} follow-up"),
        }),
        RescheduleTxOutcome::NotFound => Err(FunilError::NotFound {
            entity: "followup",
            id: id.to_string(),
        }),
    }
}

/// Get a follow-up by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Followup>, FunilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FOLLOWUP_COLUMNS} FROM followups WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], followup_from_row) {
                Ok(f) => Ok(Some(f)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All follow-ups of a conversation in scheduling order.
pub async fn list_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Followup>, FunilError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FOLLOWUP_COLUMNS} FROM followups
                 WHERE conversation_id = ?1
                 ORDER BY scheduled_for ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id], followup_from_row)?;
            let mut followups = Vec::new();
            for row in rows {
                followups.push(row?);
            }
            Ok(followups)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::conversations;
    use tempfile::tempdir;

    async fn setup_conversation() -> (Database, tempfile::TempDir, String) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let lookup = conversations::get_or_create(&db, "5599222220001", None)
            .await
            .unwrap();
        (db, dir, lookup.conversation.id)
    }

    fn batch() -> Vec<NewFollowup> {
        FollowupKind::ALL
            .iter()
            .map(|kind| NewFollowup {
                kind: *kind,
                scheduled_for: format!("2026-02-0{}T00:00:00.000Z", kind.offset().num_days() + 1),
                message: format!("nudge {kind}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn insert_batch_is_idempotent() {
        let (db, _dir, conv_id) = setup_conversation().await;

        assert!(insert_batch(&db, &conv_id, batch()).await.unwrap());
        // Second call without an intervening cancellation is a no-op.
        assert!(!insert_batch(&db, &conv_id, batch()).await.unwrap());

        let rows = list_for_conversation(&db, &conv_id).await.unwrap();
        assert_eq!(rows.len(), 4, "exactly 4 rows, not 8");
        assert!(rows.iter().all(|f| f.status == FollowupStatus::Pending));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_batch_allows_a_fresh_one() {
        let (db, _dir, conv_id) = setup_conversation().await;

        insert_batch(&db, &conv_id, batch()).await.unwrap();
        assert_eq!(cancel_pending(&db, &conv_id).await.unwrap(), 4);

        assert!(insert_batch(&db, &conv_id, batch()).await.unwrap());
        let rows = list_for_conversation(&db, &conv_id).await.unwrap();
        assert_eq!(rows.len(), 8);
        assert_eq!(
            rows.iter()
                .filter(|f| f.status == FollowupStatus::Pending)
                .count(),
            4
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn due_returns_only_ripe_pending_rows() {
        let (db, _dir, conv_id) = setup_conversation().await;
        insert_batch(&db, &conv_id, batch()).await.unwrap();

        let ripe = due(&db, "2026-02-03T00:00:00.000Z").await.unwrap();
        assert_eq!(ripe.len(), 2, "3h and 1d offsets are due");

        let none = due(&db, "2026-01-01T00:00:00.000Z").await.unwrap();
        assert!(none.is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_sent_is_guarded_against_double_dispatch() {
        let (db, _dir, conv_id) = setup_conversation().await;
        insert_batch(&db, &conv_id, batch()).await.unwrap();
        let rows = list_for_conversation(&db, &conv_id).await.unwrap();
        let id = rows[0].id.clone();

        assert!(mark_sent(&db, &id).await.unwrap());
        // A second sweep of the same row is a no-op.
        assert!(!mark_sent(&db, &id).await.unwrap());
        assert!(!mark_cancelled(&db, &id).await.unwrap());

        let row = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(row.status, FollowupStatus::Sent);
        assert!(row.executed_at.is_some());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reschedule_requires_pending() {
        let (db, _dir, conv_id) = setup_conversation().await;
        insert_batch(&db, &conv_id, batch()).await.unwrap();
        let rows = list_for_conversation(&db, &conv_id).await.unwrap();
        let id = rows[0].id.clone();

        reschedule(&db, &id, "2026-03-01T00:00:00.000Z").await.unwrap();
        let row = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(row.scheduled_for, "2026-03-01T00:00:00.000Z");
        assert_eq!(row.status, FollowupStatus::Pending);

        mark_sent(&db, &id).await.unwrap();
        let err = reschedule(&db, &id, "2026-04-01T00:00:00.000Z")
            .await
            .unwrap_err();
        assert!(matches!(err, FunilError::InvalidTransition { .. }));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reschedule_missing_followup_is_not_found() {
        let (db, _dir, _conv_id) = setup_conversation().await;
        let err = reschedule(&db, "ghost", "2026-03-01T00:00:00.000Z")
            .await
            .unwrap_err();
        assert!(matches!(err, FunilError::NotFound { .. }));
        db.close().await.unwrap();
    }
}
