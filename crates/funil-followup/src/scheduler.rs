// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up batch scheduling.
//!
//! A conversation activation materializes exactly four follow-up rows at
//! fixed offsets from the activation time. The batch insert is idempotent at
//! the storage layer, so a double invocation (webhook redelivered past the
//! dedup window, racing workers) never duplicates rows.

use chrono::{DateTime, Utc};
use funil_core::FunilError;
use funil_core::time::to_iso;
use funil_core::types::FollowupKind;
use funil_storage::queries::followups;
use funil_storage::{Database, NewFollowup};
use tracing::{debug, info};

use crate::templates::FollowupTemplates;

/// Create the default follow-up batch for a conversation.
///
/// Returns `true` if the batch was created, `false` if a non-cancelled batch
/// already existed and the call was a no-op.
pub async fn schedule_defaults(
    db: &Database,
    conversation_id: &str,
    activation: DateTime<Utc>,
    templates: &FollowupTemplates,
) -> Result<bool, FunilError> {
    let rows: Vec<NewFollowup> = FollowupKind::ALL
        .iter()
        .map(|kind| NewFollowup {
            kind: *kind,
            scheduled_for: to_iso(activation + kind.offset()),
            message: templates.render(*kind).to_string(),
        })
        .collect();

    let created = followups::insert_batch(db, conversation_id, rows).await?;
    if created {
        info!(conversation_id, "follow-up batch scheduled");
    } else {
        debug!(conversation_id, "follow-up batch already exists, skipping");
    }
    Ok(created)
}

/// Cancel every pending follow-up of a conversation. Returns the count
/// cancelled (observability only; callers do not branch on it).
pub async fn cancel_all(db: &Database, conversation_id: &str) -> Result<usize, FunilError> {
    let cancelled = followups::cancel_pending(db, conversation_id).await?;
    if cancelled > 0 {
        info!(conversation_id, cancelled, "pending follow-ups cancelled");
    }
    Ok(cancelled)
}

/// Move a pending follow-up to a new fire time.
pub async fn reschedule(
    db: &Database,
    followup_id: &str,
    new_time: DateTime<Utc>,
) -> Result<(), FunilError> {
    followups::reschedule(db, followup_id, &to_iso(new_time)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use funil_core::types::FollowupStatus;
    use funil_storage::queries::conversations;
    use tempfile::tempdir;

    async fn setup() -> (Database, tempfile::TempDir, String) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let lookup = conversations::get_or_create(&db, "5599333330001", None)
            .await
            .unwrap();
        (db, dir, lookup.conversation.id)
    }

    #[tokio::test]
    async fn schedules_four_rows_at_fixed_offsets() {
        let (db, _dir, conv_id) = setup().await;
        let activation = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let templates = FollowupTemplates::default_pt_br();

        assert!(
            schedule_defaults(&db, &conv_id, activation, &templates)
                .await
                .unwrap()
        );

        let rows = followups::list_for_conversation(&db, &conv_id).await.unwrap();
        assert_eq!(rows.len(), 4);
        let scheduled: Vec<&str> = rows.iter().map(|f| f.scheduled_for.as_str()).collect();
        assert_eq!(
            scheduled,
            vec![
                "2026-03-01T15:00:00.000Z",
                "2026-03-02T12:00:00.000Z",
                "2026-03-04T12:00:00.000Z",
                "2026-03-08T12:00:00.000Z",
            ]
        );
        assert!(rows.iter().all(|f| f.status == FollowupStatus::Pending));
        // Each row carries its kind's pre-rendered text.
        for row in &rows {
            assert_eq!(row.message, templates.render(row.kind));
        }

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn double_scheduling_is_a_no_op() {
        let (db, _dir, conv_id) = setup().await;
        let activation = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let templates = FollowupTemplates::default_pt_br();

        assert!(
            schedule_defaults(&db, &conv_id, activation, &templates)
                .await
                .unwrap()
        );
        assert!(
            !schedule_defaults(&db, &conv_id, activation, &templates)
                .await
                .unwrap()
        );

        let rows = followups::list_for_conversation(&db, &conv_id).await.unwrap();
        assert_eq!(rows.len(), 4, "exactly 4 rows, not 8");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_all_reports_count() {
        let (db, _dir, conv_id) = setup().await;
        let activation = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let templates = FollowupTemplates::default_pt_br();
        schedule_defaults(&db, &conv_id, activation, &templates)
            .await
            .unwrap();

        assert_eq!(cancel_all(&db, &conv_id).await.unwrap(), 4);
        assert_eq!(cancel_all(&db, &conv_id).await.unwrap(), 0);

        db.close().await.unwrap();
    }
}
