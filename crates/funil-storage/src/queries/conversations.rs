// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lifecycle operations.
//!
//! The single-active-conversation invariant is enforced here: lookups and
//! creations for a phone run inside one transaction on the single writer
//! thread, so two concurrent "first message" deliveries resolve to the same
//! row.

use funil_core::time::now_iso;
use funil_core::types::{Conversation, ConversationStage, ConversationStatus, Lead};
use funil_core::FunilError;
use rusqlite::params;
use tracing::warn;

use crate::database::Database;
use crate::queries::leads::{lead_from_row, LEAD_COLUMNS};
use crate::queries::parse_col;

pub(crate) const CONVERSATION_COLUMNS: &str =
    "id, phone, lead_id, status, stage, last_message_at, handoff_at, created_at, updated_at";

pub(crate) fn conversation_from_row(row: &rusqlite::Row<'_>) -> Result<Conversation, rusqlite::Error> {
    Ok(Conversation {
        id: row.get(0)?,
        phone: row.get(1)?,
        lead_id: row.get(2)?,
        status: parse_col(3, row.get::<_, String>(3)?)?,
        stage: parse_col(4, row.get::<_, String>(4)?)?,
        last_message_at: row.get(5)?,
        handoff_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Result of [`get_or_create`]: the conversation now owning the phone's
/// traffic, its lead, and whether this call created the conversation.
#[derive(Debug, Clone)]
pub struct ConversationLookup {
    pub conversation: Conversation,
    pub lead: Lead,
    pub created: bool,
}

/// Returns the single active conversation for `phone`, creating lead and
/// conversation atomically if none exists.
///
/// Resolution order, all in one transaction:
/// 1. An `active` conversation wins. If more than one exists (an invariant
///    violation), the most recently created wins and the anomaly is logged.
/// 2. Otherwise, if the newest conversation for the phone is in `handoff`,
///    it is returned un-created: a human owns the thread and the caller must
///    not resume automation on it.
/// 3. Otherwise a fresh lead (get-or-create by phone) and conversation
///    (`active`/`new`) are created; `created = true` marks the activation
///    that triggers follow-up scheduling.
pub async fn get_or_create(
    db: &Database,
    phone: &str,
    sender_name: Option<&str>,
) -> Result<ConversationLookup, FunilError> {
    let phone = phone.to_string();
    let sender_name = sender_name.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            // 1. Active conversation for the phone, newest first.
            let active: Vec<Conversation> = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations
                     WHERE phone = ?1 AND status = 'active'
                     ORDER BY created_at DESC, rowid DESC"
                ))?;
                let rows = stmt.query_map(params![phone], conversation_from_row)?;
                let mut found = Vec::new();
                for row in rows {
                    found.push(row?);
                }
                found
            };

            if let Some(conversation) = active.first().cloned() {
                if active.len() > 1 {
                    warn!(
                        phone = phone.as_str(),
                        count = active.len(),
                        winner = conversation.id.as_str(),
                        "multiple active conversations for phone, preferring newest"
                    );
                }
                let lead = load_lead(&tx, &conversation.lead_id)?;
                tx.commit()?;
                return Ok(ConversationLookup {
                    conversation,
                    lead,
                    created: false,
                });
            }

            // 2. No active row: a newest-in-handoff conversation blocks creation.
            let newest: Option<Conversation> = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations
                     WHERE phone = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ))?;
                match stmt.query_row(params![phone], conversation_from_row) {
                    Ok(c) => Some(c),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                }
            };

            if let Some(conversation) = newest
                && conversation.status == ConversationStatus::Handoff
            {
                let lead = load_lead(&tx, &conversation.lead_id)?;
                tx.commit()?;
                return Ok(ConversationLookup {
                    conversation,
                    lead,
                    created: false,
                });
            }

            // 3. Create lead (or update its name opportunistically) and conversation.
            let now = now_iso();
            let lead = {
                let existing = {
                    let mut stmt = tx.prepare(&format!(
                        "SELECT {LEAD_COLUMNS} FROM leads WHERE phone = ?1"
                    ))?;
                    match stmt.query_row(params![phone], lead_from_row) {
                        Ok(lead) => Some(lead),
                        Err(rusqlite::Error::QueryReturnedNoRows) => None,
                        Err(e) => return Err(e.into()),
                    }
                };
                match existing {
                    Some(mut lead) => {
                        if lead.name.is_none()
                            && let Some(name) = &sender_name
                        {
                            tx.execute(
                                "UPDATE leads SET name = ?1, updated_at = ?2 WHERE id = ?3",
                                params![name, now, lead.id],
                            )?;
                            lead.name = Some(name.clone());
                        }
                        lead
                    }
                    None => {
                        let lead = Lead {
                            id: uuid::Uuid::new_v4().to_string(),
                            phone: phone.clone(),
                            name: sender_name.clone(),
                            email: None,
                            profile: None,
                            crm_id: None,
                            origin: "whatsapp".to_string(),
                            created_at: now.clone(),
                            updated_at: now.clone(),
                        };
                        tx.execute(
                            "INSERT INTO leads (id, phone, name, email, profile, crm_id, origin, created_at, updated_at)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                            params![
                                lead.id,
                                lead.phone,
                                lead.name,
                                lead.email,
                                lead.profile,
                                lead.crm_id,
                                lead.origin,
                                lead.created_at,
                                lead.updated_at,
                            ],
                        )?;
                        lead
                    }
                }
            };

            let conversation = Conversation {
                id: uuid::Uuid::new_v4().to_string(),
                phone: phone.clone(),
                lead_id: lead.id.clone(),
                status: ConversationStatus::Active,
                stage: ConversationStage::New,
                last_message_at: Some(now.clone()),
                handoff_at: None,
                created_at: now.clone(),
                updated_at: now,
            };
            tx.execute(
                "INSERT INTO conversations (id, phone, lead_id, status, stage, last_message_at, handoff_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    conversation.id,
                    conversation.phone,
                    conversation.lead_id,
                    conversation.status.to_string(),
                    conversation.stage.to_string(),
                    conversation.last_message_at,
                    conversation.handoff_at,
                    conversation.created_at,
                    conversation.updated_at,
                ],
            )?;
            tx.commit()?;

            Ok(ConversationLookup {
                conversation,
                lead,
                created: true,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn load_lead(tx: &rusqlite::Transaction<'_>, lead_id: &str) -> Result<Lead, rusqlite::Error> {
    let mut stmt = tx.prepare(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"))?;
    stmt.query_row(params![lead_id], lead_from_row)
}

/// Get a conversation by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Conversation>, FunilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], conversation_from_row) {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

enum StatusTxOutcome {
    Applied(Conversation),
    Illegal(ConversationStatus),
    NotFound,
}

/// Apply a status transition, enforcing the state machine.
///
/// Handoff must go through [`transition_to_handoff`] so the follow-up batch
/// is cancelled in the same transaction.
pub async fn transition_status(
    db: &Database,
    id: &str,
    new_status: ConversationStatus,
) -> Result<Conversation, FunilError> {
    let id_owned = id.to_string();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current = match select_conversation(&tx, &id_owned)? {
                Some(c) => c,
                None => return Ok(StatusTxOutcome::NotFound),
            };
            if !current.status.can_transition_to(new_status) {
                return Ok(StatusTxOutcome::Illegal(current.status));
            }
            tx.execute(
                "UPDATE conversations SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![new_status.to_string(), now_iso(), id_owned],
            )?;
            let updated = select_conversation(&tx, &id_owned)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(StatusTxOutcome::Applied(updated))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        StatusTxOutcome::Applied(c) => Ok(c),
        StatusTxOutcome::Illegal(from) => Err(FunilError::InvalidTransition {
            detail: format!("status {from} -> {new_status}"),
        }),
        StatusTxOutcome::NotFound => Err(FunilError::NotFound {
            entity: "conversation",
            id: id.to_string(),
        }),
    }
}

enum HandoffTxOutcome {
    Applied {
        conversation: Conversation,
        cancelled: usize,
    },
    Illegal(ConversationStatus),
    NotFound,
}

/// Escalate a conversation to a human operator.
///
/// Sets `status = handoff` + `handoff_at` and cancels every pending
/// follow-up in the same transaction, so no race can leave a follow-up
/// pending against a handed-off conversation. Returns the conversation and
/// the number of follow-ups cancelled.
pub async fn transition_to_handoff(
    db: &Database,
    id: &str,
) -> Result<(Conversation, usize), FunilError> {
    let id_owned = id.to_string();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current = match select_conversation(&tx, &id_owned)? {
                Some(c) => c,
                None => return Ok(HandoffTxOutcome::NotFound),
            };
            if !current.status.can_transition_to(ConversationStatus::Handoff) {
                return Ok(HandoffTxOutcome::Illegal(current.status));
            }
            let now = now_iso();
            tx.execute(
                "UPDATE conversations SET status = 'handoff', handoff_at = ?1, updated_at = ?1
                 WHERE id = ?2",
                params![now, id_owned],
            )?;
            let cancelled = tx.execute(
                "UPDATE followups SET status = 'cancelled'
                 WHERE conversation_id = ?1 AND status = 'pending'",
                params![id_owned],
            )?;
            let updated = select_conversation(&tx, &id_owned)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(HandoffTxOutcome::Applied {
                conversation: updated,
                cancelled,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        HandoffTxOutcome::Applied {
            conversation,
            cancelled,
        } => Ok((conversation, cancelled)),
        HandoffTxOutcome::Illegal(from) => Err(FunilError::InvalidTransition {
            detail: format!("status {from} -> handoff"),
        }),
        HandoffTxOutcome::NotFound => Err(FunilError::NotFound {
            entity: "conversation",
            id: id.to_string(),
        }),
    }
}

/// Result of a stage transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageChange {
    /// Stage moved forward (or was force-set) to the requested value.
    Advanced,
    /// Requested stage equals the current one; nothing written.
    Unchanged,
}

enum StageTxOutcome {
    Changed(StageChange),
    Regression(ConversationStage),
    NotFound,
}

/// Move a conversation's funnel stage.
///
/// Forward-only under normal flow; `force` is the operator override that may
/// set any value directly.
pub async fn transition_stage(
    db: &Database,
    id: &str,
    new_stage: ConversationStage,
    force: bool,
) -> Result<StageChange, FunilError> {
    let id_owned = id.to_string();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current = match select_conversation(&tx, &id_owned)? {
                Some(c) => c,
                None => return Ok(StageTxOutcome::NotFound),
            };
            if current.stage == new_stage {
                return Ok(StageTxOutcome::Changed(StageChange::Unchanged));
            }
            if !force && new_stage.rank() < current.stage.rank() {
                return Ok(StageTxOutcome::Regression(current.stage));
            }
            tx.execute(
                "UPDATE conversations SET stage = ?1, updated_at = ?2 WHERE id = ?3",
                params![new_stage.to_string(), now_iso(), id_owned],
            )?;
            tx.commit()?;
            Ok(StageTxOutcome::Changed(StageChange::Advanced))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        StageTxOutcome::Changed(change) => Ok(change),
        StageTxOutcome::Regression(from) => Err(FunilError::InvalidTransition {
            detail: format!("stage {from} -> {new_stage} would regress"),
        }),
        StageTxOutcome::NotFound => Err(FunilError::NotFound {
            entity: "conversation",
            id: id.to_string(),
        }),
    }
}

fn select_conversation(
    tx: &rusqlite::Transaction<'_>,
    id: &str,
) -> Result<Option<Conversation>, rusqlite::Error> {
    let mut stmt = tx.prepare(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
    ))?;
    match stmt.query_row(params![id], conversation_from_row) {
        Ok(c) => Ok(Some(c)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
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

    #[tokio::test]
    async fn first_contact_creates_lead_and_active_conversation() {
        let (db, _dir) = setup_db().await;
        let lookup = get_or_create(&db, "5599000000001", Some("Joana"))
            .await
            .unwrap();

        assert!(lookup.created);
        assert_eq!(lookup.conversation.status, ConversationStatus::Active);
        assert_eq!(lookup.conversation.stage, ConversationStage::New);
        assert_eq!(lookup.conversation.phone, "5599000000001");
        assert_eq!(lookup.lead.phone, "5599000000001");
        assert_eq!(lookup.conversation.lead_id, lookup.lead.id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn second_message_attaches_to_existing_conversation() {
        let (db, _dir) = setup_db().await;
        let first = get_or_create(&db, "5599000000002", None).await.unwrap();
        let second = get_or_create(&db, "5599000000002", None).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.conversation.id, second.conversation.id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_get_or_create_yields_one_conversation() {
        let (db, _dir) = setup_db().await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                get_or_create(&db, "5599000000003", None).await.unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().conversation.id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1, "all callers must resolve to the same conversation");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn handoff_conversation_blocks_new_creation() {
        let (db, _dir) = setup_db().await;
        let lookup = get_or_create(&db, "5599000000004", None).await.unwrap();
        transition_to_handoff(&db, &lookup.conversation.id)
            .await
            .unwrap();

        let after = get_or_create(&db, "5599000000004", None).await.unwrap();
        assert!(!after.created);
        assert_eq!(after.conversation.id, lookup.conversation.id);
        assert_eq!(after.conversation.status, ConversationStatus::Handoff);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn closed_conversation_allows_fresh_activation() {
        let (db, _dir) = setup_db().await;
        let first = get_or_create(&db, "5599000000005", None).await.unwrap();
        transition_status(&db, &first.conversation.id, ConversationStatus::Closed)
            .await
            .unwrap();

        let second = get_or_create(&db, "5599000000005", None).await.unwrap();
        assert!(second.created);
        assert_ne!(second.conversation.id, first.conversation.id);
        // Same lead is reused across conversations.
        assert_eq!(second.lead.id, first.lead.id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn handoff_sets_timestamp_and_cancels_pending_followups() {
        let (db, _dir) = setup_db().await;
        let lookup = get_or_create(&db, "5599000000006", None).await.unwrap();
        let conv_id = lookup.conversation.id.clone();

        // Seed two pending and one sent follow-up.
        db.connection()
            .call({
                let conv_id = conv_id.clone();
                move |conn| {
                    for (id, status) in [("f1", "pending"), ("f2", "pending"), ("f3", "sent")] {
                        conn.execute(
                            "INSERT INTO followups (id, conversation_id, kind, scheduled_for, status, message, created_at)
                             VALUES (?1, ?2, '1d', '2026-01-02T00:00:00.000Z', ?3, 'oi', '2026-01-01T00:00:00.000Z')",
                            params![id, conv_id, status],
                        )?;
                    }
                    Ok::<_, rusqlite::Error>(())
                }
            })
            .await
            .unwrap();

        let (conversation, cancelled) = transition_to_handoff(&db, &conv_id).await.unwrap();
        assert_eq!(conversation.status, ConversationStatus::Handoff);
        assert!(conversation.handoff_at.is_some());
        assert_eq!(cancelled, 2, "only pending follow-ups are cancelled");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn status_machine_rejects_leaving_handoff() {
        let (db, _dir) = setup_db().await;
        let lookup = get_or_create(&db, "5599000000007", None).await.unwrap();
        transition_to_handoff(&db, &lookup.conversation.id)
            .await
            .unwrap();

        let err = transition_status(&db, &lookup.conversation.id, ConversationStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, FunilError::InvalidTransition { .. }));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stage_moves_forward_only_unless_forced() {
        let (db, _dir) = setup_db().await;
        let lookup = get_or_create(&db, "5599000000008", None).await.unwrap();
        let id = lookup.conversation.id.clone();

        let change = transition_stage(&db, &id, ConversationStage::Qualification, false)
            .await
            .unwrap();
        assert_eq!(change, StageChange::Advanced);

        // Regression without force is refused.
        let err = transition_stage(&db, &id, ConversationStage::InService, false)
            .await
            .unwrap_err();
        assert!(matches!(err, FunilError::InvalidTransition { .. }));

        // Operator override may set any value.
        let change = transition_stage(&db, &id, ConversationStage::InService, true)
            .await
            .unwrap();
        assert_eq!(change, StageChange::Advanced);

        let conversation = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(conversation.stage, ConversationStage::InService);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transition_on_missing_conversation_is_not_found() {
        let (db, _dir) = setup_db().await;
        let err = transition_status(&db, "no-such-id", ConversationStatus::Closed)
            .await
            .unwrap_err();
        assert!(matches!(err, FunilError::NotFound { .. }));
        db.close().await.unwrap();
    }
}
