// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message append and history operations.
//!
//! Messages are append-only: never updated, never deleted. Ordering key is
//! `created_at` with rowid breaking ties between same-millisecond inserts.

use funil_core::FunilError;
use funil_core::time::now_iso;
use funil_core::types::{Message, MessageRole};
use rusqlite::params;

use crate::database::Database;
use crate::queries::parse_col;

const MESSAGE_COLUMNS: &str = "id, conversation_id, role, content, created_at";

fn message_from_row(row: &rusqlite::Row<'_>) -> Result<Message, rusqlite::Error> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: parse_col(2, row.get::<_, String>(2)?)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

enum AppendTxOutcome {
    Applied(Message),
    NotFound,
}

/// Append a message and bump the conversation's `last_message_at` in the
/// same transaction.
pub async fn append(
    db: &Database,
    conversation_id: &str,
    role: MessageRole,
    content: &str,
) -> Result<Message, FunilError> {
    let conversation_id_owned = conversation_id.to_string();
    let content = content.to_string();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let now = now_iso();
            let bumped = tx.execute(
                "UPDATE conversations SET last_message_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![now, conversation_id_owned],
            )?;
            if bumped == 0 {
                return Ok(AppendTxOutcome::NotFound);
            }
            let message = Message {
                id: uuid::Uuid::new_v4().to_string(),
                conversation_id: conversation_id_owned.clone(),
                role,
                content: content.clone(),
                created_at: now,
            };
            tx.execute(
                "INSERT INTO messages (id, conversation_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id,
                    message.conversation_id,
                    message.role.to_string(),
                    message.content,
                    message.created_at,
                ],
            )?;
            tx.commit()?;
            Ok(AppendTxOutcome::Applied(message))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        AppendTxOutcome::Applied(message) => Ok(message),
        AppendTxOutcome::NotFound => Err(FunilError::NotFound {
            entity: "conversation",
            id: conversation_id.to_string(),
        }),
    }
}

/// The most recent `limit` messages of a conversation, oldest first.
pub async fn history(
    db: &Database,
    conversation_id: &str,
    limit: usize,
) -> Result<Vec<Message>, FunilError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![conversation_id, limit as i64], message_from_row)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            // Newest-first from the query; callers want chronological order.
            messages.reverse();
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
