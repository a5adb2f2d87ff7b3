// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up sweep dispatcher.
//!
//! A single periodic task scans for due follow-ups and resolves each one
//! independently: cancel (client engaged, conversation handed off, or gone),
//! send, or cancel-on-failure. Sweeps never overlap — the interval ticks are
//! consumed sequentially and an async mutex covers the manual run-now hook —
//! and every terminal transition re-checks "still pending?" so a racing
//! writer is a safe no-op rather than a double send.

use std::sync::Arc;
use std::time::Duration;

use funil_core::time::{now_iso, parse_iso};
use funil_core::types::{Conversation, ConversationStatus, Followup, FollowupStatus};
use funil_core::{FunilError, MessagingChannel};
use funil_storage::Database;
use funil_storage::queries::{conversations, followups};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome counters for one sweep, logged and returned by the run-now hook.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepStats {
    /// Due rows picked up by the sweep.
    pub due: usize,
    /// Nudges delivered and marked sent.
    pub sent: usize,
    /// Rows cancelled (engaged client, handoff, missing conversation, send failure).
    pub cancelled: usize,
    /// Rows another writer resolved first, or rows whose processing errored.
    pub skipped: usize,
}

/// The periodic follow-up dispatcher.
pub struct FollowupWorker {
    db: Database,
    channel: Arc<dyn MessagingChannel>,
    sweep_interval: Duration,
    quiet_threshold: chrono::Duration,
    sweep_lock: tokio::sync::Mutex<()>,
}

impl FollowupWorker {
    pub fn new(
        db: Database,
        channel: Arc<dyn MessagingChannel>,
        sweep_interval: Duration,
        quiet_threshold: Duration,
    ) -> Self {
        Self {
            db,
            channel,
            sweep_interval,
            quiet_threshold: chrono::Duration::from_std(quiet_threshold)
                .unwrap_or_else(|_| chrono::Duration::seconds(3600)),
            sweep_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Runs sweeps on a fixed interval until the token is cancelled.
    ///
    /// A sweep that outlasts the interval delays the next tick instead of
    /// overlapping it.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            "follow-up dispatcher running"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep_due().await {
                        Ok(stats) if stats.due > 0 => {
                            info!(
                                due = stats.due,
                                sent = stats.sent,
                                cancelled = stats.cancelled,
                                skipped = stats.skipped,
                                "sweep complete"
                            );
                        }
                        Ok(_) => debug!("sweep complete, nothing due"),
                        Err(e) => error!(error = %e, "sweep failed"),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping follow-up dispatcher");
                    break;
                }
            }
        }
    }

    /// Executes one sweep: finds due follow-ups and resolves each
    /// independently. Also serves the operational "run now" hook.
    pub async fn sweep_due(&self) -> Result<SweepStats, FunilError> {
        let _guard = self.sweep_lock.lock().await;
        let now = now_iso();
        let due = followups::due(&self.db, &now).await?;

        let mut stats = SweepStats {
            due: due.len(),
            ..SweepStats::default()
        };

        for followup in due {
            // One follow-up's failure must not block the rest of the sweep.
            match self.resolve_one(&followup).await {
                Ok(outcome) => match outcome {
                    Resolution::Sent => stats.sent += 1,
                    Resolution::Cancelled => stats.cancelled += 1,
                    Resolution::Skipped => stats.skipped += 1,
                },
                Err(e) => {
                    error!(followup_id = followup.id.as_str(), error = %e, "follow-up resolution failed");
                    stats.skipped += 1;
                }
            }
        }

        Ok(stats)
    }

    async fn resolve_one(&self, followup: &Followup) -> Result<Resolution, FunilError> {
        let conversation = match conversations::get(&self.db, &followup.conversation_id).await? {
            Some(c) => c,
            None => {
                // Already-resolved elsewhere; terminalize so it is never retried.
                warn!(
                    followup_id = followup.id.as_str(),
                    conversation_id = followup.conversation_id.as_str(),
                    "conversation missing for due follow-up, cancelling"
                );
                followups::mark_cancelled(&self.db, &followup.id).await?;
                return Ok(Resolution::Cancelled);
            }
        };

        // 1. Reply-suppression: the client engaged after this batch was created.
        if self.client_engaged_since(&conversation, followup) {
            info!(
                followup_id = followup.id.as_str(),
                conversation_id = conversation.id.as_str(),
                "client replied after batch creation, cancelling follow-up"
            );
            followups::mark_cancelled(&self.db, &followup.id).await?;
            return Ok(Resolution::Cancelled);
        }

        // 2. Handoff-suppression: a human owns the thread.
        if conversation.status == ConversationStatus::Handoff {
            info!(
                followup_id = followup.id.as_str(),
                conversation_id = conversation.id.as_str(),
                "conversation in handoff, cancelling follow-up"
            );
            followups::mark_cancelled(&self.db, &followup.id).await?;
            return Ok(Resolution::Cancelled);
        }

        // 3. Dispatch. Optimistic re-check immediately before the send so a
        // row resolved by a racing writer is skipped, not double-sent.
        match followups::get(&self.db, &followup.id).await? {
            Some(current) if current.status == FollowupStatus::Pending => {}
            _ => {
                debug!(
                    followup_id = followup.id.as_str(),
                    "follow-up no longer pending, skipping"
                );
                return Ok(Resolution::Skipped);
            }
        }

        match self.channel.send_text(&conversation.phone, &followup.message).await {
            Ok(()) => {
                if followups::mark_sent(&self.db, &followup.id).await? {
                    info!(
                        followup_id = followup.id.as_str(),
                        kind = %followup.kind,
                        phone = conversation.phone.as_str(),
                        "follow-up sent"
                    );
                    Ok(Resolution::Sent)
                } else {
                    Ok(Resolution::Skipped)
                }
            }
            Err(e) => {
                // Best-effort nudge: a failed send is cancelled, not retried.
                error!(
                    followup_id = followup.id.as_str(),
                    error = %e,
                    "follow-up send failed, cancelling"
                );
                followups::mark_cancelled(&self.db, &followup.id).await?;
                Ok(Resolution::Cancelled)
            }
        }
    }

    /// Whether the conversation's last message landed after the follow-up's
    /// creation, inside the quiet threshold.
    fn client_engaged_since(&self, conversation: &Conversation, followup: &Followup) -> bool {
        let (Some(last), Some(created)) = (
            conversation.last_message_at.as_deref().and_then(parse_iso),
            parse_iso(&followup.created_at),
        ) else {
            return false;
        };
        last > created && last - created < self.quiet_threshold
    }
}

enum Resolution {
    Sent,
    Cancelled,
    Skipped,
}
