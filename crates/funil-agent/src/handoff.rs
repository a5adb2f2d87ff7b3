// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human handoff and operator actions.
//!
//! Escalation flips the conversation to `handoff` and cancels the pending
//! follow-up batch inside one storage transaction, so no nudge can fire
//! against a thread a human now owns. The courtesy notice to the client and
//! the CRM note ride along afterwards and may fail independently.

use std::sync::Arc;

use funil_core::types::{Conversation, ConversationStage, ConversationStatus, MessageRole};
use funil_core::{CrmSync, FunilError, MessagingChannel};
use funil_guard::LoopGuard;
use funil_storage::queries::{conversations, leads, messages};
use funil_storage::{Database, StageChange};
use tracing::{info, warn};

/// Notice sent to the client when a human takes over.
const HANDOFF_NOTICE: &str = "Entendo sua situação! 😊\n\nVou transferir você para um de nossos consultores especializados que poderá te ajudar melhor com isso.\n\nEm breve alguém da nossa equipe entrará em contato. Obrigado pela paciência! 🙏";

/// Escalation and operator-level conversation controls.
pub struct HandoffService {
    db: Database,
    channel: Arc<dyn MessagingChannel>,
    crm: Arc<dyn CrmSync>,
    loop_guard: Arc<LoopGuard>,
}

impl HandoffService {
    pub fn new(
        db: Database,
        channel: Arc<dyn MessagingChannel>,
        crm: Arc<dyn CrmSync>,
        loop_guard: Arc<LoopGuard>,
    ) -> Self {
        Self {
            db,
            channel,
            crm,
            loop_guard,
        }
    }

    /// Escalate a conversation to a human operator.
    ///
    /// Commits status + follow-up cancellation first, then notifies the
    /// client and the CRM. Notification failures are logged, never
    /// propagated: the handoff itself already holds.
    pub async fn request(
        &self,
        conversation_id: &str,
        reason: &str,
    ) -> Result<Conversation, FunilError> {
        let (conversation, cancelled) =
            conversations::transition_to_handoff(&self.db, conversation_id).await?;

        info!(
            conversation_id,
            reason,
            followups_cancelled = cancelled,
            "conversation handed off to human"
        );

        // Courtesy notice: durably appended before the send, like any other
        // outbound message.
        match messages::append(
            &self.db,
            conversation_id,
            MessageRole::Assistant,
            HANDOFF_NOTICE,
        )
        .await
        {
            Ok(_) => {
                match self.channel.send_text(&conversation.phone, HANDOFF_NOTICE).await {
                    Ok(()) => self.loop_guard.record_sent(&conversation.phone, HANDOFF_NOTICE),
                    Err(e) => {
                        warn!(conversation_id, error = %e, "failed to send handoff notice")
                    }
                }
            }
            Err(e) => warn!(conversation_id, error = %e, "failed to persist handoff notice"),
        }

        // CRM note, fire-and-forget.
        if let Ok(Some(lead)) = leads::get(&self.db, &conversation.lead_id).await
            && let Some(crm_id) = lead.crm_id.as_deref()
            && let Err(e) = self
                .crm
                .add_note(crm_id, &format!("🤝 HANDOFF SOLICITADO\nMotivo: {reason}"))
                .await
        {
            warn!(conversation_id, error = %e, "failed to sync handoff note to CRM");
        }

        Ok(conversation)
    }

    /// Operator action: close a conversation.
    ///
    /// Closure also cancels whatever is still pending; a closed thread gets
    /// no nudges.
    pub async fn close(&self, conversation_id: &str) -> Result<Conversation, FunilError> {
        let conversation =
            conversations::transition_status(&self.db, conversation_id, ConversationStatus::Closed)
                .await?;
        let cancelled = funil_followup::scheduler::cancel_all(&self.db, conversation_id).await?;
        info!(
            conversation_id,
            followups_cancelled = cancelled,
            "conversation closed by operator"
        );
        Ok(conversation)
    }

    /// Operator action: force the funnel stage to an arbitrary value.
    ///
    /// The escape hatch past the forward-only rule; not reachable from any
    /// scheduler-driven path.
    pub async fn override_stage(
        &self,
        conversation_id: &str,
        stage: ConversationStage,
    ) -> Result<StageChange, FunilError> {
        let change = conversations::transition_stage(&self.db, conversation_id, stage, true).await?;
        info!(conversation_id, stage = %stage, "stage set by operator override");
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funil_core::types::FollowupStatus;
    use funil_followup::FollowupTemplates;
    use funil_followup::scheduler;
    use funil_storage::queries::followups;
    use funil_test_utils::{MockChannel, MockCrm};
    use std::time::Duration;
    use tempfile::tempdir;

    struct Fixture {
        db: Database,
        channel: Arc<MockChannel>,
        crm: Arc<MockCrm>,
        service: HandoffService,
        conversation_id: String,
        _dir: tempfile::TempDir,
    }

    async fn setup(phone: &str) -> Fixture {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let lookup = conversations::get_or_create(&db, phone, None).await.unwrap();
        let channel = Arc::new(MockChannel::new());
        let crm = Arc::new(MockCrm::new());
        let loop_guard = Arc::new(LoopGuard::new(Duration::from_secs(12)));
        let service = HandoffService::new(
            db.clone(),
            channel.clone(),
            crm.clone(),
            loop_guard,
        );
        Fixture {
            db,
            channel,
            crm,
            service,
            conversation_id: lookup.conversation.id,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn handoff_cancels_batch_and_notifies_client() {
        let fixture = setup("5599555550001").await;
        scheduler::schedule_defaults(
            &fixture.db,
            &fixture.conversation_id,
            chrono::Utc::now(),
            &FollowupTemplates::default_pt_br(),
        )
        .await
        .unwrap();

        let conversation = fixture
            .service
            .request(&fixture.conversation_id, "cliente pediu humano")
            .await
            .unwrap();

        assert_eq!(conversation.status, ConversationStatus::Handoff);
        assert!(conversation.handoff_at.is_some());

        let rows = followups::list_for_conversation(&fixture.db, &fixture.conversation_id)
            .await
            .unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|f| f.status == FollowupStatus::Cancelled));

        let sent = fixture.channel.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("consultores"));

        // No CRM id on the lead yet, so no note is pushed.
        assert!(fixture.crm.notes().await.is_empty());

        db_close(fixture).await;
    }

    #[tokio::test]
    async fn handoff_notice_failure_does_not_undo_the_handoff() {
        let fixture = setup("5599555550002").await;
        fixture.channel.set_failing(true);

        let conversation = fixture
            .service
            .request(&fixture.conversation_id, "teste")
            .await
            .unwrap();
        assert_eq!(conversation.status, ConversationStatus::Handoff);

        db_close(fixture).await;
    }

    #[tokio::test]
    async fn double_handoff_is_an_invalid_transition() {
        let fixture = setup("5599555550003").await;
        fixture.service.request(&fixture.conversation_id, "a").await.unwrap();
        let err = fixture
            .service
            .request(&fixture.conversation_id, "b")
            .await
            .unwrap_err();
        assert!(matches!(err, FunilError::InvalidTransition { .. }));

        db_close(fixture).await;
    }

    #[tokio::test]
    async fn close_cancels_pending_followups() {
        let fixture = setup("5599555550004").await;
        scheduler::schedule_defaults(
            &fixture.db,
            &fixture.conversation_id,
            chrono::Utc::now(),
            &FollowupTemplates::default_pt_br(),
        )
        .await
        .unwrap();

        let conversation = fixture.service.close(&fixture.conversation_id).await.unwrap();
        assert_eq!(conversation.status, ConversationStatus::Closed);

        let rows = followups::list_for_conversation(&fixture.db, &fixture.conversation_id)
            .await
            .unwrap();
        assert!(rows.iter().all(|f| f.status == FollowupStatus::Cancelled));

        db_close(fixture).await;
    }

    #[tokio::test]
    async fn override_stage_may_regress() {
        let fixture = setup("5599555550005").await;
        conversations::transition_stage(
            &fixture.db,
            &fixture.conversation_id,
            ConversationStage::Negotiation,
            false,
        )
        .await
        .unwrap();

        fixture
            .service
            .override_stage(&fixture.conversation_id, ConversationStage::InService)
            .await
            .unwrap();

        let conversation = conversations::get(&fixture.db, &fixture.conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.stage, ConversationStage::InService);

        db_close(fixture).await;
    }

    async fn db_close(fixture: Fixture) {
        fixture.db.close().await.unwrap();
    }
}
