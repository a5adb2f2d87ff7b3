// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message orchestration pipeline.
//!
//! One [`MessageProcessor::process`] call handles one inbound webhook event:
//! dedup gate → loop guard → conversation store → responder → stage machine
//! → follow-up scheduling, with CRM sync riding along as fire-and-forget.
//!
//! Store transactions are short and local; the responder, channel, and CRM
//! calls all happen outside any lock. The outbound reply is sent only after
//! both the inbound and outbound messages are durably appended.

use std::sync::Arc;

use funil_core::time::parse_iso;
use funil_core::types::{
    ConversationStatus, GeneratedReply, HistoryEntry, InboundEvent, MessageRole, ReplyRequest,
    TokenUsage,
};
use funil_core::{ContextProvider, CrmSync, FunilError, MessagingChannel, Responder};
use funil_followup::{FollowupTemplates, scheduler};
use funil_guard::{DedupGate, LoopGuard};
use funil_storage::Database;
use funil_storage::queries::{conversations, leads, messages};
use tracing::{debug, info, warn};

use crate::handoff::HandoffService;
use crate::stage;

/// Tunables the processor needs from configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Transcript messages handed to the responder.
    pub history_limit: usize,
    /// Chunk budget passed to the context provider.
    pub rag_top_k: usize,
    /// Static apology used when the responder produces nothing usable.
    pub fallback_reply: String,
}

/// How an inbound event was resolved. Used for logging and tests; the
/// webhook ack never depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A generated reply was persisted and sent.
    Replied,
    /// The static fallback apology was persisted and sent.
    FallbackReplied,
    /// Rejected by the dedup gate.
    Duplicate,
    /// Rejected by the loop guard.
    Echo,
    /// The conversation is handed off; the event was dropped.
    Ignored,
    /// The responder requested escalation; the conversation is now handed off.
    HandedOff,
}

/// The per-message orchestrator.
pub struct MessageProcessor {
    db: Database,
    dedup: Arc<DedupGate>,
    loop_guard: Arc<LoopGuard>,
    responder: Arc<dyn Responder>,
    context: Arc<dyn ContextProvider>,
    channel: Arc<dyn MessagingChannel>,
    crm: Arc<dyn CrmSync>,
    handoff: Arc<HandoffService>,
    templates: Arc<FollowupTemplates>,
    config: ProcessorConfig,
}

impl MessageProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        dedup: Arc<DedupGate>,
        loop_guard: Arc<LoopGuard>,
        responder: Arc<dyn Responder>,
        context: Arc<dyn ContextProvider>,
        channel: Arc<dyn MessagingChannel>,
        crm: Arc<dyn CrmSync>,
        handoff: Arc<HandoffService>,
        templates: Arc<FollowupTemplates>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            db,
            dedup,
            loop_guard,
            responder,
            context,
            channel,
            crm,
            handoff,
            templates,
            config,
        }
    }

    /// Process one inbound event end to end.
    pub async fn process(&self, event: InboundEvent) -> Result<Disposition, FunilError> {
        // Fail fast, no side effects: redelivery and echo are normal paths.
        if !self.dedup.check_and_mark(&event.phone, &event.text) {
            info!(phone = event.phone.as_str(), "duplicate delivery suppressed");
            return Ok(Disposition::Duplicate);
        }
        if self.loop_guard.is_echo(&event.phone, &event.text) {
            info!(phone = event.phone.as_str(), "echo of own message suppressed");
            return Ok(Disposition::Echo);
        }

        let lookup =
            conversations::get_or_create(&self.db, &event.phone, event.sender_name.as_deref())
                .await?;
        let conversation = lookup.conversation;
        let mut lead = lookup.lead;

        if conversation.status == ConversationStatus::Handoff {
            info!(
                conversation_id = conversation.id.as_str(),
                "conversation in handoff, ignoring inbound message"
            );
            return Ok(Disposition::Ignored);
        }

        let user_message =
            messages::append(&self.db, &conversation.id, MessageRole::User, &event.text).await?;

        debug!(
            conversation_id = conversation.id.as_str(),
            created = lookup.created,
            received_at = event.received_at.as_str(),
            "inbound message appended"
        );

        // Gather responder context. The +1 covers the message just appended,
        // which is passed separately as the current user message.
        let transcript =
            messages::history(&self.db, &conversation.id, self.config.history_limit + 1).await?;
        let history: Vec<HistoryEntry> = transcript
            .iter()
            .filter(|m| m.id != user_message.id)
            .map(|m| HistoryEntry {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();

        let rag_context = match self
            .context
            .build_context(&event.text, self.config.rag_top_k)
            .await
        {
            Ok(context) => context,
            Err(e) => {
                warn!(error = %e, "context provider failed, continuing without context");
                String::new()
            }
        };

        // The blocking external call happens outside any store transaction.
        let generated = match self
            .responder
            .generate(ReplyRequest {
                user_message: event.text.clone(),
                history,
                stage: conversation.stage,
                lead: lead.clone(),
                rag_context,
            })
            .await
        {
            Ok(generated) => generated,
            Err(e) => {
                warn!(conversation_id = conversation.id.as_str(), error = %e, "responder failed, using fallback");
                GeneratedReply {
                    text: None,
                    handoff_requested: false,
                    usage: TokenUsage::default(),
                }
            }
        };

        debug!(
            conversation_id = conversation.id.as_str(),
            prompt_tokens = generated.usage.prompt_tokens,
            completion_tokens = generated.usage.completion_tokens,
            handoff_requested = generated.handoff_requested,
            "responder call complete"
        );

        if generated.handoff_requested {
            self.handoff
                .request(&conversation.id, "assistente solicitou transferência para humano")
                .await?;
            return Ok(Disposition::HandedOff);
        }

        let (reply, is_fallback) = match generated.text {
            Some(text) if !text.trim().is_empty() => (text, false),
            _ => (self.config.fallback_reply.clone(), true),
        };

        // Durably append the outbound message, then send.
        messages::append(&self.db, &conversation.id, MessageRole::Assistant, &reply).await?;
        match self.channel.send_text(&event.phone, &reply).await {
            Ok(()) => {
                self.loop_guard.record_sent(&event.phone, &reply);
                info!(
                    conversation_id = conversation.id.as_str(),
                    phone = event.phone.as_str(),
                    "reply sent"
                );
            }
            Err(e) => {
                // The transcript already holds the reply; delivery is
                // at-least-once territory and the client may re-ping.
                warn!(conversation_id = conversation.id.as_str(), error = %e, "reply send failed");
            }
        }

        // A fallback advances no state that depends on a real reply.
        if !is_fallback {
            self.advance_stage(&conversation.id, conversation.stage, &event.text, &lead)
                .await;
        }

        // CRM sync, fire-and-forget in both directions.
        if lookup.created {
            self.sync_new_lead(&mut lead).await;
        }
        if !is_fallback
            && let Some(crm_id) = lead.crm_id.as_deref()
            && let Err(e) = self
                .crm
                .add_note(
                    crm_id,
                    &format!("💬 CONVERSA\n\nCliente: {}\n\nAssistente: {reply}", event.text),
                )
                .await
        {
            warn!(conversation_id = conversation.id.as_str(), error = %e, "failed to sync interaction note to CRM");
        }

        // First activation materializes the follow-up batch. The scheduler
        // itself is idempotent; `created` just keeps the common path cheap.
        if lookup.created {
            let activation = parse_iso(&conversation.created_at).unwrap_or_else(chrono::Utc::now);
            scheduler::schedule_defaults(&self.db, &conversation.id, activation, &self.templates)
                .await?;
        }

        if is_fallback {
            Ok(Disposition::FallbackReplied)
        } else {
            Ok(Disposition::Replied)
        }
    }

    /// Keyword-driven stage advancement plus CRM mirror. Never fatal.
    async fn advance_stage(
        &self,
        conversation_id: &str,
        current: funil_core::types::ConversationStage,
        text: &str,
        lead: &funil_core::types::Lead,
    ) {
        let Some(next) = stage::detect_advance(current, text) else {
            return;
        };
        match conversations::transition_stage(&self.db, conversation_id, next, false).await {
            Ok(funil_storage::StageChange::Advanced) => {
                info!(conversation_id, from = %current, to = %next, "stage advanced");
                if let Some(crm_id) = lead.crm_id.as_deref()
                    && let Err(e) = self
                        .crm
                        .update_stage(crm_id, next, ConversationStatus::Active)
                        .await
                {
                    warn!(conversation_id, error = %e, "failed to mirror stage to CRM");
                }
            }
            Ok(funil_storage::StageChange::Unchanged) => {}
            Err(e) => warn!(conversation_id, error = %e, "stage transition failed"),
        }
    }

    /// Push a newly-created lead to the CRM and record the assigned id.
    async fn sync_new_lead(&self, lead: &mut funil_core::types::Lead) {
        match self.crm.create_lead(lead).await {
            Ok(Some(crm_id)) => {
                match leads::set_crm_id(&self.db, &lead.id, &crm_id).await {
                    Ok(true) => lead.crm_id = Some(crm_id),
                    Ok(false) => {
                        // Another worker won the set-once race; reload theirs.
                        if let Ok(Some(current)) = leads::get(&self.db, &lead.id).await {
                            lead.crm_id = current.crm_id;
                        }
                    }
                    Err(e) => warn!(lead_id = lead.id.as_str(), error = %e, "failed to record CRM id"),
                }
            }
            Ok(None) => debug!(lead_id = lead.id.as_str(), "CRM disabled, lead not synced"),
            Err(e) => warn!(lead_id = lead.id.as_str(), error = %e, "failed to sync lead to CRM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::HandoffService;
    use funil_core::time::now_iso;
    use funil_core::types::{ConversationStage, FollowupKind, FollowupStatus};
    use funil_core::StaticContextProvider;
    use funil_followup::FollowupTemplates;
    use funil_storage::queries::followups;
    use funil_test_utils::{MockChannel, MockCrm, MockResponder};
    use std::time::Duration;
    use tempfile::tempdir;

    struct Fixture {
        db: Database,
        processor: MessageProcessor,
        channel: Arc<MockChannel>,
        responder: Arc<MockResponder>,
        crm: Arc<MockCrm>,
        _dir: tempfile::TempDir,
    }

    async fn setup() -> Fixture {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let dedup = Arc::new(DedupGate::new(Duration::from_secs(12)));
        let loop_guard = Arc::new(LoopGuard::new(Duration::from_secs(12)));
        let channel = Arc::new(MockChannel::new());
        let responder = Arc::new(MockResponder::new());
        let crm = Arc::new(MockCrm::new());
        let handoff = Arc::new(HandoffService::new(
            db.clone(),
            channel.clone(),
            crm.clone(),
            loop_guard.clone(),
        ));

        let processor = MessageProcessor::new(
            db.clone(),
            dedup,
            loop_guard,
            responder.clone(),
            Arc::new(StaticContextProvider::new("catálogo de cursos")),
            channel.clone(),
            crm.clone(),
            handoff,
            Arc::new(FollowupTemplates::default_pt_br()),
            ProcessorConfig {
                history_limit: 10,
                rag_top_k: 4,
                fallback_reply: "Desculpe, pode repetir?".to_string(),
            },
        );

        Fixture {
            db,
            processor,
            channel,
            responder,
            crm,
            _dir: dir,
        }
    }

    fn event(phone: &str, text: &str) -> InboundEvent {
        InboundEvent {
            phone: phone.to_string(),
            text: text.to_string(),
            sender_name: Some("Cliente Teste".to_string()),
            received_at: now_iso(),
        }
    }

    #[tokio::test]
    async fn first_contact_creates_everything_and_schedules_followups() {
        let fixture = setup().await;

        let disposition = fixture.processor.process(event("5599", "oi")).await.unwrap();
        assert_eq!(disposition, Disposition::Replied);

        let lookup = conversations::get_or_create(&fixture.db, "5599", None).await.unwrap();
        assert!(!lookup.created);
        let conversation = lookup.conversation;
        assert_eq!(conversation.status, ConversationStatus::Active);
        assert_eq!(conversation.stage, ConversationStage::New);

        // Transcript holds the inbound and the reply, in order.
        let transcript = messages::history(&fixture.db, &conversation.id, 10).await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, MessageRole::User);
        assert_eq!(transcript[0].content, "oi");
        assert_eq!(transcript[1].role, MessageRole::Assistant);
        assert_eq!(transcript[1].content, "Olá! Como posso ajudar?");

        let sent = fixture.channel.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("5599".to_string(), "Olá! Como posso ajudar?".to_string()));

        // Four pending follow-ups at the fixed offsets from activation.
        let batch = followups::list_for_conversation(&fixture.db, &conversation.id)
            .await
            .unwrap();
        assert_eq!(batch.len(), 4);
        assert!(batch.iter().all(|f| f.status == FollowupStatus::Pending));
        let kinds: Vec<FollowupKind> = batch.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, FollowupKind::ALL.to_vec());

        // Lead pushed to the CRM, id recorded set-once.
        assert_eq!(fixture.crm.created_leads().await, vec!["5599".to_string()]);
        assert_eq!(lookup.lead.crm_id.as_deref(), Some("crm-1"));
        assert_eq!(fixture.crm.notes().await.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_delivery_is_suppressed_without_side_effects() {
        let fixture = setup().await;

        assert_eq!(
            fixture.processor.process(event("5599", "oi")).await.unwrap(),
            Disposition::Replied
        );
        assert_eq!(
            fixture.processor.process(event("5599", "oi")).await.unwrap(),
            Disposition::Duplicate
        );

        let lookup = conversations::get_or_create(&fixture.db, "5599", None).await.unwrap();
        let transcript = messages::history(&fixture.db, &lookup.conversation.id, 10)
            .await
            .unwrap();
        assert_eq!(transcript.len(), 2, "the duplicate appended nothing");
        assert_eq!(fixture.channel.sent_count().await, 1);
    }

    #[tokio::test]
    async fn echo_of_own_reply_is_suppressed() {
        let fixture = setup().await;

        fixture.processor.process(event("5599", "oi")).await.unwrap();
        // The channel echoes the bot's reply back as an inbound message.
        assert_eq!(
            fixture
                .processor
                .process(event("5599", "Olá! Como posso ajudar?"))
                .await
                .unwrap(),
            Disposition::Echo
        );

        let lookup = conversations::get_or_create(&fixture.db, "5599", None).await.unwrap();
        let transcript = messages::history(&fixture.db, &lookup.conversation.id, 10)
            .await
            .unwrap();
        assert_eq!(transcript.len(), 2);
    }

    #[tokio::test]
    async fn responder_handoff_cancels_batch_and_silences_the_bot() {
        let fixture = setup().await;

        fixture.processor.process(event("5599", "oi")).await.unwrap();
        let lookup = conversations::get_or_create(&fixture.db, "5599", None).await.unwrap();
        let conv_id = lookup.conversation.id.clone();

        fixture.responder.push_handoff("vou te transferir").await;
        assert_eq!(
            fixture
                .processor
                .process(event("5599", "quero falar com um atendente"))
                .await
                .unwrap(),
            Disposition::HandedOff
        );

        let conversation = conversations::get(&fixture.db, &conv_id).await.unwrap().unwrap();
        assert_eq!(conversation.status, ConversationStatus::Handoff);
        assert!(conversation.handoff_at.is_some());

        let batch = followups::list_for_conversation(&fixture.db, &conv_id).await.unwrap();
        assert_eq!(batch.len(), 4);
        assert!(batch.iter().all(|f| f.status == FollowupStatus::Cancelled));

        // Further inbound traffic is ignored while a human owns the thread.
        assert_eq!(
            fixture.processor.process(event("5599", "alô?")).await.unwrap(),
            Disposition::Ignored
        );
    }

    #[tokio::test]
    async fn empty_reply_falls_back_and_advances_nothing() {
        let fixture = setup().await;

        fixture.responder.push_empty().await;
        assert_eq!(
            fixture
                .processor
                .process(event("5599", "qual o valor da mensalidade?"))
                .await
                .unwrap(),
            Disposition::FallbackReplied
        );

        let lookup = conversations::get_or_create(&fixture.db, "5599", None).await.unwrap();
        let conversation = lookup.conversation;
        // The buying signal is NOT acted on off a fallback reply.
        assert_eq!(conversation.stage, ConversationStage::New);

        let transcript = messages::history(&fixture.db, &conversation.id, 10).await.unwrap();
        assert_eq!(transcript[1].content, "Desculpe, pode repetir?");

        // No interaction note, but the activation batch is still scheduled.
        assert!(fixture.crm.notes().await.is_empty());
        let batch = followups::list_for_conversation(&fixture.db, &conversation.id)
            .await
            .unwrap();
        assert_eq!(batch.len(), 4);
    }

    #[tokio::test]
    async fn buying_signal_advances_stage_and_mirrors_to_crm() {
        let fixture = setup().await;

        fixture.processor.process(event("5599", "oi")).await.unwrap();
        fixture
            .processor
            .process(event("5599", "qual o valor da mensalidade?"))
            .await
            .unwrap();

        let lookup = conversations::get_or_create(&fixture.db, "5599", None).await.unwrap();
        assert_eq!(lookup.conversation.stage, ConversationStage::Negotiation);

        let updates = fixture.crm.stage_updates().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, "crm-1");
        assert_eq!(updates[0].1, ConversationStage::Negotiation);
    }

    #[tokio::test]
    async fn send_failure_keeps_the_reply_durable() {
        let fixture = setup().await;
        fixture.channel.set_failing(true);

        assert_eq!(
            fixture.processor.process(event("5599", "oi")).await.unwrap(),
            Disposition::Replied
        );

        let lookup = conversations::get_or_create(&fixture.db, "5599", None).await.unwrap();
        let transcript = messages::history(&fixture.db, &lookup.conversation.id, 10)
            .await
            .unwrap();
        assert_eq!(transcript.len(), 2, "reply is appended before the send");
    }

    #[tokio::test]
    async fn history_passed_to_responder_excludes_the_current_message() {
        let fixture = setup().await;

        fixture.processor.process(event("5599", "oi")).await.unwrap();
        fixture.processor.process(event("5599", "tenho uma dúvida")).await.unwrap();

        let requests = fixture.responder.requests().await;
        assert_eq!(requests.len(), 2);
        assert!(requests[0].history.is_empty());
        // Second request sees the first exchange but not its own message.
        assert_eq!(requests[1].user_message, "tenho uma dúvida");
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(requests[1].history[0].content, "oi");
        assert_eq!(requests[1].rag_context, "catálogo de cursos");
    }
}
