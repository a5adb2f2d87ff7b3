// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-backed AI responder for the Funil agent.
//!
//! Implements [`Responder`] over the chat-completions API: assembles the
//! system prompt from the stage-keyed [`PromptLibrary`], sends a bounded
//! slice of the transcript, detects handoff intent in the reply, and returns
//! token usage per call.

pub mod client;
pub mod prompts;

use async_trait::async_trait;
use funil_config::model::OpenAiConfig;
use funil_core::types::{GeneratedReply, MessageRole, ReplyRequest, TokenUsage};
use funil_core::{FunilError, Responder};
use tracing::{debug, warn};

use crate::client::{ChatMessage, OpenAiClient};
pub use crate::prompts::PromptLibrary;

/// pt-BR phrasings that signal the model wants a human to take over.
const HANDOFF_KEYWORDS: &[&str] = &[
    "transferir",
    "passar para",
    "conectar com",
    "atendente",
    "consultor",
    "especialista",
    "n\u{e3}o consigo",
    "n\u{e3}o posso ajudar",
    "aguarde um momento",
    "algu\u{e9}m te retorna",
];

/// [`Responder`] implementation backed by OpenAI chat completions.
pub struct OpenAiResponder {
    client: OpenAiClient,
    prompts: PromptLibrary,
    history_turns: usize,
}

impl OpenAiResponder {
    /// Creates a new responder. Requires `openai.api_key`.
    pub fn new(config: &OpenAiConfig) -> Result<Self, FunilError> {
        Ok(Self {
            client: OpenAiClient::new(config)?,
            prompts: PromptLibrary::default_pt_br(),
            history_turns: config.history_turns,
        })
    }
}

#[async_trait]
impl Responder for OpenAiResponder {
    async fn generate(&self, request: ReplyRequest) -> Result<GeneratedReply, FunilError> {
        let system = self
            .prompts
            .system_prompt(request.stage, &request.lead, &request.rag_context);

        let mut messages = Vec::with_capacity(self.history_turns + 2);
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system,
        });
        let skip = request.history.len().saturating_sub(self.history_turns);
        for entry in request.history.iter().skip(skip) {
            messages.push(ChatMessage {
                role: match entry.role {
                    MessageRole::User => "user".to_string(),
                    MessageRole::Assistant => "assistant".to_string(),
                },
                content: entry.content.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.user_message.clone(),
        });

        let completion = self.client.chat_completion(&messages).await?;

        let text = completion
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from);

        if text.is_none() {
            warn!("model returned an empty completion");
        }

        let handoff_requested = text.as_deref().is_some_and(detect_handoff);
        if handoff_requested {
            debug!("handoff keyword detected in reply");
        }

        let usage = completion
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(GeneratedReply {
            text,
            handoff_requested,
            usage,
        })
    }
}

/// Whether a reply signals the model wants to hand the conversation to a human.
fn detect_handoff(reply: &str) -> bool {
    let reply = reply.to_lowercase();
    HANDOFF_KEYWORDS.iter().any(|keyword| reply.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;
    use funil_core::types::{ConversationStage, HistoryEntry, Lead};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn handoff_is_detected_case_insensitively() {
        assert!(detect_handoff("Vou Transferir você para um atendente."));
        assert!(detect_handoff("não consigo te ajudar com isso"));
        assert!(!detect_handoff("O curso de Direito custa R$ 899 por mês."));
    }

    fn request(history: Vec<HistoryEntry>) -> ReplyRequest {
        ReplyRequest {
            user_message: "qual o valor?".into(),
            history,
            stage: ConversationStage::Negotiation,
            lead: Lead {
                id: "l-1".into(),
                phone: "5599".into(),
                name: Some("Maria".into()),
                email: None,
                profile: None,
                crm_id: None,
                origin: "whatsapp".into(),
                created_at: "2026-01-01T00:00:00.000Z".into(),
                updated_at: "2026-01-01T00:00:00.000Z".into(),
            },
            rag_context: "Mensalidade: R$ 899".into(),
        }
    }

    fn test_config(base_url: &str) -> OpenAiConfig {
        OpenAiConfig {
            api_key: Some("sk-test".into()),
            base_url: base_url.to_string(),
            history_turns: 2,
            timeout_secs: 5,
            ..OpenAiConfig::default()
        }
    }

    #[tokio::test]
    async fn generate_returns_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "A mensalidade é R$ 899. Posso te ajudar com a matrícula?"}}],
                "usage": {"prompt_tokens": 200, "completion_tokens": 30}
            })))
            .mount(&server)
            .await;

        let responder = OpenAiResponder::new(&test_config(&server.uri())).unwrap();
        let reply = responder.generate(request(Vec::new())).await.unwrap();

        assert!(reply.text.unwrap().contains("R$ 899"));
        assert!(!reply.handoff_requested);
        assert_eq!(reply.usage.prompt_tokens, 200);
        assert_eq!(reply.usage.completion_tokens, 30);
    }

    #[tokio::test]
    async fn handoff_phrasing_sets_the_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Vou te transferir para um consultor especializado."}}],
                "usage": {"prompt_tokens": 150, "completion_tokens": 15}
            })))
            .mount(&server)
            .await;

        let responder = OpenAiResponder::new(&test_config(&server.uri())).unwrap();
        let reply = responder.generate(request(Vec::new())).await.unwrap();

        assert!(reply.handoff_requested);
        assert!(reply.text.is_some());
    }

    #[tokio::test]
    async fn empty_completion_becomes_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  "}}]
            })))
            .mount(&server)
            .await;

        let responder = OpenAiResponder::new(&test_config(&server.uri())).unwrap();
        let reply = responder.generate(request(Vec::new())).await.unwrap();

        assert!(reply.text.is_none());
        assert!(!reply.handoff_requested);
        assert_eq!(reply.usage, TokenUsage::default());
    }

    #[tokio::test]
    async fn history_is_bounded_to_the_configured_turns() {
        let server = MockServer::start().await;
        // Capture the request body to count messages.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "ok"}}]
            })))
            .mount(&server)
            .await;

        let responder = OpenAiResponder::new(&test_config(&server.uri())).unwrap();
        let history = (0..6)
            .map(|i| HistoryEntry {
                role: if i % 2 == 0 {
                    MessageRole::User
                } else {
                    MessageRole::Assistant
                },
                content: format!("turno {i}"),
            })
            .collect();
        responder.generate(request(history)).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let messages = body["messages"].as_array().unwrap();
        // system + 2 history turns + current user message.
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1]["content"], "turno 4");
        assert_eq!(messages[3]["content"], "qual o valor?");
    }
}
