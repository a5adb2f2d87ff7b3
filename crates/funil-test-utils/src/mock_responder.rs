// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI responder with pre-configured replies.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use funil_core::traits::Responder;
use funil_core::types::{GeneratedReply, ReplyRequest, TokenUsage};
use funil_core::FunilError;

/// A mock responder.
///
/// Replies queued with [`push_reply`](MockResponder::push_reply) are returned
/// in order; once the queue is empty the default reply is used. Every request
/// handed to `generate()` is captured for assertion.
pub struct MockResponder {
    queued: Mutex<VecDeque<GeneratedReply>>,
    default_reply: GeneratedReply,
    requests: Mutex<Vec<ReplyRequest>>,
}

impl MockResponder {
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            default_reply: reply("Olá! Como posso ajudar?"),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plain text reply.
    pub async fn push_reply(&self, text: &str) {
        self.queued.lock().await.push_back(reply(text));
    }

    /// Queue a reply that requests handoff to a human.
    pub async fn push_handoff(&self, text: &str) {
        let mut generated = reply(text);
        generated.handoff_requested = true;
        self.queued.lock().await.push_back(generated);
    }

    /// Queue an empty (`text: None`) reply, driving the fallback path.
    pub async fn push_empty(&self) {
        self.queued.lock().await.push_back(GeneratedReply {
            text: None,
            handoff_requested: false,
            usage: TokenUsage::default(),
        });
    }

    /// Every request seen so far.
    pub async fn requests(&self) -> Vec<ReplyRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockResponder {
    fn default() -> Self {
        Self::new()
    }
}

fn reply(text: &str) -> GeneratedReply {
    GeneratedReply {
        text: Some(text.to_string()),
        handoff_requested: false,
        usage: TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 25,
        },
    }
}

#[async_trait]
impl Responder for MockResponder {
    async fn generate(&self, request: ReplyRequest) -> Result<GeneratedReply, FunilError> {
        self.requests.lock().await.push(request);
        let queued = self.queued.lock().await.pop_front();
        Ok(queued.unwrap_or_else(|| self.default_reply.clone()))
    }
}
