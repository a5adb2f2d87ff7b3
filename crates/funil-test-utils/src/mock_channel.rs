// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging channel for deterministic testing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use funil_core::traits::MessagingChannel;
use funil_core::FunilError;

/// A mock messaging channel.
///
/// Messages passed to `send_text()` are captured and retrievable via
/// [`sent_messages`](MockChannel::sent_messages); `set_failing(true)` makes
/// every send fail, for exercising the best-effort paths.
#[derive(Default)]
pub struct MockChannel {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    failing: AtomicBool,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(phone, text)` pairs sent so far, in order.
    pub async fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    /// Number of messages sent so far.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessagingChannel for MockChannel {
    async fn send_text(&self, phone: &str, text: &str) -> Result<(), FunilError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FunilError::Channel {
                message: "mock channel failure".into(),
                source: None,
            });
        }
        self.sent
            .lock()
            .await
            .push((phone.to_string(), text.to_string()));
        Ok(())
    }
}
