// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI responder trait for reply generation.

use async_trait::async_trait;

use crate::error::FunilError;
use crate::types::{GeneratedReply, ReplyRequest};

/// Adapter that turns a conversation context into a reply.
///
/// Implementations are explicitly constructed and shared by `Arc`; token
/// usage is returned per call in [`GeneratedReply`] instead of being
/// accumulated in hidden client state.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Generates a reply for the given request.
    ///
    /// `Err` means the call itself failed after retries. `Ok` with
    /// `text: None` means the model produced nothing usable; both are
    /// handled by the orchestrator's fallback path.
    async fn generate(&self, request: ReplyRequest) -> Result<GeneratedReply, FunilError>;
}
