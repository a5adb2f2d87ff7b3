// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging channel trait for outbound chat delivery (WhatsApp via Z-API, etc.).

use async_trait::async_trait;

use crate::error::FunilError;

/// Adapter for the outbound side of a messaging platform.
///
/// Delivery is at-least-once from the platform's point of view; the caller
/// is responsible for dedup and loop suppression on the inbound side.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    /// Sends a plain-text message to the given phone number.
    async fn send_text(&self, phone: &str, text: &str) -> Result<(), FunilError>;
}
