// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `funil-core::types` for use across
//! adapter trait boundaries. This module re-exports them for convenience
//! within the storage crate.

pub use funil_core::types::{
    Conversation, ConversationStage, ConversationStatus, Followup, FollowupKind, FollowupStatus,
    Lead, Message, MessageRole,
};
