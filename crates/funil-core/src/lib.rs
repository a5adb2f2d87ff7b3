// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Funil conversational-commerce agent.
//!
//! This crate provides the foundational trait definitions, error type, and
//! domain types used throughout the Funil workspace. The messaging channel,
//! AI responder, context provider, and CRM adapters all implement traits
//! defined here.

pub mod error;
pub mod time;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::FunilError;
pub use types::{
    Conversation, ConversationStage, ConversationStatus, Followup, FollowupKind, FollowupStatus,
    GeneratedReply, HistoryEntry, InboundEvent, Lead, Message, MessageRole, ReplyRequest,
    TokenUsage,
};

// Re-export all adapter traits at crate root.
pub use traits::{ContextProvider, CrmSync, MessagingChannel, Responder, StaticContextProvider};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funil_error_has_all_variants() {
        // Verify every error variant exists and can be constructed.
        let _config = FunilError::Config("test".into());
        let _storage = FunilError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _channel = FunilError::Channel {
            message: "test".into(),
            source: None,
        };
        let _responder = FunilError::Responder {
            message: "test".into(),
            source: None,
        };
        let _crm = FunilError::Crm {
            message: "test".into(),
            source: None,
        };
        let _not_found = FunilError::NotFound {
            entity: "conversation",
            id: "c-1".into(),
        };
        let _transition = FunilError::InvalidTransition {
            detail: "closed -> active".into(),
        };
        let _timeout = FunilError::Timeout {
            duration: std::time::Duration::from_secs(10),
        };
        let _internal = FunilError::Internal("test".into());
    }

    #[test]
    fn error_messages_name_the_entity() {
        let err = FunilError::NotFound {
            entity: "followup",
            id: "f-9".into(),
        };
        assert_eq!(err.to_string(), "not found: followup f-9");
    }

    #[test]
    fn all_adapter_traits_are_object_safe() {
        // If any trait stops being object-safe, this test won't compile.
        fn _channel(_: &dyn MessagingChannel) {}
        fn _responder(_: &dyn Responder) {}
        fn _context(_: &dyn ContextProvider) {}
        fn _crm(_: &dyn CrmSync) {}
    }
}
