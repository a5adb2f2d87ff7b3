// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Funil agent.

use thiserror::Error;

/// The primary error type used across all Funil adapter traits and core operations.
#[derive(Debug, Error)]
pub enum FunilError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Messaging channel errors (send failure, rate limiting, bad payload).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// AI responder errors (API failure, empty completion, token limits).
    #[error("responder error: {message}")]
    Responder {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// CRM synchronization errors. Always logged, never fatal to conversation state.
    #[error("crm error: {message}")]
    Crm {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced entity does not exist (conversation, follow-up, lead).
    #[error("not found: {entity} {id}")]
    NotFound { entity: &'static str, id: String },

    /// A status or stage transition that the state machine forbids.
    #[error("invalid transition: {detail}")]
    InvalidTransition { detail: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
