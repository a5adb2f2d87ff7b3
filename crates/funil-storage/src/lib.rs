// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Funil agent.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for leads,
//! conversations, messages, and follow-ups. Every public operation is one
//! transaction; callers never observe partial writes.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;
pub use queries::conversations::{ConversationLookup, StageChange};
pub use queries::followups::NewFollowup;
