// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up scheduling and dispatch for the Funil agent.
//!
//! - [`scheduler`] materializes the four-nudge batch when a conversation
//!   activates, idempotently, and handles cancellation and rescheduling.
//! - [`FollowupWorker`] sweeps for due rows on a fixed interval and resolves
//!   each one: cancel on engagement or handoff, send otherwise.
//! - [`FollowupTemplates`] is the read-mostly table of pre-rendered nudge
//!   texts, built once at startup.

pub mod scheduler;
pub mod templates;
pub mod worker;

pub use templates::FollowupTemplates;
pub use worker::{FollowupWorker, SweepStats};
