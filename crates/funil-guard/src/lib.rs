// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound suppression guards for the Funil agent.
//!
//! Two narrow, fail-fast checks run before any side effect:
//!
//! - [`DedupGate`] — rejects a repeated delivery of the same inbound message
//!   within a short TTL window (atomic check-and-mark).
//! - [`LoopGuard`] — rejects an inbound message that is an exact echo of the
//!   bot's own most recent outbound message to that phone.
//!
//! Both suppressions are normal paths, not errors: callers log them at info
//! level and acknowledge the webhook as handled.

pub mod dedup;
pub mod loop_guard;

pub use dedup::DedupGate;
pub use loop_guard::LoopGuard;
