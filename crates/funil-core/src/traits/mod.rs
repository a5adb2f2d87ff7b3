// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Every external collaborator of the orchestrator — the messaging channel,
//! the AI responder, the knowledge-base context provider, and the CRM — sits
//! behind one of these traits so it can be replaced by a mock in tests or a
//! no-op in deployments that do not use it.

pub mod channel;
pub mod context;
pub mod crm;
pub mod responder;

pub use channel::MessagingChannel;
pub use context::{ContextProvider, StaticContextProvider};
pub use crm::CrmSync;
pub use responder::Responder;
