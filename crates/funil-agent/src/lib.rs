// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Orchestration layer for the Funil agent.
//!
//! The [`MessageProcessor`] is the central coordinator for one inbound
//! message:
//! - Consults the dedup gate and loop guard (fail fast, no side effects)
//! - Loads or creates the conversation and lead
//! - Calls the AI responder with the conversation context
//! - Appends and sends the reply, registering it with the loop guard
//! - Advances the funnel stage from detected intent
//! - Schedules the follow-up batch on first activation
//!
//! [`HandoffService`] owns escalation and the operator actions;
//! [`WorkerPool`] turns webhook acks into background processing with
//! explicit backpressure; [`shutdown`] wires signal handling.

pub mod handoff;
pub mod pool;
pub mod processor;
pub mod shutdown;
pub mod stage;

pub use handoff::HandoffService;
pub use pool::{QueueHandle, WorkerPool};
pub use processor::{Disposition, MessageProcessor, ProcessorConfig};
