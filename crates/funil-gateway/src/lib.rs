// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook HTTP gateway for the Funil agent.
//!
//! Receives Z-API webhooks, filters out own-traffic and malformed payloads,
//! enqueues the rest into the worker pool, and acks immediately. Also
//! exposes the health endpoint and the operational hooks (manual sweep,
//! operator handoff/close).

pub mod handlers;
pub mod server;

pub use server::{GatewayState, ServerConfig, router, start_server};
