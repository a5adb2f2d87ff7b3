// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Funil integration tests.
//!
//! Provides mock adapters for fast, deterministic, CI-runnable tests without
//! external services.
//!
//! # Components
//!
//! - [`MockChannel`] - Messaging channel with captured outbound messages
//! - [`MockResponder`] - AI responder with pre-configured replies
//! - [`MockCrm`] - CRM sink recording synced leads and notes

pub mod mock_channel;
pub mod mock_crm;
pub mod mock_responder;

pub use mock_channel::MockChannel;
pub use mock_crm::MockCrm;
pub use mock_responder::MockResponder;
