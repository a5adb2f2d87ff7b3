// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Echo loop guard.
//!
//! Some channels echo the bot's own outbound message back as an inbound
//! webhook. The guard keeps, per phone, only the single most recently sent
//! text and rejects an inbound message that matches it exactly (after
//! trimming surrounding whitespace). Exact match keeps false positives out;
//! semantic loops are deliberately not detected.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

/// Detects verbatim echoes of the bot's own last outbound message.
pub struct LoopGuard {
    last_sent: DashMap<String, (String, Instant)>,
    ttl: Duration,
}

impl LoopGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            last_sent: DashMap::new(),
            ttl,
        }
    }

    /// Record an outbound text for future echo detection.
    pub fn record_sent(&self, phone: &str, text: &str) {
        self.last_sent
            .insert(phone.to_string(), (text.trim().to_string(), Instant::now()));
    }

    /// Whether `text` is a verbatim echo of the last message sent to `phone`
    /// inside the TTL window. Case-sensitive, whitespace-trimmed exact match.
    pub fn is_echo(&self, phone: &str, text: &str) -> bool {
        let Some(entry) = self.last_sent.get(phone) else {
            return false;
        };
        let (sent, at) = entry.value();
        if at.elapsed() >= self.ttl {
            return false;
        }
        let echo = text.trim() == sent;
        if echo {
            debug!(phone, "echo of own outbound message rejected by loop guard");
        }
        echo
    }
}
