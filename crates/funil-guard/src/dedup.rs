// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound message dedup gate.
//!
//! The upstream channel redelivers webhooks; the gate rejects a second
//! delivery of identical `(phone, text)` content inside a short TTL window.
//! The TTL tracks the channel's redelivery behavior, not conversational
//! cadence — a client legitimately repeating themselves a minute later must
//! pass.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Rejects repeated deliveries of the same inbound message.
pub struct DedupGate {
    entries: DashMap<String, Instant>,
    ttl: Duration,
}

impl DedupGate {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns `true` if the message should proceed, `false` if it is a
    /// duplicate inside the TTL window.
    ///
    /// Check and mark are one operation: the dashmap entry holds its shard
    /// lock across both, so two concurrent deliveries of the same duplicate
    /// cannot both pass.
    pub fn check_and_mark(&self, phone: &str, text: &str) -> bool {
        self.purge_expired();

        let key = fingerprint(phone, text);
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().elapsed() < self.ttl {
                    debug!(phone, "duplicate message rejected by dedup gate");
                    false
                } else {
                    // Expired entry counts as absent; re-mark.
                    entry.insert(Instant::now());
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Instant::now());
                true
            }
        }
    }

    /// Drop expired fingerprints so the map stays bounded by traffic inside
    /// one TTL window.
    fn purge_expired(&self) {
        self.entries.retain(|_, marked_at| marked_at.elapsed() < self.ttl);
    }
}

fn fingerprint(phone: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(phone.as_bytes());
    hasher.update(b":");
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
