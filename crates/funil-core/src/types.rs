// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Funil workspace.
//!
//! Entity structs mirror the storage rows one-to-one: string uuid ids and
//! ISO-8601 text timestamps, with the lifecycle enums typed rather than
//! stringly. The status/stage state machine rules live on the enums so the
//! store and the orchestrator validate transitions the same way.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a conversation.
///
/// `Closed` is terminal. `Handoff` is terminal for the agent: a human owns
/// the thread and nothing automated ever touches it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Paused,
    Handoff,
    Closed,
}

impl ConversationStatus {
    /// Whether the agent may still act on a conversation in this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConversationStatus::Handoff | ConversationStatus::Closed)
    }

    /// Legal status transitions. `Handoff` and `Closed` accept nothing.
    pub fn can_transition_to(self, next: ConversationStatus) -> bool {
        use ConversationStatus::*;
        matches!(
            (self, next),
            (Active, Paused | Handoff | Closed) | (Paused, Active | Handoff | Closed)
        )
    }
}

/// Sales-funnel position of a conversation. Advances monotonically under
/// normal flow; only an operator override may set an arbitrary value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationStage {
    New,
    InService,
    Qualification,
    Negotiation,
    Closing,
    PostSale,
}

impl ConversationStage {
    /// Monotonic ordering used to refuse stage regressions.
    pub fn rank(self) -> u8 {
        match self {
            ConversationStage::New => 0,
            ConversationStage::InService => 1,
            ConversationStage::Qualification => 2,
            ConversationStage::Negotiation => 3,
            ConversationStage::Closing => 4,
            ConversationStage::PostSale => 5,
        }
    }
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Relative offset class of a scheduled follow-up nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum FollowupKind {
    #[strum(serialize = "3h")]
    #[serde(rename = "3h")]
    ThreeHours,
    #[strum(serialize = "1d")]
    #[serde(rename = "1d")]
    OneDay,
    #[strum(serialize = "3d")]
    #[serde(rename = "3d")]
    ThreeDays,
    #[strum(serialize = "7d")]
    #[serde(rename = "7d")]
    SevenDays,
}

impl FollowupKind {
    /// All kinds in scheduling order. A batch always contains exactly these four.
    pub const ALL: [FollowupKind; 4] = [
        FollowupKind::ThreeHours,
        FollowupKind::OneDay,
        FollowupKind::ThreeDays,
        FollowupKind::SevenDays,
    ];

    /// Offset from the conversation's activation time.
    pub fn offset(self) -> chrono::Duration {
        match self {
            FollowupKind::ThreeHours => chrono::Duration::hours(3),
            FollowupKind::OneDay => chrono::Duration::days(1),
            FollowupKind::ThreeDays => chrono::Duration::days(3),
            FollowupKind::SevenDays => chrono::Duration::days(7),
        }
    }
}

/// Lifecycle status of a follow-up. Terminal once it leaves `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FollowupStatus {
    Pending,
    Sent,
    Cancelled,
}

/// A contact identity, keyed by phone number. Never deleted by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Free-form profile attributes as a JSON object string.
    pub profile: Option<String>,
    /// External CRM id. Nullable until the first successful sync, then set once.
    pub crm_id: Option<String>,
    pub origin: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One engagement with a phone number. At most one `Active` row per phone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub phone: String,
    pub lead_id: String,
    pub status: ConversationStatus,
    pub stage: ConversationStage,
    pub last_message_at: Option<String>,
    pub handoff_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Immutable transcript entry. Ordering key is `created_at`, ties broken by
/// insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: String,
}

/// A scheduled nudge tied to conversation inactivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Followup {
    pub id: String,
    pub conversation_id: String,
    pub kind: FollowupKind,
    pub scheduled_for: String,
    pub status: FollowupStatus,
    pub message: String,
    pub created_at: String,
    pub executed_at: Option<String>,
}

/// An inbound webhook event that survived the gateway's payload filters.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub phone: String,
    pub text: String,
    pub sender_name: Option<String>,
    pub received_at: String,
}

/// Token accounting for a single responder call. Returned per call rather
/// than accumulated in hidden client state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// One prior turn handed to the responder.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
}

/// Everything the responder needs to produce a reply.
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    pub user_message: String,
    pub history: Vec<HistoryEntry>,
    pub stage: ConversationStage,
    pub lead: Lead,
    pub rag_context: String,
}

/// The responder's output. `text: None` means the call ran but produced no
/// usable reply; the orchestrator substitutes the fallback apology.
#[derive(Debug, Clone)]
pub struct GeneratedReply {
    pub text: Option<String>,
    pub handoff_requested: bool,
    pub usage: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            ConversationStatus::Active,
            ConversationStatus::Paused,
            ConversationStatus::Handoff,
            ConversationStatus::Closed,
        ] {
            let s = status.to_string();
            assert_eq!(ConversationStatus::from_str(&s).unwrap(), status);
        }
        assert_eq!(ConversationStatus::Active.to_string(), "active");
    }

    #[test]
    fn stage_wire_form_is_snake_case() {
        assert_eq!(ConversationStage::InService.to_string(), "in_service");
        assert_eq!(
            ConversationStage::from_str("post_sale").unwrap(),
            ConversationStage::PostSale
        );
    }

    #[test]
    fn followup_kind_wire_values() {
        assert_eq!(FollowupKind::ThreeHours.to_string(), "3h");
        assert_eq!(FollowupKind::from_str("7d").unwrap(), FollowupKind::SevenDays);
    }

    #[test]
    fn followup_offsets_are_fixed() {
        assert_eq!(FollowupKind::ThreeHours.offset(), chrono::Duration::hours(3));
        assert_eq!(FollowupKind::OneDay.offset(), chrono::Duration::days(1));
        assert_eq!(FollowupKind::ThreeDays.offset(), chrono::Duration::days(3));
        assert_eq!(FollowupKind::SevenDays.offset(), chrono::Duration::days(7));
    }

    #[test]
    fn status_machine_rejects_leaving_terminal_states() {
        use ConversationStatus::*;
        assert!(Active.can_transition_to(Handoff));
        assert!(Active.can_transition_to(Closed));
        assert!(Paused.can_transition_to(Active));
        assert!(!Handoff.can_transition_to(Active));
        assert!(!Closed.can_transition_to(Active));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn stage_rank_is_strictly_increasing() {
        let stages = [
            ConversationStage::New,
            ConversationStage::InService,
            ConversationStage::Qualification,
            ConversationStage::Negotiation,
            ConversationStage::Closing,
            ConversationStage::PostSale,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 120,
            completion_tokens: 30,
        };
        assert_eq!(usage.total(), 150);
    }
}
