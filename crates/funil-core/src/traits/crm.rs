// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CRM synchronization trait.

use async_trait::async_trait;

use crate::error::FunilError;
use crate::types::{ConversationStage, ConversationStatus, Lead};

/// Adapter for pushing leads, notes, and funnel position to an external CRM.
///
/// Every call is fire-and-forget from the orchestrator's point of view:
/// failures are logged and never roll back conversation state.
#[async_trait]
pub trait CrmSync: Send + Sync {
    /// Creates the lead remotely. Returns the external CRM id if one was
    /// assigned; `None` when the adapter is disabled.
    async fn create_lead(&self, lead: &Lead) -> Result<Option<String>, FunilError>;

    /// Mirrors a stage/status change onto the remote lead.
    async fn update_stage(
        &self,
        crm_id: &str,
        stage: ConversationStage,
        status: ConversationStatus,
    ) -> Result<(), FunilError>;

    /// Attaches a free-form note to the remote lead.
    async fn add_note(&self, crm_id: &str, note: &str) -> Result<(), FunilError>;
}
