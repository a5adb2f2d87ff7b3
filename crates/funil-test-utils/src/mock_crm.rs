// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock CRM sink.

use async_trait::async_trait;
use tokio::sync::Mutex;

use funil_core::traits::CrmSync;
use funil_core::types::{ConversationStage, ConversationStatus, Lead};
use funil_core::FunilError;

/// A mock CRM recording every call for assertion.
///
/// `create_lead` assigns sequential ids (`crm-1`, `crm-2`, ...).
#[derive(Default)]
pub struct MockCrm {
    created: Mutex<Vec<String>>,
    stage_updates: Mutex<Vec<(String, ConversationStage, ConversationStatus)>>,
    notes: Mutex<Vec<(String, String)>>,
}

impl MockCrm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phones of leads created so far.
    pub async fn created_leads(&self) -> Vec<String> {
        self.created.lock().await.clone()
    }

    /// All stage updates recorded so far.
    pub async fn stage_updates(&self) -> Vec<(String, ConversationStage, ConversationStatus)> {
        self.stage_updates.lock().await.clone()
    }

    /// All `(crm_id, note)` pairs recorded so far.
    pub async fn notes(&self) -> Vec<(String, String)> {
        self.notes.lock().await.clone()
    }
}

#[async_trait]
impl CrmSync for MockCrm {
    async fn create_lead(&self, lead: &Lead) -> Result<Option<String>, FunilError> {
        let mut created = self.created.lock().await;
        created.push(lead.phone.clone());
        Ok(Some(format!("crm-{}", created.len())))
    }

    async fn update_stage(
        &self,
        crm_id: &str,
        stage: ConversationStage,
        status: ConversationStatus,
    ) -> Result<(), FunilError> {
        self.stage_updates
            .lock()
            .await
            .push((crm_id.to_string(), stage, status));
        Ok(())
    }

    async fn add_note(&self, crm_id: &str, note: &str) -> Result<(), FunilError> {
        self.notes
            .lock()
            .await
            .push((crm_id.to_string(), note.to_string()));
        Ok(())
    }
}
