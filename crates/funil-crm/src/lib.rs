// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! DataCrazy CRM synchronization adapter for the Funil agent.
//!
//! Implements [`CrmSync`] over the DataCrazy REST API. Every call is
//! best-effort from the orchestrator's point of view; this crate only turns
//! HTTP failures into [`FunilError::Crm`] values for the caller to log.
//! [`NoopCrm`] stands in when `crm.enabled = false`.

pub mod stage_map;

use std::time::Duration;

use async_trait::async_trait;
use funil_config::model::CrmConfig;
use funil_core::types::{ConversationStage, ConversationStatus, Lead};
use funil_core::{CrmSync, FunilError};
use serde::Deserialize;
use tracing::{debug, info};

/// HTTP client for the DataCrazy CRM.
#[derive(Debug, Clone)]
pub struct DataCrazyClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    pipeline_id: i64,
}

#[derive(Debug, Deserialize)]
struct CreatedLead {
    data: Option<CreatedLeadData>,
}

#[derive(Debug, Deserialize)]
struct CreatedLeadData {
    id: serde_json::Value,
}

impl DataCrazyClient {
    /// Creates a new DataCrazy client. Requires `crm.api_token`.
    pub fn new(config: &CrmConfig) -> Result<Self, FunilError> {
        let api_token = config
            .api_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| FunilError::Config("crm.api_token is required when CRM is enabled".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FunilError::Crm {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            pipeline_id: config.pipeline_id,
        })
    }

    async fn post(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, FunilError> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| FunilError::Crm {
                message: format!("DataCrazy request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(FunilError::Crm {
                message: format!("DataCrazy returned {status}: {body_text}"),
                source: None,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CrmSync for DataCrazyClient {
    async fn create_lead(&self, lead: &Lead) -> Result<Option<String>, FunilError> {
        // Leads already synced keep their id; creation is one-shot.
        if let Some(crm_id) = lead.crm_id.as_deref() {
            debug!(crm_id, "lead already synced to CRM");
            return Ok(Some(crm_id.to_string()));
        }

        let body = serde_json::json!({
            "name": lead.name.as_deref().unwrap_or("Lead sem nome"),
            "phone": lead.phone,
            "email": lead.email,
            "origin": lead.origin,
            "pipeline_id": self.pipeline_id,
        });

        let response = self.post("leads", body).await?;
        let created: CreatedLead = response.json().await.map_err(|e| FunilError::Crm {
            message: format!("failed to parse DataCrazy response: {e}"),
            source: Some(Box::new(e)),
        })?;

        let crm_id = created.data.map(|d| match d.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        if let Some(id) = crm_id.as_deref() {
            info!(phone = lead.phone.as_str(), crm_id = id, "lead created in CRM");
        }
        Ok(crm_id)
    }

    async fn update_stage(
        &self,
        crm_id: &str,
        stage: ConversationStage,
        status: ConversationStatus,
    ) -> Result<(), FunilError> {
        let body = serde_json::json!({
            "pipeline_id": self.pipeline_id,
            "stage_id": stage_map::pipeline_stage_id(stage),
            "custom_fields": {
                "stage_interno": stage.to_string(),
                "status_conversa": status.to_string(),
            },
        });
        self.post(&format!("leads/{crm_id}/stage"), body).await?;
        debug!(crm_id, stage = %stage, "CRM stage updated");
        Ok(())
    }

    async fn add_note(&self, crm_id: &str, note: &str) -> Result<(), FunilError> {
        let body = serde_json::json!({ "content": note });
        self.post(&format!("leads/{crm_id}/notes"), body).await?;
        debug!(crm_id, "CRM note added");
        Ok(())
    }
}

/// CRM adapter used when synchronization is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCrm;

#[async_trait]
impl CrmSync for NoopCrm {
    async fn create_lead(&self, _lead: &Lead) -> Result<Option<String>, FunilError> {
        Ok(None)
    }

    async fn update_stage(
        &self,
        _crm_id: &str,
        _stage: ConversationStage,
        _status: ConversationStatus,
    ) -> Result<(), FunilError> {
        Ok(())
    }

    async fn add_note(&self, _crm_id: &str, _note: &str) -> Result<(), FunilError> {
        Ok(())
    }
}
