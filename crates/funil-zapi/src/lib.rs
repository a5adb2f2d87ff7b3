// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Z-API WhatsApp channel adapter for the Funil agent.
//!
//! Implements [`MessagingChannel`] over the Z-API REST endpoints, with
//! bounded timeouts and a small fixed retry budget: rate limits back off at
//! double the base delay, other transient failures at the base delay, and
//! exhausting the budget surfaces as a channel error to the caller.

use std::time::Duration;

use async_trait::async_trait;
use funil_config::model::ZapiConfig;
use funil_core::{FunilError, MessagingChannel};
use serde::Serialize;
use tracing::{debug, info, warn};

/// HTTP client for the Z-API WhatsApp gateway.
#[derive(Debug, Clone)]
pub struct ZapiClient {
    client: reqwest::Client,
    /// `{base_url}/{instance}/token/{token}` — the per-instance URL prefix.
    instance_url: String,
    client_token: String,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Debug, Serialize)]
struct SendTextBody<'a> {
    phone: &'a str,
    message: &'a str,
}

impl ZapiClient {
    /// Creates a new Z-API client.
    ///
    /// Requires `instance`, `token`, and `client_token` to be configured.
    pub fn new(config: &ZapiConfig) -> Result<Self, FunilError> {
        let instance = require(&config.instance, "zapi.instance")?;
        let token = require(&config.token, "zapi.token")?;
        let client_token = require(&config.client_token, "zapi.client_token")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FunilError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            instance_url: format!(
                "{}/{instance}/token/{token}",
                config.base_url.trim_end_matches('/')
            ),
            client_token,
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        })
    }

    /// POST a JSON body to an instance endpoint with the retry policy.
    async fn post_json(
        &self,
        endpoint: &str,
        body: &impl Serialize,
    ) -> Result<serde_json::Value, FunilError> {
        let url = format!("{}/{endpoint}", self.instance_url);
        let mut last_error: Option<FunilError> = None;
        let mut delay = self.retry_delay;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(endpoint, attempt, "retrying Z-API request");
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .header("Client-Token", &self.client_token)
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    warn!(endpoint, attempt, error = %e, "Z-API request failed");
                    last_error = Some(FunilError::Channel {
                        message: format!("Z-API request failed: {e}"),
                        source: Some(Box::new(e)),
                    });
                    delay = self.retry_delay;
                    continue;
                }
            };

            let status = response.status();
            debug!(endpoint, status = %status, attempt, "Z-API response received");

            if status.is_success() {
                return response.json().await.map_err(|e| FunilError::Channel {
                    message: format!("failed to parse Z-API response: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            let body_text = response.text().await.unwrap_or_default();
            last_error = Some(FunilError::Channel {
                message: format!("Z-API returned {status}: {body_text}"),
                source: None,
            });

            // Rate limits back off at double the base delay.
            delay = if status.as_u16() == 429 {
                warn!(endpoint, attempt, "Z-API rate limit hit");
                self.retry_delay * 2
            } else {
                self.retry_delay
            };
        }

        Err(last_error.unwrap_or_else(|| FunilError::Channel {
            message: "Z-API request failed after retries".into(),
            source: None,
        }))
    }

    /// Check the Z-API instance connection status (used by `funil doctor`).
    pub async fn get_instance_status(&self) -> Result<serde_json::Value, FunilError> {
        let url = format!("{}/status", self.instance_url);
        let response = self
            .client
            .get(&url)
            .header("Client-Token", &self.client_token)
            .send()
            .await
            .map_err(|e| FunilError::Channel {
                message: format!("Z-API status request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(FunilError::Channel {
                message: format!("Z-API status returned {status}: {body_text}"),
                source: None,
            });
        }
        response.json().await.map_err(|e| FunilError::Channel {
            message: format!("failed to parse Z-API status response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

fn require(value: &Option<String>, key: &str) -> Result<String, FunilError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(FunilError::Config(format!(
            "{key} is required for the Z-API channel"
        ))),
    }
}

#[async_trait]
impl MessagingChannel for ZapiClient {
    async fn send_text(&self, phone: &str, text: &str) -> Result<(), FunilError> {
        debug!(phone, "sending WhatsApp message via Z-API");
        self.post_json("send-text", &SendTextBody { phone, message: text })
            .await?;
        info!(phone, "WhatsApp message sent");
        Ok(())
    }
}
