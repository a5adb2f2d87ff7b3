// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the OpenAI chat-completions API.
//!
//! Handles request construction, bearer authentication, and transient error
//! retry (408, 429, 5xx) with attempt-scaled backoff.

use std::time::Duration;

use funil_config::model::OpenAiConfig;
use funil_core::FunilError;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A chat message in OpenAI wire format.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
}

/// A chat-completions response, reduced to what the responder consumes.
#[derive(Debug, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

/// HTTP client for OpenAI chat completions.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    completions_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAiClient {
    /// Creates a new OpenAI API client. Requires `openai.api_key`.
    pub fn new(config: &OpenAiConfig) -> Result<Self, FunilError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                FunilError::Config("openai.api_key is required for the responder".into())
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                FunilError::Config(format!("invalid API key header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FunilError::Responder {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            completions_url: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    /// Sends a chat-completion request and returns the parsed response.
    pub async fn chat_completion(
        &self,
        messages: &[ChatMessage],
    ) -> Result<ChatCompletion, FunilError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut last_error: Option<FunilError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying completion request after transient error");
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
            }

            let response = match self
                .client
                .post(&self.completions_url)
                .json(&request)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!(attempt, error = %e, "completion request failed");
                    last_error = Some(FunilError::Responder {
                        message: format!("HTTP request failed: {e}"),
                        source: Some(Box::new(e)),
                    });
                    continue;
                }
            };

            let status = response.status();
            debug!(status = %status, attempt, "completion response received");

            if status.is_success() {
                return response.json().await.map_err(|e| FunilError::Responder {
                    message: format!("failed to parse API response: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            let body = response.text().await.unwrap_or_default();
            let error = FunilError::Responder {
                message: format!("API returned {status}: {body}"),
                source: None,
            };
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, "transient error, will retry");
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_error.unwrap_or_else(|| FunilError::Responder {
            message: "completion request failed after retries".into(),
            source: None,
        }))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503)
}

#[cfg(test)]
mod tests {
    use super::*;
    use funil_config::model::OpenAiConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> OpenAiConfig {
        OpenAiConfig {
            api_key: Some("sk-test".into()),
            base_url: base_url.to_string(),
            max_retries: 1,
            timeout_secs: 5,
            ..OpenAiConfig::default()
        }
    }

    fn completion_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 40}
        })
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let err = OpenAiClient::new(&OpenAiConfig::default()).unwrap_err();
        assert!(matches!(err, FunilError::Config(_)));
    }

    #[tokio::test]
    async fn completion_parses_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Olá!")))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&test_config(&server.uri())).unwrap();
        let completion = client
            .chat_completion(&[ChatMessage {
                role: "user".into(),
                content: "oi".into(),
            }])
            .await
            .unwrap();

        assert_eq!(
            completion.choices[0].message.content.as_deref(),
            Some("Olá!")
        );
        let usage = completion.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 120);
        assert_eq!(usage.completion_tokens, 40);
    }

    #[tokio::test]
    async fn transient_error_is_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("depois")))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&test_config(&server.uri())).unwrap();
        let completion = client
            .chat_completion(&[ChatMessage {
                role: "user".into(),
                content: "oi".into(),
            }])
            .await
            .unwrap();
        assert_eq!(
            completion.choices[0].message.content.as_deref(),
            Some("depois")
        );
    }

    #[tokio::test]
    async fn non_transient_error_fails_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&test_config(&server.uri())).unwrap();
        let err = client
            .chat_completion(&[ChatMessage {
                role: "user".into(),
                content: "oi".into(),
            }])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
