// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Funil agent.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Every section is optional and defaults to values
//! that boot a local development instance.

use serde::{Deserialize, Serialize};

/// Top-level Funil configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides via the `FUNIL_` prefix.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FunilConfig {
    /// Agent identity and reply behavior.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Webhook gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Dedup gate and loop guard settings.
    #[serde(default)]
    pub guard: GuardConfig,

    /// Follow-up scheduling and sweep settings.
    #[serde(default)]
    pub followup: FollowupConfig,

    /// Webhook worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Z-API WhatsApp channel settings.
    #[serde(default)]
    pub zapi: ZapiConfig,

    /// OpenAI responder settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// DataCrazy CRM settings.
    #[serde(default)]
    pub crm: CrmConfig,
}

/// Agent identity and reply behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Static apology sent when the responder produces no usable reply.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    /// Pre-baked knowledge-base context for the static context provider.
    #[serde(default)]
    pub knowledge_context: Option<String>,

    /// How many transcript messages are handed to the responder.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Chunk budget passed to the context provider.
    #[serde(default = "default_rag_top_k")]
    pub rag_top_k: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            fallback_reply: default_fallback_reply(),
            knowledge_context: None,
            history_limit: default_history_limit(),
            rag_top_k: default_rag_top_k(),
        }
    }
}

fn default_agent_name() -> String {
    "funil".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_fallback_reply() -> String {
    "Desculpe, tive um problema para responder agora. Pode repetir sua mensagem em instantes? 🙏"
        .to_string()
}

fn default_history_limit() -> usize {
    10
}

fn default_rag_top_k() -> usize {
    4
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "funil.db".to_string()
}

/// Webhook gateway settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_host() -> String {
    "0.0.0.0".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}

/// Dedup gate and loop guard settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// TTL for dedup fingerprints and last-sent echoes, in seconds.
    ///
    /// Tuned to the upstream channel's redelivery window, not to
    /// conversational cadence.
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            dedup_ttl_secs: default_dedup_ttl_secs(),
        }
    }
}

fn default_dedup_ttl_secs() -> u64 {
    12
}

/// Follow-up scheduling and sweep settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FollowupConfig {
    /// Interval between dispatcher sweeps, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Reply-suppression window: a client reply landing within this many
    /// seconds of the batch creation cancels the due follow-up.
    #[serde(default = "default_quiet_threshold_secs")]
    pub quiet_threshold_secs: u64,
}

impl Default for FollowupConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            quiet_threshold_secs: default_quiet_threshold_secs(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_quiet_threshold_secs() -> u64 {
    3600
}

/// Webhook worker pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Number of workers draining the inbound queue.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Bounded queue capacity; a full queue drops the event and relies on
    /// upstream redelivery.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

/// Z-API WhatsApp channel settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ZapiConfig {
    /// Z-API instance id. `None` disables the channel.
    #[serde(default)]
    pub instance: Option<String>,

    /// Z-API instance token.
    #[serde(default)]
    pub token: Option<String>,

    /// Account-level client token sent as the `Client-Token` header.
    #[serde(default)]
    pub client_token: Option<String>,

    /// API base URL.
    #[serde(default = "default_zapi_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_zapi_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt on transient failures.
    #[serde(default = "default_zapi_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries in seconds (doubled on rate limits).
    #[serde(default = "default_zapi_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for ZapiConfig {
    fn default() -> Self {
        Self {
            instance: None,
            token: None,
            client_token: None,
            base_url: default_zapi_base_url(),
            timeout_secs: default_zapi_timeout_secs(),
            max_retries: default_zapi_max_retries(),
            retry_delay_secs: default_zapi_retry_delay_secs(),
        }
    }
}

fn default_zapi_base_url() -> String {
    "https://api.z-api.io/instances".to_string()
}

fn default_zapi_timeout_secs() -> u64 {
    10
}

fn default_zapi_max_retries() -> u32 {
    2
}

fn default_zapi_retry_delay_secs() -> u64 {
    2
}

/// OpenAI responder settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API key. `None` requires the OPENAI_API_KEY environment variable
    /// mapping (`FUNIL_OPENAI_API_KEY`).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier.
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// API base URL.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Maximum tokens to generate per reply.
    #[serde(default = "default_openai_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_openai_temperature")]
    pub temperature: f64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_openai_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt on transient failures.
    #[serde(default = "default_openai_max_retries")]
    pub max_retries: u32,

    /// How many prior transcript turns are sent with each request.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_openai_model(),
            base_url: default_openai_base_url(),
            max_tokens: default_openai_max_tokens(),
            temperature: default_openai_temperature(),
            timeout_secs: default_openai_timeout_secs(),
            max_retries: default_openai_max_retries(),
            history_turns: default_history_turns(),
        }
    }
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_max_tokens() -> u32 {
    500
}

fn default_openai_temperature() -> f64 {
    0.8
}

fn default_openai_timeout_secs() -> u64 {
    30
}

fn default_openai_max_retries() -> u32 {
    2
}

fn default_history_turns() -> usize {
    6
}

/// DataCrazy CRM settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CrmConfig {
    /// Whether CRM synchronization is active at all.
    #[serde(default)]
    pub enabled: bool,

    /// API token.
    #[serde(default)]
    pub api_token: Option<String>,

    /// API base URL.
    #[serde(default = "default_crm_base_url")]
    pub base_url: String,

    /// Pipeline the agent's funnel stages map into.
    #[serde(default = "default_crm_pipeline_id")]
    pub pipeline_id: i64,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_token: None,
            base_url: default_crm_base_url(),
            pipeline_id: default_crm_pipeline_id(),
        }
    }
}

fn default_crm_base_url() -> String {
    "https://crm.datacrazy.io/api/v1".to_string()
}

fn default_crm_pipeline_id() -> i64 {
    1
}
