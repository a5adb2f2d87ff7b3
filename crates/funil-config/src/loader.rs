// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./funil.toml` > `~/.config/funil/funil.toml` >
//! `/etc/funil/funil.toml`, with environment variable overrides via the
//! `FUNIL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::FunilConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/funil/funil.toml` (system-wide)
/// 3. `~/.config/funil/funil.toml` (user XDG config)
/// 4. `./funil.toml` (local directory)
/// 5. `FUNIL_*` environment variables
pub fn load_config() -> Result<FunilConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FunilConfig::default()))
        .merge(Toml::file("/etc/funil/funil.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("funil/funil.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("funil.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<FunilConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FunilConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<FunilConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FunilConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `FUNIL_ZAPI_CLIENT_TOKEN` must map to
/// `zapi.client_token`, not `zapi.client.token`.
fn env_provider() -> Env {
    Env::prefixed("FUNIL_").map(|key| {
        // `key` is the lowercased env var name with the prefix stripped,
        // e.g. FUNIL_ZAPI_CLIENT_TOKEN -> "zapi_client_token".
        let mapped = key
            .as_str()
            .replacen("agent_", "agent.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("guard_", "guard.", 1)
            .replacen("followup_", "followup.", 1)
            .replacen("worker_", "worker.", 1)
            .replacen("zapi_", "zapi.", 1)
            .replacen("openai_", "openai.", 1)
            .replacen("crm_", "crm.", 1);
        mapped.into()
    })
}
