// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `funil doctor` command implementation.
//!
//! Checks the local setup: configuration, database, and external
//! collaborator credentials/connectivity. Exits non-zero when any check
//! fails hard.

use colored::Colorize;
use funil_config::FunilConfig;
use funil_storage::Database;
use funil_zapi::ZapiClient;

enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

struct Check {
    name: &'static str,
    status: CheckStatus,
    detail: String,
}

/// Runs all doctor checks and prints a report. Returns the process exit code.
pub async fn run_doctor(config: FunilConfig) -> i32 {
    let mut checks = Vec::new();

    // Config already passed load_and_validate to get here.
    checks.push(Check {
        name: "config",
        status: CheckStatus::Pass,
        detail: format!("agent.name = {}", config.agent.name),
    });

    checks.push(check_database(&config).await);
    checks.push(check_zapi(&config).await);
    checks.push(check_openai(&config));
    checks.push(check_crm(&config));

    println!();
    println!("  funil doctor");
    println!("  {}", "-".repeat(50));
    for check in &checks {
        let symbol = match check.status {
            CheckStatus::Pass => "✓".green().to_string(),
            CheckStatus::Warn => "!".yellow().to_string(),
            CheckStatus::Fail => "✗".red().to_string(),
        };
        println!("  {symbol} {:<10} {}", check.name, check.detail);
    }
    println!();

    let failures = checks
        .iter()
        .filter(|c| matches!(c.status, CheckStatus::Fail))
        .count();
    if failures > 0 {
        println!("  {failures} check(s) failed.");
        1
    } else {
        println!("  All checks passed.");
        0
    }
}

async fn check_database(config: &FunilConfig) -> Check {
    match Database::open(&config.storage.database_path).await {
        Ok(db) => {
            let detail = format!("{} (migrations applied)", config.storage.database_path);
            match db.close().await {
                Ok(()) => Check {
                    name: "database",
                    status: CheckStatus::Pass,
                    detail,
                },
                Err(e) => Check {
                    name: "database",
                    status: CheckStatus::Warn,
                    detail: format!("opened but failed to close cleanly: {e}"),
                },
            }
        }
        Err(e) => Check {
            name: "database",
            status: CheckStatus::Fail,
            detail: e.to_string(),
        },
    }
}

async fn check_zapi(config: &FunilConfig) -> Check {
    let client = match ZapiClient::new(&config.zapi) {
        Ok(client) => client,
        Err(e) => {
            return Check {
                name: "zapi",
                status: CheckStatus::Warn,
                detail: format!("not configured ({e})"),
            };
        }
    };
    match client.get_instance_status().await {
        Ok(status) => {
            let connected = status
                .get("connected")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if connected {
                Check {
                    name: "zapi",
                    status: CheckStatus::Pass,
                    detail: "instance connected".to_string(),
                }
            } else {
                Check {
                    name: "zapi",
                    status: CheckStatus::Warn,
                    detail: "instance reachable but not connected to WhatsApp".to_string(),
                }
            }
        }
        Err(e) => Check {
            name: "zapi",
            status: CheckStatus::Fail,
            detail: e.to_string(),
        },
    }
}

fn check_openai(config: &FunilConfig) -> Check {
    if config.openai.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
        Check {
            name: "openai",
            status: CheckStatus::Pass,
            detail: format!("api key set, model = {}", config.openai.model),
        }
    } else {
        Check {
            name: "openai",
            status: CheckStatus::Fail,
            detail: "openai.api_key is not set".to_string(),
        }
    }
}

fn check_crm(config: &FunilConfig) -> Check {
    if !config.crm.enabled {
        return Check {
            name: "crm",
            status: CheckStatus::Warn,
            detail: "disabled".to_string(),
        };
    }
    Check {
        name: "crm",
        status: CheckStatus::Pass,
        detail: format!("enabled, pipeline {}", config.crm.pipeline_id),
    }
}
