// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `funil serve` command implementation.
//!
//! Wires the full agent: SQLite conversation store, dedup/loop guards,
//! Z-API channel, OpenAI responder, CRM sync, worker pool, follow-up
//! dispatcher, and the webhook gateway. Supports graceful shutdown via
//! signal handlers.

use std::sync::Arc;
use std::time::Duration;

use funil_agent::{HandoffService, MessageProcessor, ProcessorConfig, WorkerPool, shutdown};
use funil_config::FunilConfig;
use funil_core::{ContextProvider, CrmSync, FunilError, MessagingChannel, Responder};
use funil_core::StaticContextProvider;
use funil_crm::{DataCrazyClient, NoopCrm};
use funil_followup::{FollowupTemplates, FollowupWorker};
use funil_gateway::{GatewayState, ServerConfig};
use funil_guard::{DedupGate, LoopGuard};
use funil_responder::OpenAiResponder;
use funil_storage::Database;
use funil_zapi::ZapiClient;
use tracing::{error, info, warn};

/// Runs the `funil serve` command until a shutdown signal arrives.
pub async fn run_serve(config: FunilConfig) -> Result<(), FunilError> {
    init_tracing(&config.agent.log_level);

    info!("starting funil serve");

    let db = Database::open(&config.storage.database_path).await?;

    let dedup_ttl = Duration::from_secs(config.guard.dedup_ttl_secs);
    let dedup = Arc::new(DedupGate::new(dedup_ttl));
    let loop_guard = Arc::new(LoopGuard::new(dedup_ttl));
    let templates = Arc::new(FollowupTemplates::default_pt_br());

    let channel: Arc<dyn MessagingChannel> = Arc::new(ZapiClient::new(&config.zapi).map_err(
        |e| {
            error!(error = %e, "failed to initialize Z-API channel");
            e
        },
    )?);

    let responder: Arc<dyn Responder> =
        Arc::new(OpenAiResponder::new(&config.openai).map_err(|e| {
            error!(error = %e, "failed to initialize OpenAI responder");
            e
        })?);

    let crm: Arc<dyn CrmSync> = if config.crm.enabled {
        info!("CRM sync enabled");
        Arc::new(DataCrazyClient::new(&config.crm)?)
    } else {
        info!("CRM sync disabled");
        Arc::new(NoopCrm)
    };

    let context: Arc<dyn ContextProvider> = Arc::new(StaticContextProvider::new(
        config.agent.knowledge_context.clone().unwrap_or_default(),
    ));

    let handoff = Arc::new(HandoffService::new(
        db.clone(),
        channel.clone(),
        crm.clone(),
        loop_guard.clone(),
    ));

    let processor = Arc::new(MessageProcessor::new(
        db.clone(),
        dedup,
        loop_guard,
        responder,
        context,
        channel.clone(),
        crm,
        handoff.clone(),
        templates,
        ProcessorConfig {
            history_limit: config.agent.history_limit,
            rag_top_k: config.agent.rag_top_k,
            fallback_reply: config.agent.fallback_reply.clone(),
        },
    ));

    let cancel = shutdown::install_signal_handler();

    let pool = WorkerPool::spawn(
        processor,
        config.worker.workers,
        config.worker.queue_capacity,
        cancel.clone(),
    );

    let sweeper = Arc::new(FollowupWorker::new(
        db.clone(),
        channel,
        Duration::from_secs(config.followup.sweep_interval_secs),
        Duration::from_secs(config.followup.quiet_threshold_secs),
    ));
    let sweeper_task = tokio::spawn(sweeper.clone().run(cancel.clone()));

    let state = GatewayState {
        queue: pool.handle(),
        sweeper,
        handoff,
        start_time: std::time::Instant::now(),
    };
    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
    };

    // Serves until the cancellation token fires.
    funil_gateway::start_server(&server_config, state, cancel.clone()).await?;

    info!("draining workers");
    pool.join().await;
    if let Err(e) = sweeper_task.await {
        warn!(error = %e, "follow-up dispatcher task panicked");
    }

    db.close().await?;
    info!("funil stopped");
    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("funil={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
