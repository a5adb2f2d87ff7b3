// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway.
//!
//! The webhook handler validates the payload, enqueues, and acks — always
//! fast, always 200 to the upstream channel, whatever happens downstream.
//! Slow work (AI generation, sends) belongs to the worker pool so the
//! channel never times out and storms us with redeliveries.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use funil_core::FunilError;
use funil_core::time::now_iso;
use funil_core::types::InboundEvent;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::server::GatewayState;

/// Inbound Z-API webhook payload, reduced to the fields the agent consumes.
#[derive(Debug, Deserialize)]
pub struct ZapiWebhook {
    /// Sender phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Message text.
    #[serde(default)]
    pub text: Option<String>,
    /// True when the message is the instance's own outbound traffic.
    #[serde(default, rename = "fromMe")]
    pub from_me: bool,
    /// Display name of the sender.
    #[serde(default, rename = "senderName")]
    pub sender_name: Option<String>,
}

/// Webhook ack body. The upstream channel only cares about the 200.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Outcome of webhook payload validation.
#[derive(Debug)]
pub(crate) enum WebhookDisposition {
    /// Own outbound traffic echoed by the channel hook.
    Ignored,
    /// Missing or empty phone/text.
    Discarded,
    /// A processable inbound event.
    Event(InboundEvent),
}

pub(crate) fn classify(payload: ZapiWebhook) -> WebhookDisposition {
    if payload.from_me {
        return WebhookDisposition::Ignored;
    }
    let (Some(phone), Some(text)) = (payload.phone, payload.text) else {
        return WebhookDisposition::Discarded;
    };
    if phone.trim().is_empty() || text.trim().is_empty() {
        return WebhookDisposition::Discarded;
    }
    WebhookDisposition::Event(InboundEvent {
        phone,
        text,
        sender_name: payload.sender_name,
        received_at: now_iso(),
    })
}

/// POST /webhook/zapi
pub async fn post_webhook(
    State(state): State<GatewayState>,
    Json(payload): Json<ZapiWebhook>,
) -> Json<WebhookAck> {
    match classify(payload) {
        WebhookDisposition::Ignored => {
            debug!("own outbound message ignored");
            Json(WebhookAck { status: "ignored" })
        }
        WebhookDisposition::Discarded => {
            debug!("webhook payload without phone/text discarded");
            Json(WebhookAck { status: "discarded" })
        }
        WebhookDisposition::Event(event) => {
            if state.queue.enqueue(event) {
                Json(WebhookAck { status: "accepted" })
            } else {
                Json(WebhookAck { status: "dropped" })
            }
        }
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// POST /admin/sweep — the operational "run now" hook for the dispatcher.
pub async fn post_sweep(State(state): State<GatewayState>) -> Response {
    match state.sweeper.sweep_due().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!(error = %e, "manual sweep failed");
            error_response(e)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HandoffRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: String,
    pub status: String,
}

/// POST /admin/conversations/{id}/handoff — operator escalation.
pub async fn post_handoff(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<HandoffRequest>,
) -> Response {
    let reason = body.reason.as_deref().unwrap_or("solicitado pelo operador");
    match state.handoff.request(&id, reason).await {
        Ok(conversation) => Json(ConversationResponse {
            id: conversation.id,
            status: conversation.status.to_string(),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /admin/conversations/{id}/close — operator closure.
pub async fn post_close(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.handoff.close(&id).await {
        Ok(conversation) => Json(ConversationResponse {
            id: conversation.id,
            status: conversation.status.to_string(),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(err: FunilError) -> Response {
    let status = match &err {
        FunilError::NotFound { .. } => StatusCode::NOT_FOUND,
        FunilError::InvalidTransition { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}
