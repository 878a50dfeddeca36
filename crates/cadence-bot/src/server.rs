//! Webhook endpoint for the chat platform's event subscription.
//!
//! The route always answers 200: a non-2xx makes the platform redeliver,
//! and redelivery is already handled by the dedup gate. Malformed envelopes
//! are logged and dropped.

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::dispatcher::{self, InboundMessage};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Event envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    header: EventHeader,
    event: EventBody,
}

#[derive(Debug, Deserialize)]
struct EventHeader {
    event_id: String,
}

#[derive(Debug, Deserialize)]
struct EventBody {
    message: EventMessage,
}

#[derive(Debug, Deserialize)]
struct EventMessage {
    message_id: String,
    chat_id: String,
    #[serde(default)]
    chat_type: String,
    message_type: String,
    content: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum Router with the webhook route and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/healthz", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("cadence bot listening on http://localhost:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

async fn webhook(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    // Parsed by hand rather than through the Json extractor: a body that is
    // not JSON must still be answered with a 200, or the platform redelivers.
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "webhook body was not JSON, dropping");
            return Json(json!({ "code": 0 }));
        }
    };

    // Subscription handshake: echo the challenge.
    if let Some(challenge) = payload.get("challenge").and_then(Value::as_str) {
        return Json(json!({ "challenge": challenge }));
    }

    let envelope: EventEnvelope = match serde_json::from_value(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "event envelope did not match schema, dropping");
            return Json(json!({ "code": 0 }));
        }
    };

    // At-most-once processing per event id, before any side effect.
    if !state.dedup.insert(&envelope.header.event_id) {
        tracing::info!(event_id = %envelope.header.event_id, "duplicate event, skipping");
        return Json(json!({ "code": 0 }));
    }

    let msg = InboundMessage {
        message_id: envelope.event.message.message_id,
        chat_id: envelope.event.message.chat_id,
        chat_type: envelope.event.message.chat_type,
        message_type: envelope.event.message.message_type,
        content: envelope.event.message.content,
    };

    // Handle off the request path so the platform gets its 200 promptly.
    tokio::spawn(dispatcher::handle_event(state, msg));
    Json(json!({ "code": 0 }))
}
