use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use honeypot_core::session::SessionSummary;
use honeypot_core::{InboundMessage, OutboundReply};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::state::AppState;

pub const SESSION_HEADER: &str = "x-session-id";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const UNAVAILABLE_REPLY: &str = "Service temporarily unavailable";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "alive",
        "service": "honeypot",
        "ts": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Main conversational endpoint. Never fails at the HTTP level: whatever
/// arrives is turned into a message and answered with a reply payload.
/// The configured reply delay is slept after the session lock is released.
pub async fn honeypot_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<OutboundReply> {
    let inbound = InboundMessage::from_body(&body)
        .or_session_id(header_str(&headers, SESSION_HEADER).map(ToString::to_string));

    if !state.authorized(header_str(&headers, API_KEY_HEADER)) {
        tracing::warn!("Rejected request with missing or wrong API key");
        // nothing is stored for a rejected caller, but the payload still needs an id
        let session_id = inbound
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        return Json(OutboundReply::new(UNAVAILABLE_REPLY, session_id, false));
    }

    let reply = state.orchestrator.handle(inbound).await;
    let pause = state.reply_delay.sample();
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
    Json(reply)
}

pub async fn session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>, (StatusCode, Json<Value>)> {
    match state.orchestrator.store().summary(&session_id).await {
        Some(summary) => Ok(Json(summary)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "message": "session not found" })),
        )),
    }
}
