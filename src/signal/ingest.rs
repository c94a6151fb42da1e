//! Signal Ingestion
//! Mission: Bridge external trading events into chat under a shared secret
//!
//! The bridge reuses the exact persist-then-broadcast pipeline a human
//! admin post takes; the only difference is shared-secret authorization
//! in place of per-connection role checks.

use crate::api::AppState;
use crate::auth::UserStore;
use crate::chat::pipeline::{ChatError, MessagePipeline};
use crate::models::{MessageKind, Room, RoomType, SignalEvent};
use crate::rooms::RoomStore;
use crate::signal::render::render_signal;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

/// Name fragments the futures room is known under when neither the
/// explicit id nor the type tag resolves. Checked case-sensitively, in
/// order.
const ROOM_NAME_CONVENTIONS: [&str; 2] = ["Futures Signal", "Futures Leading"];

/// Ingestion failures.
#[derive(Debug)]
pub enum SignalError {
    /// Shared key mismatch; nothing was touched.
    Unauthorized,
    /// No room resolved via id, type tag, or naming conventions.
    RoomNotFound,
    /// The configured system/admin author does not resolve to an account.
    AdminNotFound,
    MalformedSignal(&'static str),
    /// The bridge itself is unconfigured (no shared secret).
    Configuration(&'static str),
    Storage(anyhow::Error),
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalError::Unauthorized => write!(f, "Invalid API key"),
            SignalError::RoomNotFound => write!(f, "Signal room not found"),
            SignalError::AdminNotFound => write!(f, "Signal author account not found"),
            SignalError::MalformedSignal(msg) => write!(f, "Malformed signal: {}", msg),
            SignalError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            SignalError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for SignalError {}

impl From<anyhow::Error> for SignalError {
    fn from(err: anyhow::Error) -> Self {
        SignalError::Storage(err)
    }
}

impl From<ChatError> for SignalError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Storage(e) => SignalError::Storage(e),
            other => SignalError::Storage(anyhow::anyhow!(other.to_string())),
        }
    }
}

impl IntoResponse for SignalError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            SignalError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            SignalError::RoomNotFound | SignalError::AdminNotFound => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            SignalError::MalformedSignal(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            SignalError::Configuration(_) => {
                warn!("Signal bridge misconfigured: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            SignalError::Storage(e) => {
                tracing::error!("Signal ingestion storage error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct SignalReceipt {
    pub message_id: i64,
    pub room_id: i64,
}

/// HTTP bridge that renders trading events into chat messages.
pub struct SignalIngestor {
    secret: String,
    explicit_room_id: Option<i64>,
    sender_phone: String,
    users: Arc<UserStore>,
    rooms: Arc<RoomStore>,
    pipeline: Arc<MessagePipeline>,
}

impl SignalIngestor {
    pub fn new(
        secret: String,
        explicit_room_id: Option<i64>,
        sender_phone: String,
        users: Arc<UserStore>,
        rooms: Arc<RoomStore>,
        pipeline: Arc<MessagePipeline>,
    ) -> Self {
        Self {
            secret,
            explicit_room_id,
            sender_phone,
            users,
            rooms,
            pipeline,
        }
    }

    /// Validate the shared key, render the event, and drive it through
    /// the pipeline. A key mismatch causes no side effects at all.
    pub async fn receive(
        &self,
        shared_key: &str,
        event: &SignalEvent,
    ) -> Result<SignalReceipt, SignalError> {
        if self.secret.is_empty() {
            return Err(SignalError::Configuration("signal API key is not set"));
        }

        // Constant-time comparison; a mismatch must not leak prefix length.
        let key_ok: bool = shared_key
            .as_bytes()
            .ct_eq(self.secret.as_bytes())
            .into();
        if !key_ok {
            warn!("Rejected signal with invalid API key");
            return Err(SignalError::Unauthorized);
        }

        validate_event(event)?;

        let room = self.resolve_room()?;
        let author = self
            .users
            .by_phone(&self.sender_phone)?
            .ok_or(SignalError::AdminNotFound)?;

        let content = render_signal(event);
        let msg = self
            .pipeline
            .ingest_external(&author, &room, content, MessageKind::Signal)
            .await?;

        info!(
            message_id = msg.id,
            room_id = room.id,
            symbol = %event.symbol,
            action = %event.action,
            "Signal injected into chat"
        );

        Ok(SignalReceipt {
            message_id: msg.id,
            room_id: room.id,
        })
    }

    /// Target-room resolution: explicit configured id, then the futures
    /// type tag, then the known name conventions. First match wins.
    fn resolve_room(&self) -> Result<Room, SignalError> {
        if let Some(id) = self.explicit_room_id {
            if let Some(room) = self.rooms.by_id(id)? {
                return Ok(room);
            }
        }

        if let Some(room) = self.rooms.by_type(RoomType::Futures)? {
            return Ok(room);
        }

        for fragment in ROOM_NAME_CONVENTIONS {
            if let Some(room) = self.rooms.by_name_contains(fragment)? {
                return Ok(room);
            }
        }

        Err(SignalError::RoomNotFound)
    }
}

fn validate_event(event: &SignalEvent) -> Result<(), SignalError> {
    if event.symbol.trim().is_empty() {
        return Err(SignalError::MalformedSignal("symbol must not be empty"));
    }
    if event.action.trim().is_empty() {
        return Err(SignalError::MalformedSignal("action must not be empty"));
    }
    if !event.price.is_finite() || event.price <= 0.0 {
        return Err(SignalError::MalformedSignal("price must be positive"));
    }
    Ok(())
}

// ===== HTTP surface =====

/// Request body: the event plus an optional inline key.
#[derive(Debug, Deserialize)]
pub struct SignalRequest {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(flatten)]
    pub event: SignalEvent,
}

#[derive(Debug, Deserialize)]
pub struct SignalKeyQuery {
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignalResponse {
    pub success: bool,
    pub message: String,
    pub signal_id: i64,
    pub room_id: i64,
}

/// POST /api/mt4/signal
///
/// The key is accepted from the query string, the body, or the
/// `X-Api-Key` header, in that priority order.
pub async fn receive_signal(
    State(state): State<AppState>,
    Query(query): Query<SignalKeyQuery>,
    headers: HeaderMap,
    Json(payload): Json<SignalRequest>,
) -> Result<Json<SignalResponse>, SignalError> {
    let header_key = headers
        .get("X-Api-Key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let key = query
        .api_key
        .or(payload.api_key)
        .or(header_key)
        .unwrap_or_default();

    let receipt = state.ingestor.receive(&key, &payload.event).await?;

    Ok(Json(SignalResponse {
        success: true,
        message: "Signal delivered".to_string(),
        signal_id: receipt.message_id,
        room_id: receipt.room_id,
    }))
}
