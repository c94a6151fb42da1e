//! Room API Endpoints
//! Mission: Room listings, history reads, and presence snapshots

use crate::api::{bearer_token, error::ApiError, require_admin, require_user, AppState};
use crate::chat::PresenceEntry;
use crate::models::{ChatMessage, Room, RoomType};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

/// GET /api/rooms/free
/// Free room listing, readable without a login.
pub async fn free_rooms(State(state): State<AppState>) -> Result<Json<Vec<Room>>, ApiError> {
    Ok(Json(state.rooms.list_free()?))
}

/// GET /api/rooms/paid
/// Paid room listing, for authenticated eligible accounts.
pub async fn paid_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Room>>, ApiError> {
    require_user(&state, &headers)?;
    Ok(Json(state.rooms.list_paid()?))
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub room_type: RoomType,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// POST /api/rooms (admin only)
pub async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<Json<Room>, ApiError> {
    require_admin(&state, &headers)?;

    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Room name must not be empty".to_string()));
    }

    let room = state.rooms.create(
        payload.name.trim(),
        payload.room_type,
        payload.is_free,
        payload.description.as_deref(),
    )?;

    Ok(Json(room))
}

/// GET /api/rooms/{room_id}/messages
///
/// History is gated by the room's free/paid flag, not by role: free rooms
/// are readable anonymously, paid rooms need an eligible login. Returns
/// up to 100 messages, oldest first.
pub async fn room_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<i64>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let room = state
        .rooms
        .by_id(room_id)?
        .ok_or_else(|| ApiError::NotFound("Room not found".to_string()))?;

    if !room.is_free {
        let caller = state.gate.authenticate_optional(bearer_token(&headers));
        if caller.is_none() {
            return Err(ApiError::Unauthorized(
                "A valid membership is required to read this room".to_string(),
            ));
        }
    }

    let mut messages = state.messages.recent_by_room(room_id, 100).await?;
    messages.reverse(); // newest-first in storage, oldest-first on the wire

    Ok(Json(messages))
}

/// GET /api/rooms/{room_id}/presence
pub async fn room_presence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<i64>,
) -> Result<Json<Vec<PresenceEntry>>, ApiError> {
    require_user(&state, &headers)?;

    if state.rooms.by_id(room_id)?.is_none() {
        return Err(ApiError::NotFound("Room not found".to_string()));
    }

    Ok(Json(state.presence.snapshot(room_id)))
}
