//! Admin API Endpoints
//! Mission: Account lifecycle management for the room operators

use crate::api::{error::ApiError, require_admin, AppState};
use crate::auth::models::{
    format_phone_number, phone_is_valid, RegisterRequest, UserResponse, UserRole,
};
use crate::chat::PresenceEntry;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_admin(&state, &headers)?;
    let users = state.users.list()?;
    Ok(Json(users.iter().map(UserResponse::from_user).collect()))
}

/// PUT /api/admin/users/{user_id}/approve
pub async fn approve_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;

    if !state.users.approve(user_id)? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    info!(user_id, "Approved member account");
    Ok(Json(json!({ "message": "User approved" })))
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub new_password: String,
}

/// PUT /api/admin/users/{user_id}/password
pub async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Json(payload): Json<PasswordChangeRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;

    if payload.new_password.len() < 4 {
        return Err(ApiError::BadRequest(
            "Password must be at least 4 characters".to_string(),
        ));
    }

    if !state.users.set_password(user_id, &payload.new_password)? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    Ok(Json(json!({ "message": "Password updated" })))
}

#[derive(Debug, Deserialize)]
pub struct ExpiryUpdateRequest {
    pub expiry_date: Option<DateTime<Utc>>,
}

/// PUT /api/admin/users/{user_id}/expiry
pub async fn update_expiry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Json(payload): Json<ExpiryUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;

    if !state.users.set_expiry(user_id, payload.expiry_date)? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    Ok(Json(json!({ "message": "Membership period updated" })))
}

/// POST /api/admin/staff
/// Staff accounts are approved immediately.
pub async fn create_staff(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&state, &headers)?;

    if !phone_is_valid(&payload.phone) {
        return Err(ApiError::BadRequest("Invalid phone number format".to_string()));
    }

    let phone = format_phone_number(&payload.phone);
    if state.users.by_phone(&phone)?.is_some() {
        return Err(ApiError::BadRequest(
            "Phone number is already registered".to_string(),
        ));
    }

    let staff = state.users.create_user(
        &phone,
        &payload.password,
        payload.name.trim(),
        UserRole::Staff,
        true,
    )?;

    Ok(Json(UserResponse::from_user(&staff)))
}

/// DELETE /api/admin/users/{user_id}
pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;

    let target = state
        .users
        .by_id(user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if target.role == UserRole::Admin {
        return Err(ApiError::Forbidden("Admin accounts cannot be deleted".to_string()));
    }

    state.users.delete(user_id)?;
    Ok(Json(json!({ "message": "User deleted" })))
}

/// A presence entry tagged with its room, for the cross-room view.
#[derive(Debug, Serialize)]
pub struct RoomPresence {
    pub room_id: i64,
    #[serde(flatten)]
    pub entry: PresenceEntry,
}

/// GET /api/admin/presence
/// Cross-room occupancy snapshot.
pub async fn all_presence(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RoomPresence>>, ApiError> {
    require_admin(&state, &headers)?;

    let all = state
        .presence
        .snapshot_all()
        .into_iter()
        .map(|(room_id, entry)| RoomPresence { room_id, entry })
        .collect();

    Ok(Json(all))
}
