//! Authentication API Endpoints
//! Mission: Provide registration, login, and session lookup

use crate::api::{error::ApiError, require_user, AppState};
use crate::auth::models::{
    format_phone_number, phone_is_valid, LoginRequest, LoginResponse, RegisterRequest,
    UserResponse, UserRole,
};
use axum::{extract::State, http::HeaderMap, Json};
use tracing::{info, warn};

/// Register endpoint - POST /api/register
///
/// New accounts start unapproved; an admin has to let them in before the
/// first login succeeds.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if !phone_is_valid(&payload.phone) {
        return Err(ApiError::BadRequest("Invalid phone number format".to_string()));
    }
    if payload.password.len() < 4 {
        return Err(ApiError::BadRequest(
            "Password must be at least 4 characters".to_string(),
        ));
    }
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name must not be empty".to_string()));
    }

    let phone = format_phone_number(&payload.phone);

    if state.users.by_phone(&phone)?.is_some() {
        return Err(ApiError::BadRequest(
            "Phone number is already registered".to_string(),
        ));
    }

    let user = state.users.create_user(
        &phone,
        &payload.password,
        payload.name.trim(),
        UserRole::Member,
        false, // admin approval required
    )?;

    info!("📝 Registered new member: {} ({})", user.name, user.phone);

    Ok(Json(UserResponse::from_user(&user)))
}

/// Login endpoint - POST /api/token
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let phone = format_phone_number(&payload.phone);

    let valid = state.users.verify_password(&phone, &payload.password)?;
    if !valid {
        warn!("❌ Failed login attempt: {}", phone);
        return Err(ApiError::Unauthorized(
            "Phone number or password is incorrect".to_string(),
        ));
    }

    let user = state
        .users
        .by_phone(&phone)?
        .ok_or_else(|| ApiError::Unauthorized("Phone number or password is incorrect".to_string()))?;

    // Login runs the same eligibility checks as every later call.
    let user = state.gate.resolve(user.id)?;

    let (access_token, expires_in) = state.jwt.generate_token(&user)?;

    info!("✅ Login successful: {} ({})", user.name, user.role.as_str());

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in,
        user: UserResponse::from_user(&user),
    }))
}

/// Current user endpoint - GET /api/me
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiError> {
    let user = require_user(&state, &headers)?;
    Ok(Json(UserResponse::from_user(&user)))
}
