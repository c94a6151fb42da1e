//! HTTP API Module
//! Mission: Route table, shared state, and the bearer-token helpers

pub mod admin;
pub mod error;
pub mod messages;
pub mod rooms;

use crate::auth::models::User;
use crate::auth::{api as auth_api, AuthGate, JwtHandler, UserStore};
use crate::chat::{socket, ConnectionRegistry, MessagePipeline, MessageStore, PresenceTracker};
use crate::config::AppConfig;
use crate::rooms::RoomStore;
use crate::signal::{ingest, SignalIngestor};
use axum::{
    http::HeaderMap,
    routing::{delete, get, post, put},
    Router,
};
use error::ApiError;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<UserStore>,
    pub rooms: Arc<RoomStore>,
    pub messages: Arc<MessageStore>,
    pub jwt: Arc<JwtHandler>,
    pub gate: Arc<AuthGate>,
    pub registry: Arc<ConnectionRegistry>,
    pub presence: Arc<PresenceTracker>,
    pub pipeline: Arc<MessagePipeline>,
    pub ingestor: Arc<SignalIngestor>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Accounts
        .route("/api/register", post(auth_api::register))
        .route("/api/token", post(auth_api::login))
        .route("/api/me", get(auth_api::me))
        // Admin
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:user_id/approve", put(admin::approve_user))
        .route(
            "/api/admin/users/:user_id/password",
            put(admin::change_password),
        )
        .route("/api/admin/users/:user_id/expiry", put(admin::update_expiry))
        .route("/api/admin/users/:user_id", delete(admin::delete_user))
        .route("/api/admin/staff", post(admin::create_staff))
        .route("/api/admin/presence", get(admin::all_presence))
        // Rooms
        .route("/api/rooms/free", get(rooms::free_rooms))
        .route("/api/rooms/paid", get(rooms::paid_rooms))
        .route("/api/rooms", post(rooms::create_room))
        .route("/api/rooms/:room_id/messages", get(rooms::room_messages))
        .route("/api/rooms/:room_id/presence", get(rooms::room_presence))
        // Moderation
        .route("/api/messages/:message_id", delete(messages::delete_message))
        // External signal bridge
        .route("/api/mt4/signal", post(ingest::receive_signal))
        // Live chat
        .route("/ws/chat/:room_id", get(socket::chat_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "🚀 SignalRoom Operational"
}

/// Pull a bearer token out of the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

/// Authenticate the request or fail with the mapped HTTP error.
pub fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization token".to_string()))?;
    Ok(state.gate.authenticate(token)?)
}

/// Authenticate and additionally require the admin role.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let user = require_user(state, headers)?;
    if user.role != crate::auth::models::UserRole::Admin {
        return Err(ApiError::Forbidden("Admin privileges required".to_string()));
    }
    Ok(user)
}
