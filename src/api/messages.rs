//! Moderation API Endpoints
//! Mission: Message deletion through the shared pipeline

use crate::api::{error::ApiError, require_user, AppState};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

/// DELETE /api/messages/{message_id}
///
/// Permitted for admins, staff, or the original author. The pipeline
/// removes the stored row first and then broadcasts the delete notice.
pub async fn delete_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(message_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let actor = require_user(&state, &headers)?;

    state.pipeline.delete(&actor, message_id).await?;

    Ok(Json(json!({ "message": "Message deleted" })))
}
