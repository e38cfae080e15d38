//! Notification listing and acknowledgment.

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use super::extract::ApiJson;
use super::ws;
use crate::auth::Auth;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::notifications::Notifier;

#[derive(Clone)]
pub struct NotificationsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub notifier: Notifier,
}

impl_has_auth_backend!(NotificationsState);

pub fn router(state: NotificationsState) -> Router {
    Router::new()
        .route("/", get(list_notifications).patch(mark_read))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

async fn list_notifications(
    State(state): State<NotificationsState>,
    Auth(user, _): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let list = state
        .notifier
        .list(user.user_id())
        .await
        .db_err("Failed to list notifications")?;
    Ok(Json(list))
}

#[derive(Deserialize)]
struct MarkReadRequest {
    #[serde(default, alias = "notificationId")]
    notification_id: Option<i64>,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

/// Mark one notification read. The response is the same whether or not the caller owns it.
async fn mark_read(
    State(state): State<NotificationsState>,
    Auth(user, _): Auth,
    ApiJson(payload): ApiJson<MarkReadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let notification_id = payload
        .notification_id
        .ok_or_else(|| ApiError::bad_request("Notification ID is required"))?;

    state
        .notifier
        .mark_read(notification_id, user.user_id())
        .await
        .db_err("Failed to mark notification read")?;

    Ok(Json(SuccessResponse { success: true }))
}
