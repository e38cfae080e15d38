//! Store-wide announcements. Any signed-in user reads them; admins publish and remove them.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use super::extract::{ApiJson, ApiQuery};
use crate::auth::{AdminOnly, Auth};
use crate::db::{Announcement, AnnouncementType, Database};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// How many announcements a listing returns.
pub const LIST_LIMIT: i64 = 10;

const MAX_TITLE_LENGTH: usize = 255;

#[derive(Clone)]
pub struct AnnouncementsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(AnnouncementsState);

pub fn router(state: AnnouncementsState) -> Router {
    Router::new()
        .route(
            "/",
            get(list_announcements)
                .post(create_announcement)
                .delete(delete_announcement),
        )
        .with_state(state)
}

#[derive(Serialize)]
struct AnnouncementList {
    announcements: Vec<Announcement>,
}

#[derive(Serialize)]
struct AnnouncementEnvelope {
    announcement: Announcement,
}

async fn list_announcements(
    State(state): State<AnnouncementsState>,
    _auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let announcements = state
        .db
        .announcements()
        .list_recent(LIST_LIMIT)
        .await
        .db_err("Failed to list announcements")?;
    Ok(Json(AnnouncementList { announcements }))
}

#[derive(Deserialize)]
struct CreateAnnouncementRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

async fn create_announcement(
    State(state): State<AnnouncementsState>,
    Auth(admin, _): Auth<AdminOnly>,
    ApiJson(payload): ApiJson<CreateAnnouncementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload.title.trim();
    let content = payload.content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(ApiError::bad_request("Title and content are required"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }

    let kind = match payload.kind.as_deref() {
        None => AnnouncementType::default(),
        Some(kind) => AnnouncementType::parse(kind)
            .ok_or_else(|| ApiError::bad_request("Announcement type must be 'board' or 'alert'"))?,
    };

    let store = state.db.announcements();
    let id = store
        .create(title, content, kind, admin.user_id())
        .await
        .db_err("Failed to create announcement")?;
    let announcement = store
        .get_by_id(id)
        .await
        .db_err("Failed to load announcement")?
        .ok_or_else(|| ApiError::not_found("Announcement not found"))?;

    info!(
        announcement_id = id,
        admin_id = admin.user_id(),
        kind = kind.as_str(),
        "Announcement published"
    );
    Ok((
        StatusCode::CREATED,
        Json(AnnouncementEnvelope { announcement }),
    ))
}

#[derive(Deserialize)]
struct DeleteParams {
    id: Option<i64>,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

async fn delete_announcement(
    State(state): State<AnnouncementsState>,
    Auth(admin, _): Auth<AdminOnly>,
    ApiQuery(params): ApiQuery<DeleteParams>,
) -> Result<impl IntoResponse, ApiError> {
    let id = params
        .id
        .ok_or_else(|| ApiError::bad_request("Announcement ID is required"))?;

    let deleted = state
        .db
        .announcements()
        .delete(id)
        .await
        .db_err("Failed to delete announcement")?;
    if !deleted {
        return Err(ApiError::not_found("Announcement not found"));
    }

    info!(announcement_id = id, admin_id = admin.user_id(), "Announcement deleted");
    Ok(Json(SuccessResponse { success: true }))
}
