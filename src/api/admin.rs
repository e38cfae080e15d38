//! Admin API endpoints.
//!
//! All endpoints require admin role.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use super::extract::{ApiPath, ApiQuery};
use crate::auth::{AdminOnly, Auth};
use crate::db::{Database, MemberSummary, Role};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// State for admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/members", get(list_members))
        .route("/members/{id}", delete(delete_member))
        .with_state(state)
}

#[derive(Deserialize)]
struct MembersParams {
    search: Option<String>,
    role: Option<String>,
}

#[derive(Serialize)]
struct MembersResponse {
    members: Vec<MemberSummary>,
}

/// List accounts with their purchase totals.
async fn list_members(
    State(state): State<AdminState>,
    _auth: Auth<AdminOnly>,
    ApiQuery(params): ApiQuery<MembersParams>,
) -> Result<impl IntoResponse, ApiError> {
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let role = match params.role.as_deref().filter(|r| !r.is_empty() && *r != "all") {
        Some(r) => {
            Some(Role::parse(r).ok_or_else(|| ApiError::bad_request(format!("Unknown role: {}", r)))?)
        }
        None => None,
    };

    let members = state
        .db
        .users()
        .list_members(search, role)
        .await
        .db_err("Failed to list members")?;

    Ok(Json(MembersResponse { members }))
}

/// Delete a customer account that has never purchased anything.
async fn delete_member(
    State(state): State<AdminState>,
    Auth(admin, _): Auth<AdminOnly>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let member = state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to get member")?
        .ok_or_else(|| ApiError::not_found("Member not found"))?;

    match member.role {
        Role::Admin => return Err(ApiError::forbidden("Admin accounts cannot be deleted")),
        Role::Customer => {}
    }

    let transactions = state
        .db
        .users()
        .count_transactions(id)
        .await
        .db_err("Failed to count member transactions")?;
    if transactions > 0 {
        return Err(ApiError::conflict(
            "Member has transactions and cannot be deleted",
        ));
    }

    state
        .db
        .users()
        .delete(id)
        .await
        .db_err("Failed to delete member")?;

    info!(member_id = id, admin_id = admin.user_id(), "Member deleted");
    Ok(StatusCode::NO_CONTENT)
}
