//! Purchase and approval endpoints.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::auth::{AdminOnly, Auth};
use crate::db::{Database, TransactionStatus};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::transactions::{Decision, ListQuery, TransactionService, TransactionView};

#[derive(Clone)]
pub struct TransactionsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub service: TransactionService,
}

impl_has_auth_backend!(TransactionsState);

pub fn router(state: TransactionsState) -> Router {
    Router::new()
        .route("/", get(list_transactions).post(create_transaction))
        .route("/repair-download-links", post(repair_download_links))
        .route("/{id}", get(get_transaction).put(decide_transaction))
        .with_state(state)
}

#[derive(Serialize)]
struct TransactionEnvelope {
    transaction: TransactionView,
}

#[derive(Deserialize)]
struct CreateTransactionRequest {
    #[serde(alias = "productId")]
    product_id: i64,
    amount: i64,
    #[serde(default, alias = "paymentProof", alias = "paymentProofRef")]
    payment_proof: Option<String>,
}

async fn create_transaction(
    State(state): State<TransactionsState>,
    Auth(user, _): Auth,
    ApiJson(payload): ApiJson<CreateTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_proof = payload
        .payment_proof
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let transaction = state
        .service
        .create(&user, payload.product_id, payload.amount, payment_proof)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TransactionEnvelope { transaction }),
    ))
}

#[derive(Deserialize)]
struct ListParams {
    status: Option<String>,
    #[serde(alias = "userId")]
    user_id: Option<i64>,
    page: Option<i64>,
    limit: Option<i64>,
}

async fn list_transactions(
    State(state): State<TransactionsState>,
    Auth(user, _): Auth,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            TransactionStatus::parse(s)
                .ok_or_else(|| ApiError::bad_request(format!("Unknown status: {}", s)))?,
        ),
        None => None,
    };

    let query = ListQuery {
        owner_id: params.user_id,
        status,
        page: params.page,
        limit: params.limit,
    };
    let page = state.service.list(&query, &user).await?;

    Ok(Json(page))
}

async fn get_transaction(
    State(state): State<TransactionsState>,
    Auth(user, _): Auth,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = state.service.get(id, &user).await?;
    Ok(Json(TransactionEnvelope { transaction }))
}

#[derive(Deserialize)]
struct DecideRequest {
    #[serde(default)]
    status: String,
}

async fn decide_transaction(
    State(state): State<TransactionsState>,
    Auth(admin, _): Auth<AdminOnly>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<DecideRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let decision = Decision::parse(&payload.status)
        .ok_or_else(|| ApiError::bad_request("Status must be 'approved' or 'rejected'"))?;

    let transaction = state.service.decide(id, decision, &admin).await?;
    Ok(Json(TransactionEnvelope { transaction }))
}

#[derive(Serialize)]
struct RepairResponse {
    count: u64,
}

async fn repair_download_links(
    State(state): State<TransactionsState>,
    Auth(admin, _): Auth<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let count = state.service.repair_download_links(&admin).await?;
    Ok(Json(RepairResponse { count }))
}
