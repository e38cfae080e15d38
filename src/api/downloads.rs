//! Download capability redemption.

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Redirect},
    routing::get,
};
use tracing::info;

use super::error::ApiError;
use super::extract::ApiPath;
use super::transactions::TransactionsState;
use crate::auth::Auth;

pub fn router(state: TransactionsState) -> Router {
    Router::new()
        .route("/{token}", get(download))
        .with_state(state)
}

/// Redirect the capability's owner to the purchased file.
async fn download(
    State(state): State<TransactionsState>,
    Auth(user, _): Auth,
    ApiPath(token): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let file_url = state.service.resolve_download(&token, &user).await?;
    info!(user_id = user.user_id(), "Download redeemed");
    Ok(Redirect::temporary(&file_url))
}
