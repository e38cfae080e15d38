mod admin;
mod announcements;
mod auth;
mod downloads;
mod error;
mod extract;
mod notifications;
mod products;
mod transactions;
mod ws;

use axum::Router;
use std::sync::Arc;

use crate::cli::IpExtractor;
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::notifications::{NotificationHub, Notifier};
use crate::rate_limit::{RateLimitConfig, RateLimitState};
use crate::transactions::TransactionService;

pub use auth::UserResponse;
pub use error::ApiError;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    hub: NotificationHub,
    secure_cookies: bool,
    ip_extractor: Option<IpExtractor>,
    rate_limits: RateLimitConfig,
) -> Router {
    let notifier = Notifier::new(db.clone(), hub);

    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
        rate_limit: RateLimitState {
            limits: rate_limits,
            ip_extractor,
        },
    };

    let products_state = products::ProductsState { db: db.clone() };

    let transactions_state = transactions::TransactionsState {
        db: db.clone(),
        jwt: jwt.clone(),
        service: TransactionService::new(db.clone(), jwt.clone(), notifier.clone()),
    };

    let notifications_state = notifications::NotificationsState {
        db: db.clone(),
        jwt: jwt.clone(),
        notifier,
    };

    let announcements_state = announcements::AnnouncementsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let admin_state = admin::AdminState { db, jwt };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/products", products::router(products_state))
        .nest("/transactions", transactions::router(transactions_state.clone()))
        .nest("/downloads", downloads::router(transactions_state))
        .nest("/notifications", notifications::router(notifications_state))
        .nest("/announcements", announcements::router(announcements_state))
        .nest("/admin", admin::router(admin_state))
}
