//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down credential stuffing
//! and signup spam.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use serde_json::json;
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::auth::extract_client_ip;
use crate::cli::IpExtractor;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Login attempts per minute per IP.
pub const LOGIN_PER_MINUTE: u32 = 10;

/// Registrations per minute per IP.
pub const REGISTER_PER_MINUTE: u32 = 3;

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub login: Arc<IpLimiter>,
    pub register: Arc<IpLimiter>,
}

impl RateLimitConfig {
    /// Create limiters allowing the given number of requests per minute per IP.
    pub fn new(login_per_minute: u32, register_per_minute: u32) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(per_minute(login_per_minute))),
            register: Arc::new(RateLimiter::keyed(per_minute(register_per_minute))),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(LOGIN_PER_MINUTE, REGISTER_PER_MINUTE)
    }
}

fn per_minute(n: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN))
}

/// State for the rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    pub limits: RateLimitConfig,
    pub ip_extractor: Option<IpExtractor>,
}

fn check(limiter: &IpLimiter, state: &RateLimitState, request: &Request) -> Result<(), Response> {
    let ip = extract_client_ip(
        request.headers(),
        request.extensions(),
        state.ip_extractor.as_ref(),
    )
    .map_err(|e| {
        warn!(reason = e, "Unable to determine client IP");
        (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Unable to determine client IP" })),
        )
            .into_response()
    })?;

    limiter.check_key(&ip).map_err(|_| {
        warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many requests. Please try again later." })),
        )
            .into_response()
    })
}

/// Middleware for rate limiting login.
pub async fn rate_limit_login(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    match check(&state.limits.login, &state, &request) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}

/// Middleware for rate limiting registration.
pub async fn rate_limit_register(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    match check(&state.limits.register, &state, &request) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}
