//! Registration, login, logout and password management.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ResultExt, validate_email};
use super::extract::ApiJson;
use crate::auth::{Auth, OptionalAuth, clear_session_cookie, session_cookie};
use crate::db::{Database, Role, User};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::password;
use crate::rate_limit::{RateLimitState, rate_limit_login, rate_limit_register};

/// Longest accepted display name, in characters.
const MAX_NAME_LENGTH: usize = 100;

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    pub rate_limit: RateLimitState,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_login,
        ));

    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_register,
        ));

    let session_router = Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", put(change_password))
        .with_state(state);

    Router::new()
        .merge(login_router)
        .merge(register_router)
        .merge(session_router)
}

/// Public view of an account. Never includes the password hash.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize)]
struct UserEnvelope {
    user: UserResponse,
}

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || password::hash(&password))
        .await
        .internal_err("Password hashing task failed")?
        .internal_err("Failed to hash password")
}

async fn verify_password(password: String, password_hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || password::verify(&password, &password_hash))
        .await
        .internal_err("Password verification task failed")
}

async fn register(
    State(state): State<AuthState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.trim();
    let email = payload.email.trim();

    if name.is_empty() || email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Name, email and password are required"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Name cannot be longer than {} characters",
            MAX_NAME_LENGTH
        )));
    }
    validate_email(email)?;
    if !password::is_acceptable(&payload.password) {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            password::MIN_PASSWORD_LENGTH
        )));
    }

    let available = state
        .db
        .users()
        .is_email_available(email)
        .await
        .db_err("Failed to check email")?;
    if !available {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let password_hash = hash_password(payload.password).await?;

    let id = match state
        .db
        .users()
        .create(email, name, &password_hash, Role::Customer)
        .await
    {
        Ok(id) => id,
        Err(e)
            if e
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation()) =>
        {
            return Err(ApiError::conflict("Email is already registered"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    };

    let user = state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user_id = id, "User registered");

    Ok((StatusCode::CREATED, Json(UserEnvelope { user: user.into() })))
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    user: UserResponse,
    token: String,
}

async fn login(
    State(state): State<AuthState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim();
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let invalid = || ApiError::unauthorized("Invalid email or password");

    let Some(user) = state
        .db
        .users()
        .get_by_email(email)
        .await
        .db_err("Failed to look up user")?
    else {
        let password = payload.password;
        tokio::task::spawn_blocking(move || password::verify_dummy(&password))
            .await
            .internal_err("Password verification task failed")?;
        return Err(invalid());
    };

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        warn!(user_id = user.id, "Failed login attempt");
        return Err(invalid());
    }

    let issued = state
        .jwt
        .issue(user.id, &user.email, user.role)
        .internal_err("Failed to issue session token")?;

    let cookie = session_cookie(&issued.token, issued.duration, state.secure_cookies);
    info!(user_id = user.id, role = user.role.as_str(), "User logged in");

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            user: user.into(),
            token: issued.token,
        }),
    ))
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

/// Revoke the presented session (if any) and clear the cookie. Always succeeds.
async fn logout(
    State(state): State<AuthState>,
    OptionalAuth(user): OptionalAuth,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(user) = user {
        state
            .db
            .revoked_tokens()
            .revoke(&user.claims.jti, user.claims.exp)
            .await
            .db_err("Failed to revoke token")?;
        info!(user_id = user.user_id(), "User logged out");
    }

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, clear_session_cookie(state.secure_cookies))],
        Json(SuccessResponse { success: true }),
    ))
}

async fn me(
    State(state): State<AuthState>,
    Auth(user, _): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_id(user.user_id())
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    Ok(Json(UserEnvelope { user: user.into() }))
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    #[serde(default, alias = "currentPassword")]
    current_password: String,
    #[serde(default, alias = "newPassword")]
    new_password: String,
}

async fn change_password(
    State(state): State<AuthState>,
    Auth(user, _): Auth,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.current_password.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::bad_request(
            "Current and new password are required",
        ));
    }
    if !password::is_acceptable(&payload.new_password) {
        return Err(ApiError::bad_request(format!(
            "New password must be at least {} characters",
            password::MIN_PASSWORD_LENGTH
        )));
    }

    let account = state
        .db
        .users()
        .get_by_id(user.user_id())
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify_password(payload.current_password, account.password_hash).await? {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    let new_hash = hash_password(payload.new_password).await?;
    state
        .db
        .users()
        .update_password(account.id, &new_hash)
        .await
        .db_err("Failed to update password")?;

    info!(user_id = account.id, "Password changed");
    Ok(Json(SuccessResponse { success: true }))
}
