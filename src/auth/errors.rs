//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Why a request was refused by the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No valid, unrevoked session token was presented.
    AuthenticationRequired,
    /// Authenticated, but the route needs the admin role.
    AdminAccessRequired,
    /// The deny-list could not be consulted.
    Database,
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthErrorKind::AuthenticationRequired => write!(f, "Authentication required"),
            AuthErrorKind::AdminAccessRequired => write!(f, "Admin access required"),
            AuthErrorKind::Database => write!(f, "Database error"),
        }
    }
}

impl std::error::Error for AuthErrorKind {}

/// API authentication errors, rendered as JSON.
#[derive(Debug)]
pub struct ApiAuthError(pub AuthErrorKind);

impl ApiAuthError {
    pub fn kind(&self) -> AuthErrorKind {
        self.0
    }

    fn status_code(&self) -> StatusCode {
        match self.0 {
            AuthErrorKind::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            AuthErrorKind::AdminAccessRequired => StatusCode::FORBIDDEN,
            AuthErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthErrorKind> for ApiAuthError {
    fn from(kind: AuthErrorKind) -> Self {
        Self(kind)
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
