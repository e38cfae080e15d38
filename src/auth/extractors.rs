//! Axum extractors for authentication.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};

use super::cookie::session_token_candidates;
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;
use crate::db::Role;

/// Resolve the caller's identity from the bearer header or the session cookie.
///
/// Sources are tried in that order and the first token that verifies and has not been
/// revoked wins. Only a deny-list lookup failure is reported as an error.
async fn authenticate<S>(
    headers: &HeaderMap,
    state: &S,
) -> Result<Option<AuthenticatedUser>, AuthErrorKind>
where
    S: HasAuthBackend + Sync,
{
    for token in session_token_candidates(headers) {
        let Ok(claims) = state.jwt().verify(token) else {
            continue;
        };

        let revoked = state
            .db()
            .revoked_tokens()
            .is_revoked(&claims.jti)
            .await
            .map_err(|e| {
                tracing::error!("Failed to check revoked tokens: {}", e);
                AuthErrorKind::Database
            })?;
        if revoked {
            continue;
        }

        return Ok(Some(AuthenticatedUser {
            claims,
            token: token.to_string(),
        }));
    }
    Ok(None)
}

/// Optional identity for the request. Never fails; anything unverifiable is anonymous.
pub async fn current_identity<S>(headers: &HeaderMap, state: &S) -> Option<AuthenticatedUser>
where
    S: HasAuthBackend + Sync,
{
    authenticate(headers, state).await.ok().flatten()
}

/// Require any authenticated identity.
pub async fn require_auth<S>(headers: &HeaderMap, state: &S) -> Result<AuthenticatedUser, AuthErrorKind>
where
    S: HasAuthBackend + Sync,
{
    authenticate(headers, state)
        .await?
        .ok_or(AuthErrorKind::AuthenticationRequired)
}

/// Require an authenticated admin.
pub async fn require_admin<S>(headers: &HeaderMap, state: &S) -> Result<AuthenticatedUser, AuthErrorKind>
where
    S: HasAuthBackend + Sync,
{
    let user = require_auth(headers, state).await?;
    check_role::<AdminOnly>(user.role())?;
    Ok(user)
}

/// Role requirement attached to an [`Auth`] extractor.
pub trait RoleConstraint {
    fn allows(role: Role) -> bool;
}

/// Any authenticated user.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn allows(role: Role) -> bool {
        match role {
            Role::Admin | Role::Customer => true,
        }
    }
}

/// Admins only.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn allows(role: Role) -> bool {
        match role {
            Role::Admin => true,
            Role::Customer => false,
        }
    }
}

fn check_role<R: RoleConstraint>(role: Role) -> Result<(), AuthErrorKind> {
    if R::allows(role) {
        Ok(())
    } else {
        Err(AuthErrorKind::AdminAccessRequired)
    }
}

/// Extractor for API endpoints that require authentication with a role constraint.
/// Returns JSON errors: 401 without an identity, 403 when the role is not allowed.
pub struct Auth<R: RoleConstraint = AnyRole>(pub AuthenticatedUser, pub(crate) PhantomData<R>);

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: HasAuthBackend + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = require_auth(&parts.headers, state).await?;
        check_role::<R>(user.role())?;
        Ok(Auth(user, PhantomData))
    }
}

/// Optional authentication extractor - never fails.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(current_identity(&parts.headers, state).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::jwt::JwtConfig;
    use axum::http::{HeaderValue, header};
    use std::sync::Arc;

    struct TestState {
        db: Database,
        jwt: Arc<JwtConfig>,
    }

    crate::impl_has_auth_backend!(TestState);

    async fn state() -> TestState {
        TestState {
            db: Database::open(":memory:").await.unwrap(),
            jwt: Arc::new(JwtConfig::new(b"extractor-test-secret").unwrap()),
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_role_constraints_are_exhaustive() {
        for role in [Role::Admin, Role::Customer] {
            assert!(AnyRole::allows(role));
            assert_eq!(AdminOnly::allows(role), role == Role::Admin);
        }
    }

    #[tokio::test]
    async fn test_no_token_is_anonymous() {
        let state = state().await;
        let headers = HeaderMap::new();

        assert!(current_identity(&headers, &state).await.is_none());
        assert_eq!(
            require_auth(&headers, &state).await.unwrap_err(),
            AuthErrorKind::AuthenticationRequired
        );
    }

    #[tokio::test]
    async fn test_require_admin_over_roles() {
        let state = state().await;

        let admin = state.jwt.issue(1, "admin@x.com", Role::Admin).unwrap();
        assert!(require_admin(&bearer(&admin.token), &state).await.is_ok());

        let customer = state.jwt.issue(2, "c@x.com", Role::Customer).unwrap();
        assert_eq!(
            require_admin(&bearer(&customer.token), &state)
                .await
                .unwrap_err(),
            AuthErrorKind::AdminAccessRequired
        );

        assert_eq!(
            require_admin(&HeaderMap::new(), &state).await.unwrap_err(),
            AuthErrorKind::AuthenticationRequired
        );
    }

    #[tokio::test]
    async fn test_invalid_header_falls_back_to_cookie() {
        let state = state().await;
        let issued = state.jwt.issue(5, "c@x.com", Role::Customer).unwrap();

        let mut headers = bearer("garbage");
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("auth-token={}", issued.token)).unwrap(),
        );

        let user = current_identity(&headers, &state).await.unwrap();
        assert_eq!(user.user_id(), 5);
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected() {
        let state = state().await;
        let issued = state.jwt.issue(5, "c@x.com", Role::Customer).unwrap();
        state
            .db
            .revoked_tokens()
            .revoke(&issued.jti, issued.expires_at)
            .await
            .unwrap();

        assert!(
            current_identity(&bearer(&issued.token), &state)
                .await
                .is_none()
        );
    }
}
