//! Route guard for page navigations.
//!
//! Runs in front of every non-API path and redirects browsers away from protected areas
//! before any page is served. The token is only decoded here, not verified: this is a
//! navigation convenience, and API handlers enforce access on their own.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};

use super::cookie::session_token_candidates;
use crate::db::Role;

/// Path prefixes that require a signed-in user.
const PROTECTED_PREFIXES: [&str; 3] = ["/admin", "/profile", "/checkout"];

/// Path prefixes that additionally require the admin role.
const ADMIN_PREFIXES: [&str; 1] = ["/admin"];

const LOGIN_PATH: &str = "/login";

/// The subset of session claims the guard looks at.
#[derive(Debug, Deserialize)]
struct UnverifiedClaims {
    role: Role,
    exp: u64,
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|p| matches_prefix(path, p))
}

fn is_admin_only(path: &str) -> bool {
    ADMIN_PREFIXES.iter().any(|p| matches_prefix(path, p))
}

/// Decode a JWT payload without checking the signature. Returns `None` when the token is
/// malformed or expired at `now`.
fn decode_unverified(token: &str, now: u64) -> Option<UnverifiedClaims> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: UnverifiedClaims = serde_json::from_slice(&bytes).ok()?;
    (claims.exp > now).then_some(claims)
}

fn login_redirect(path: &str) -> Response {
    let encoded: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
    Redirect::temporary(&format!("{}?redirect={}", LOGIN_PATH, encoded)).into_response()
}

/// Middleware enforcing the protected and admin-only page prefixes.
pub async fn route_guard(request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if matches_prefix(path, "/api") || !is_protected(path) {
        return next.run(request).await;
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(u64::MAX);

    let claims = session_token_candidates(request.headers())
        .find_map(|token| decode_unverified(token, now));

    let Some(claims) = claims else {
        return login_redirect(path);
    };

    if is_admin_only(path) {
        match claims.role {
            Role::Admin => {}
            Role::Customer => return Redirect::temporary("/").into_response(),
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_prefix_matching() {
        assert!(is_protected("/admin"));
        assert!(is_protected("/admin/products"));
        assert!(is_protected("/checkout/3"));
        assert!(is_protected("/profile"));
        assert!(!is_protected("/administrator"));
        assert!(!is_protected("/products/3"));
        assert!(!is_protected("/"));

        assert!(is_admin_only("/admin/members"));
        assert!(!is_admin_only("/profile"));
    }

    #[test]
    fn test_decode_unverified() {
        let token = token_with_payload(r#"{"userId":1,"role":"admin","exp":2000}"#);
        let claims = decode_unverified(&token, 1000).unwrap();
        assert_eq!(claims.role, Role::Admin);

        assert!(decode_unverified(&token, 2000).is_none());
        assert!(decode_unverified(&token, 3000).is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_unverified("not-a-token", 0).is_none());
        assert!(decode_unverified("a.b.c", 0).is_none());
        assert!(decode_unverified("a.b.c.d", 0).is_none());

        let no_exp = token_with_payload(r#"{"role":"customer"}"#);
        assert!(decode_unverified(&no_exp, 0).is_none());

        let unknown_role = token_with_payload(r#"{"role":"root","exp":2000}"#);
        assert!(decode_unverified(&unknown_role, 0).is_none());
    }

    #[test]
    fn test_login_redirect_encodes_path() {
        let response = login_redirect("/checkout/3");
        assert_eq!(
            response.headers()["location"],
            "/login?redirect=%2Fcheckout%2F3"
        );
        assert_eq!(response.status(), axum::http::StatusCode::TEMPORARY_REDIRECT);
    }
}
