//! Tests for registration, login, session extraction and logout.

mod common;

use axum::http::StatusCode;
use common::{get, get_with_cookie, request, test_app, test_app_with_limits};
use serde_json::json;
use storefront::{
    db::Role,
    jwt::{AUDIENCE, ISSUER, SessionClaims, TokenType},
    rate_limit::RateLimitConfig,
};

#[tokio::test]
async fn test_register_creates_customer() {
    let t = test_app().await;

    let response = t
        .send(request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "Alice", "email": "alice@x.com", "password": "secret1" })),
        ))
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json["user"]["email"], "alice@x.com");
    assert_eq!(response.json["user"]["role"], "customer");
    assert!(response.json["user"].get("password_hash").is_none());

    let stored = t.db.users().get_by_email("alice@x.com").await.unwrap().unwrap();
    assert!(stored.password_hash.starts_with("$2b$12$"));
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let t = test_app().await;
    t.create_user("alice@x.com", "Alice", "secret1", Role::Customer)
        .await;

    let response = t
        .send(request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "Alice", "email": "ALICE@x.com", "password": "secret1" })),
        ))
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validation() {
    let t = test_app().await;

    for body in [
        json!({ "name": "", "email": "a@x.com", "password": "secret1" }),
        json!({ "name": "A", "email": "not-an-email", "password": "secret1" }),
        json!({ "name": "A", "email": "a@x.com", "password": "12345" }),
    ] {
        let response = t
            .send(request("POST", "/api/auth/register", None, Some(body)))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let t = test_app().await;
    let id = t
        .create_user("alice@x.com", "Alice", "secret1", Role::Customer)
        .await;

    let response = t
        .send(request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "alice@x.com", "password": "secret1" })),
        ))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["user"]["id"], id);

    let token = response.json["token"].as_str().unwrap();
    let claims = t.jwt.verify(token).unwrap();
    assert_eq!(claims.user_id, id);
    assert_eq!(claims.role, Role::Customer);

    let cookies = response.set_cookies();
    assert_eq!(cookies.len(), 1);
    let cookie = &cookies[0];
    assert!(cookie.starts_with(&format!("auth-token={}", token)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=604800"));
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn test_login_failures_share_one_message() {
    let t = test_app().await;
    t.create_user("alice@x.com", "Alice", "secret1", Role::Customer)
        .await;

    let wrong_password = t
        .send(request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "alice@x.com", "password": "wrong-pass" })),
        ))
        .await;
    let unknown_email = t
        .send(request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "nobody@x.com", "password": "secret1" })),
        ))
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.json["error"], "Invalid email or password");
    assert_eq!(wrong_password.json, unknown_email.json);
}

#[tokio::test]
async fn test_me_with_header_or_cookie() {
    let t = test_app().await;
    let (id, token) = t.login_as("alice@x.com", Role::Customer).await;

    let via_header = t.send(get("/api/auth/me", Some(&token))).await;
    assert_eq!(via_header.status, StatusCode::OK);
    assert_eq!(via_header.json["user"]["id"], id);

    let via_cookie = t.send(get_with_cookie("/api/auth/me", &token)).await;
    assert_eq!(via_cookie.status, StatusCode::OK);
    assert_eq!(via_cookie.json["user"]["id"], id);
}

#[tokio::test]
async fn test_me_requires_authentication() {
    let t = test_app().await;

    let response = t.send(get("/api/auth/me", None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json["error"], "Authentication required");

    let response = t.send(get("/api/auth/me", Some("garbage"))).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let t = test_app().await;
    let (id, _) = t.login_as("alice@x.com", Role::Customer).await;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = SessionClaims {
        user_id: id,
        email: "alice@x.com".to_string(),
        role: Role::Customer,
        jti: "expired".to_string(),
        token_type: TokenType::Session,
        iss: ISSUER.to_string(),
        aud: AUDIENCE.to_string(),
        iat: now - 120,
        exp: now - 60,
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(common::JWT_SECRET),
    )
    .unwrap();

    let response = t.send(get("/api/auth/me", Some(&token))).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let t = test_app().await;
    let (_, token) = t.login_as("alice@x.com", Role::Customer).await;

    let response = t
        .send(request("POST", "/api/auth/logout", Some(&token), None))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(
        response
            .set_cookies()
            .iter()
            .any(|c| c.starts_with("auth-token=;") && c.contains("Max-Age=0"))
    );

    let response = t.send(get("/api/auth/me", Some(&token))).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_session_still_clears_cookie() {
    let t = test_app().await;
    let response = t
        .send(request("POST", "/api/auth/logout", None, None))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.set_cookies().len(), 1);
}

#[tokio::test]
async fn test_change_password() {
    let t = test_app().await;
    let id = t
        .create_user("admin@x.com", "Admin", "old-secret", Role::Admin)
        .await;
    let token = t.jwt.issue(id, "admin@x.com", Role::Admin).unwrap().token;

    let wrong = t
        .send(request(
            "PUT",
            "/api/auth/password",
            Some(&token),
            Some(json!({ "current_password": "nope-nope", "new_password": "new-secret" })),
        ))
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);

    let too_short = t
        .send(request(
            "PUT",
            "/api/auth/password",
            Some(&token),
            Some(json!({ "currentPassword": "old-secret", "newPassword": "123" })),
        ))
        .await;
    assert_eq!(too_short.status, StatusCode::BAD_REQUEST);

    let ok = t
        .send(request(
            "PUT",
            "/api/auth/password",
            Some(&token),
            Some(json!({ "currentPassword": "old-secret", "newPassword": "new-secret" })),
        ))
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.json["success"], true);

    let login = t
        .send(request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "admin@x.com", "password": "new-secret" })),
        ))
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let t = test_app_with_limits(RateLimitConfig::new(2, 2)).await;

    let attempt = || {
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "nobody@x.com", "password": "secret1" })),
        )
    };

    assert_eq!(t.send(attempt()).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(t.send(attempt()).await.status, StatusCode::UNAUTHORIZED);

    let limited = t.send(attempt()).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.json["error"].is_string());
}
