//! Shared helpers for API integration tests.
#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode},
};
use serde_json::Value;
use storefront::{
    ServerConfig,
    cli::{ClientIpHeader, IpExtractor},
    create_app,
    db::{Database, NewProduct, Role},
    jwt::JwtConfig,
    rate_limit::RateLimitConfig,
};
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"integration-test-jwt-secret-0123456789";

/// Low bcrypt cost so fixtures stay fast; verification works for any cost.
const FIXTURE_HASH_COST: u32 = 4;

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: JwtConfig,
}

pub async fn test_app() -> TestApp {
    test_app_with_limits(RateLimitConfig::new(1000, 1000)).await
}

pub async fn test_app_with_limits(rate_limits: RateLimitConfig) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: JWT_SECRET.to_vec(),
        secure_cookies: false,
        ip_extractor: Some(IpExtractor::from(ClientIpHeader::XForwardFor)),
        rate_limits,
    };
    TestApp {
        app: create_app(&config).expect("Failed to create app"),
        db,
        jwt: JwtConfig::new(JWT_SECRET).unwrap(),
    }
}

impl TestApp {
    /// Insert a user with the given password. Returns the user ID.
    pub async fn create_user(&self, email: &str, name: &str, password: &str, role: Role) -> i64 {
        let hash = bcrypt::hash(password, FIXTURE_HASH_COST).unwrap();
        self.db
            .users()
            .create(email, name, &hash, role)
            .await
            .unwrap()
    }

    /// Insert a user and return (user_id, session token).
    pub async fn login_as(&self, email: &str, role: Role) -> (i64, String) {
        let id = self.create_user(email, "Test User", "secret123", role).await;
        let token = self.jwt.issue(id, email, role).unwrap().token;
        (id, token)
    }

    pub async fn create_product(&self, name: &str, price: i64, file_url: Option<&str>) -> i64 {
        self.db
            .products()
            .create(&NewProduct {
                name,
                description: "Test product",
                price,
                file_url,
                image_url: None,
                category: Some("Template"),
            })
            .await
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            json,
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers.get("location").and_then(|v| v.to_str().ok())
    }

    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .collect()
    }
}

/// Build a request from a client behind the test proxy.
pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "127.0.0.1");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request("GET", uri, token, None)
}

/// Build a request carrying the session in the `auth-token` cookie.
pub fn get_with_cookie(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("cookie", format!("auth-token={}", token))
        .body(Body::empty())
        .unwrap()
}
