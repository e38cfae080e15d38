//! Session cookie and bearer header handling.

use axum::http::{HeaderMap, header};

/// Cookie name for the session token.
pub const SESSION_COOKIE_NAME: &str = "auth-token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Candidate session tokens in the order they are tried: bearer header, then cookie.
pub fn session_token_candidates(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    [
        bearer_token(headers),
        get_cookie(headers, SESSION_COOKIE_NAME).filter(|t| !t.is_empty()),
    ]
    .into_iter()
    .flatten()
}

/// Build the `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        SESSION_COOKIE_NAME, token, max_age, secure
    )
}

/// Build the `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth-token=abc123; lang=id"),
        );

        assert_eq!(get_cookie(&headers, SESSION_COOKIE_NAME), Some("abc123"));
        assert_eq!(get_cookie(&headers, "lang"), Some("id"));
        assert_eq!(get_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_get_cookie_no_header() {
        let headers = HeaderMap::new();
        assert_eq!(get_cookie(&headers, SESSION_COOKIE_NAME), None);
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer xyz"),
        );
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_header_tried_before_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("auth-token=from-cookie"),
        );

        let candidates: Vec<&str> = session_token_candidates(&headers).collect();
        assert_eq!(candidates, vec!["from-header", "from-cookie"]);
    }

    #[test]
    fn test_session_cookie_attributes() {
        assert_eq!(
            session_cookie("tok", 604800, false),
            "auth-token=tok; HttpOnly; SameSite=Lax; Path=/; Max-Age=604800"
        );
        assert!(session_cookie("tok", 604800, true).ends_with("; Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }
}
