//! JWT token generation and validation.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::Role;

/// Issuer stamped on every token.
pub const ISSUER: &str = "digital-store";

/// Audience stamped on every token.
pub const AUDIENCE: &str = "digital-store-users";

/// Session token duration: 7 days
pub const SESSION_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Download capability duration: 24 hours
pub const DOWNLOAD_TOKEN_DURATION_SECS: u64 = 24 * 60 * 60;

/// Token type for distinguishing session tokens from download capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Login session, carried in the auth cookie or a bearer header
    Session,
    /// Grants one customer access to one purchased file
    Download,
}

/// JWT claims for session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Database user ID
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    /// JWT ID, used to revoke the token on logout
    pub jti: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iss: String,
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT claims for download capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadClaims {
    #[serde(rename = "transactionId")]
    pub transaction_id: i64,
    /// The customer the capability was minted for
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iss: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
}

/// Result of issuing a session token.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub jti: String,
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    /// An empty secret is a configuration error.
    pub fn new(secret: &[u8]) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::MissingSecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }

    /// Issue a session token for a user.
    pub fn issue(&self, user_id: i64, email: &str, role: Role) -> Result<SessionToken, JwtError> {
        let now = now()?;
        let jti = uuid::Uuid::new_v4().to_string();
        let exp = now + SESSION_TOKEN_DURATION_SECS;

        let claims = SessionClaims {
            user_id,
            email: email.to_string(),
            role,
            jti: jti.clone(),
            token_type: TokenType::Session,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(SessionToken {
            token,
            jti,
            expires_at: exp,
            duration: SESSION_TOKEN_DURATION_SECS,
        })
    }

    /// Validate and decode a session token.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, JwtError> {
        let token_data =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation())
                .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Session {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }

    /// Mint a download capability for the owner of an approved transaction.
    pub fn issue_download(&self, transaction_id: i64, user_id: i64) -> Result<String, JwtError> {
        let now = now()?;
        let claims = DownloadClaims {
            transaction_id,
            user_id,
            token_type: TokenType::Download,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            iat: now,
            exp: now + DOWNLOAD_TOKEN_DURATION_SECS,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Validate and decode a download capability.
    pub fn verify_download(&self, token: &str) -> Result<DownloadClaims, JwtError> {
        let token_data =
            jsonwebtoken::decode::<DownloadClaims>(token, &self.decoding_key, &validation())
                .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Download {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[ISSUER]);
    validation.set_audience(&[AUDIENCE]);
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);
    validation
}

fn now() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// No signing secret configured
    MissingSecret,
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Bad signature, wrong issuer/audience, malformed or expired token
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Wrong token type (e.g., a download capability presented as a session)
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::MissingSecret => write!(f, "JWT secret is not configured"),
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Invalid or expired token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}
