//! Deny-list for session tokens revoked before their natural expiry.
//!
//! Entries only need to live as long as the token they block; expired entries are purged
//! by the cleanup scheduler.

use sqlx::sqlite::SqlitePool;

use super::timestamp_to_datetime;

pub struct RevokedTokenStore {
    pool: SqlitePool,
}

impl RevokedTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Revoke a token by its JWT ID. Revoking twice is harmless.
    pub async fn revoke(&self, jti: &str, expires_at: u64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO revoked_tokens (jti, expires_at) VALUES (?, ?)")
            .bind(jti)
            .bind(timestamp_to_datetime(expires_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn is_revoked(&self, jti: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT jti FROM revoked_tokens WHERE jti = ?")
            .bind(jti)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Delete entries whose token has expired anyway.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < datetime('now')")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
