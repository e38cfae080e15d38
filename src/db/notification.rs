//! Notification storage. Rows are append-only apart from the read flag.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct NotificationStore {
    pool: SqlitePool,
}

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Sent to admins when a customer submits a purchase.
    PendingTransaction,
    TransactionApproved,
    TransactionRejected,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PendingTransaction => "pending_transaction",
            NotificationKind::TransactionApproved => "transaction_approved",
            NotificationKind::TransactionRejected => "transaction_rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_transaction" => Some(NotificationKind::PendingTransaction),
            "transaction_approved" => Some(NotificationKind::TransactionApproved),
            "transaction_rejected" => Some(NotificationKind::TransactionRejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: i64,
    user_id: i64,
    #[sqlx(rename = "type")]
    kind: String,
    title: String,
    message: String,
    data: String,
    read: bool,
    created_at: String,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = sqlx::Error;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let kind = NotificationKind::parse(&row.kind).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown notification type: {}", row.kind).into())
        })?;
        let data = serde_json::from_str(&row.data)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            kind,
            title: row.title,
            message: row.message,
            data,
            read: row.read,
            created_at: row.created_at,
        })
    }
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, type, title, message, data, read, created_at";

impl NotificationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a notification for a user.
    pub async fn create(
        &self,
        user_id: i64,
        kind: NotificationKind,
        title: &str,
        message: &str,
        data: &serde_json::Value,
    ) -> Result<Notification, sqlx::Error> {
        let row: NotificationRow = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "INSERT INTO notifications (user_id, type, title, message, data)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {}",
            NOTIFICATION_COLUMNS
        )))
        .bind(user_id)
        .bind(kind.as_str())
        .bind(title)
        .bind(message)
        .bind(data.to_string())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    /// Latest notifications for a user, newest first.
    pub async fn list_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let rows: Vec<NotificationRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "SELECT {} FROM notifications
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
            NOTIFICATION_COLUMNS
        )))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Notification::try_from).collect()
    }

    /// Number of unread notifications for a user.
    pub async fn count_unread(&self, user_id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read = 0")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }

    /// Mark a notification as read. Only matches rows owned by `user_id`.
    /// Returns the number of rows affected.
    pub async fn mark_read(&self, id: i64, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET read = 1, updated_at = datetime('now')
             WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Count notifications of one kind for a user.
    pub async fn count_by_kind(
        &self,
        user_id: i64,
        kind: NotificationKind,
    ) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND type = ?")
                .bind(user_id)
                .bind(kind.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }
}
