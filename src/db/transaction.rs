//! Transaction storage.
//!
//! Status changes only go through [`TransactionStore::decide`], which refuses to touch a
//! transaction that has already left `pending`.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct TransactionStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "approved" => Some(TransactionStatus::Approved),
            "rejected" => Some(TransactionStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            TransactionStatus::Pending => false,
            TransactionStatus::Approved | TransactionStatus::Rejected => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub amount: i64,
    pub status: TransactionStatus,
    pub payment_proof: Option<String>,
    pub download_link: Option<String>,
    #[serde(skip)]
    pub download_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    user_id: i64,
    product_id: i64,
    amount: i64,
    status: String,
    payment_proof: Option<String>,
    download_link: Option<String>,
    download_token: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            amount: row.amount,
            // The column has a CHECK constraint, so this only falls back on a corrupt row.
            status: TransactionStatus::parse(&row.status).unwrap_or(TransactionStatus::Pending),
            payment_proof: row.payment_proof,
            download_link: row.download_link,
            download_token: row.download_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A transaction joined with its owner and product.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionWithDetails {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub user_name: String,
    pub user_email: String,
    pub product_name: String,
    pub product_price: i64,
    #[serde(skip)]
    pub product_file_url: Option<String>,
}

#[derive(sqlx::FromRow)]
struct DetailsRow {
    #[sqlx(flatten)]
    transaction: TransactionRow,
    user_name: String,
    user_email: String,
    product_name: String,
    product_price: i64,
    product_file_url: Option<String>,
}

impl From<DetailsRow> for TransactionWithDetails {
    fn from(row: DetailsRow) -> Self {
        Self {
            transaction: row.transaction.into(),
            user_name: row.user_name,
            user_email: row.user_email,
            product_name: row.product_name,
            product_price: row.product_price,
            product_file_url: row.product_file_url,
        }
    }
}

/// Query filter for listing transactions.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub owner_id: Option<i64>,
    pub status: Option<TransactionStatus>,
    pub limit: i64,
    pub offset: i64,
}

const TRANSACTION_COLUMNS: &str = "id, user_id, product_id, amount, status, payment_proof, \
     download_link, download_token, created_at, updated_at";

const DETAILS_SELECT: &str = "SELECT
        t.id, t.user_id, t.product_id, t.amount, t.status, t.payment_proof,
        t.download_link, t.download_token, t.created_at, t.updated_at,
        u.name AS user_name, u.email AS user_email,
        p.name AS product_name, p.price AS product_price, p.file_url AS product_file_url
     FROM transactions t
     JOIN users u ON t.user_id = u.id
     JOIN products p ON t.product_id = p.id";

impl TransactionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new pending transaction. Returns the transaction ID.
    pub async fn create(
        &self,
        user_id: i64,
        product_id: i64,
        amount: i64,
        payment_proof: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO transactions (user_id, product_id, amount, payment_proof, status)
             VALUES (?, ?, ?, ?, 'pending')",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(amount)
        .bind(payment_proof)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Transaction>, sqlx::Error> {
        let row: Option<TransactionRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "SELECT {} FROM transactions WHERE id = ?",
            TRANSACTION_COLUMNS
        )))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Transaction::from))
    }

    pub async fn get_with_details(
        &self,
        id: i64,
    ) -> Result<Option<TransactionWithDetails>, sqlx::Error> {
        let row: Option<DetailsRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!("{} WHERE t.id = ?", DETAILS_SELECT)))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(TransactionWithDetails::from))
    }

    /// Move a pending transaction to a terminal status.
    ///
    /// Returns `None` when no pending transaction with this ID exists, which covers both
    /// unknown IDs and transactions that were already decided. The status check and the
    /// write happen in one statement, so two racing decisions cannot both succeed.
    pub async fn decide(
        &self,
        id: i64,
        status: TransactionStatus,
        download_link: Option<&str>,
        download_token: Option<&str>,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        let row: Option<TransactionRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "UPDATE transactions
             SET status = ?, download_link = ?, download_token = ?, updated_at = datetime('now')
             WHERE id = ? AND status = 'pending'
             RETURNING {}",
            TRANSACTION_COLUMNS
        )))
        .bind(status.as_str())
        .bind(download_link)
        .bind(download_token)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Transaction::from))
    }

    /// List transactions matching the filter, newest first.
    pub async fn list(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionWithDetails>, sqlx::Error> {
        let rows: Vec<DetailsRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "{}
             WHERE (?1 IS NULL OR t.user_id = ?1)
               AND (?2 IS NULL OR t.status = ?2)
             ORDER BY t.created_at DESC, t.id DESC
             LIMIT ?3 OFFSET ?4",
            DETAILS_SELECT
        )))
        .bind(filter.owner_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TransactionWithDetails::from).collect())
    }

    /// Count transactions matching the filter, ignoring limit and offset.
    pub async fn count(&self, filter: &TransactionFilter) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM transactions
             WHERE (?1 IS NULL OR user_id = ?1)
               AND (?2 IS NULL OR status = ?2)",
        )
        .bind(filter.owner_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    /// Approved transactions whose product has a file but whose download link is missing.
    /// Returns `(transaction_id, user_id, product_file_url)`.
    pub async fn list_missing_download_links(
        &self,
    ) -> Result<Vec<(i64, i64, String)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT t.id, t.user_id, p.file_url
             FROM transactions t
             JOIN products p ON t.product_id = p.id
             WHERE t.status = 'approved'
               AND (t.download_link IS NULL OR t.download_link = '')
               AND p.file_url IS NOT NULL AND p.file_url != ''",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Fill in the download link of an approved transaction.
    pub async fn set_download_link(
        &self,
        id: i64,
        download_link: &str,
        download_token: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE transactions
             SET download_link = ?, download_token = ?, updated_at = datetime('now')
             WHERE id = ? AND status = 'approved'",
        )
        .bind(download_link)
        .bind(download_token)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the live download capability of an approved transaction.
    pub async fn set_download_token(
        &self,
        id: i64,
        download_token: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE transactions
             SET download_token = ?, updated_at = datetime('now')
             WHERE id = ? AND status = 'approved' AND download_link IS NOT NULL",
        )
        .bind(download_token)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
