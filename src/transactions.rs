//! Transaction lifecycle.
//!
//! A transaction starts `pending` and is decided exactly once by an admin. Approval copies
//! the product's file reference into `download_link` and mints a download capability for
//! the owner. Every state change is followed by a notification.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::AuthenticatedUser;
use crate::db::{Database, TransactionFilter, TransactionStatus, TransactionWithDetails};
use crate::jwt::{JwtConfig, JwtError};
use crate::notifications::{NotificationContent, Notifier};

/// Default page size for transaction listings.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Largest page size a client may ask for.
pub const MAX_PAGE_SIZE: i64 = 100;

/// An admin's verdict on a pending transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// Parse the target status of a decision. `pending` is not a decision.
    pub fn parse(status: &str) -> Option<Self> {
        match TransactionStatus::parse(status)? {
            TransactionStatus::Approved => Some(Decision::Approve),
            TransactionStatus::Rejected => Some(Decision::Reject),
            TransactionStatus::Pending => None,
        }
    }

    fn status(self) -> TransactionStatus {
        match self {
            Decision::Approve => TransactionStatus::Approved,
            Decision::Reject => TransactionStatus::Rejected,
        }
    }
}

#[derive(Debug)]
pub enum TransactionError {
    /// Unknown transaction or product, or a transaction the caller may not see
    NotFound,
    /// The submitted amount differs from the product price
    AmountMismatch { expected: i64, got: i64 },
    /// The transaction has already been decided
    InvalidStateTransition { current: TransactionStatus },
    /// The operation needs the admin role
    AdminAccessRequired,
    /// The download capability is invalid, expired or belongs to someone else
    InvalidDownloadToken,
    Database(sqlx::Error),
    Token(JwtError),
}

impl std::fmt::Display for TransactionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionError::NotFound => write!(f, "Transaction not found"),
            TransactionError::AmountMismatch { expected, got } => {
                write!(f, "Amount {} does not match product price {}", got, expected)
            }
            TransactionError::InvalidStateTransition { current } => {
                write!(f, "Transaction has already been {}", current.as_str())
            }
            TransactionError::AdminAccessRequired => write!(f, "Admin access required"),
            TransactionError::InvalidDownloadToken => write!(f, "Invalid or expired download link"),
            TransactionError::Database(e) => write!(f, "Database error: {}", e),
            TransactionError::Token(e) => write!(f, "Token error: {}", e),
        }
    }
}

impl std::error::Error for TransactionError {}

impl From<sqlx::Error> for TransactionError {
    fn from(e: sqlx::Error) -> Self {
        TransactionError::Database(e)
    }
}

impl From<JwtError> for TransactionError {
    fn from(e: JwtError) -> Self {
        TransactionError::Token(e)
    }
}

/// Listing parameters as supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub owner_id: Option<i64>,
    pub status: Option<TransactionStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// A transaction as shown to a caller. Owners of an approved transaction also get a
/// `download_url` carrying the transaction's live download capability.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub details: TransactionWithDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<TransactionView>,
    pub pagination: Pagination,
}

#[derive(Clone)]
pub struct TransactionService {
    db: Database,
    jwt: Arc<JwtConfig>,
    notifier: Notifier,
}

impl TransactionService {
    pub fn new(db: Database, jwt: Arc<JwtConfig>, notifier: Notifier) -> Self {
        Self { db, jwt, notifier }
    }

    /// Record a purchase by `actor`. The owner is always the caller.
    pub async fn create(
        &self,
        actor: &AuthenticatedUser,
        product_id: i64,
        amount: i64,
        payment_proof: Option<&str>,
    ) -> Result<TransactionView, TransactionError> {
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or(TransactionError::NotFound)?;

        if amount != product.price {
            warn!(
                user_id = actor.user_id(),
                product_id,
                amount,
                price = product.price,
                "Rejected purchase with mismatched amount"
            );
            return Err(TransactionError::AmountMismatch {
                expected: product.price,
                got: amount,
            });
        }

        let id = self
            .db
            .transactions()
            .create(actor.user_id(), product_id, amount, payment_proof)
            .await?;
        let details = self
            .db
            .transactions()
            .get_with_details(id)
            .await?
            .ok_or(TransactionError::NotFound)?;

        info!(
            transaction_id = id,
            user_id = actor.user_id(),
            product_id,
            amount,
            "Transaction created"
        );

        self.notify_admins(&details).await;
        self.view(details, actor).await
    }

    /// Approve or reject a pending transaction. Admin only; a transaction is decided once.
    pub async fn decide(
        &self,
        transaction_id: i64,
        decision: Decision,
        actor: &AuthenticatedUser,
    ) -> Result<TransactionView, TransactionError> {
        if !actor.is_admin() {
            return Err(TransactionError::AdminAccessRequired);
        }

        let details = self
            .db
            .transactions()
            .get_with_details(transaction_id)
            .await?
            .ok_or(TransactionError::NotFound)?;

        let current = details.transaction.status;
        if current.is_terminal() {
            return Err(TransactionError::InvalidStateTransition { current });
        }

        let (download_link, download_token) = match decision {
            Decision::Approve => match details.product_file_url.as_deref() {
                Some(file_url) if !file_url.is_empty() => {
                    let token = self
                        .jwt
                        .issue_download(transaction_id, details.transaction.user_id)?;
                    (Some(file_url.to_string()), Some(token))
                }
                _ => (None, None),
            },
            Decision::Reject => (None, None),
        };

        let updated = self
            .db
            .transactions()
            .decide(
                transaction_id,
                decision.status(),
                download_link.as_deref(),
                download_token.as_deref(),
            )
            .await?;

        let Some(updated) = updated else {
            // Another decision landed between the read and the conditional update
            let current = self
                .db
                .transactions()
                .get_by_id(transaction_id)
                .await?
                .ok_or(TransactionError::NotFound)?
                .status;
            return Err(TransactionError::InvalidStateTransition { current });
        };

        info!(
            transaction_id,
            admin_id = actor.user_id(),
            status = updated.status.as_str(),
            "Transaction decided"
        );

        let details = TransactionWithDetails {
            transaction: updated,
            ..details
        };
        self.notify_owner(&details).await;
        self.view(details, actor).await
    }

    /// List transactions. Non-admins only ever see their own, whatever the query says.
    pub async fn list(
        &self,
        query: &ListQuery,
        actor: &AuthenticatedUser,
    ) -> Result<TransactionPage, TransactionError> {
        let owner_id = if actor.is_admin() {
            query.owner_id
        } else {
            Some(actor.user_id())
        };
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let filter = TransactionFilter {
            owner_id,
            status: query.status,
            limit,
            offset: (page - 1).saturating_mul(limit),
        };

        let total = self.db.transactions().count(&filter).await?;
        let rows = self.db.transactions().list(&filter).await?;
        let mut transactions = Vec::with_capacity(rows.len());
        for details in rows {
            transactions.push(self.view(details, actor).await?);
        }

        Ok(TransactionPage {
            transactions,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: (total + limit - 1) / limit,
            },
        })
    }

    /// Fetch one transaction. Someone else's transaction looks exactly like a missing one.
    pub async fn get(
        &self,
        transaction_id: i64,
        actor: &AuthenticatedUser,
    ) -> Result<TransactionView, TransactionError> {
        let details = self
            .db
            .transactions()
            .get_with_details(transaction_id)
            .await?
            .ok_or(TransactionError::NotFound)?;

        if !actor.is_admin() && details.transaction.user_id != actor.user_id() {
            return Err(TransactionError::NotFound);
        }

        self.view(details, actor).await
    }

    /// Fill in missing download links on approved transactions. Returns how many were fixed.
    pub async fn repair_download_links(
        &self,
        actor: &AuthenticatedUser,
    ) -> Result<u64, TransactionError> {
        if !actor.is_admin() {
            return Err(TransactionError::AdminAccessRequired);
        }

        let missing = self.db.transactions().list_missing_download_links().await?;
        let mut fixed = 0;
        for (transaction_id, user_id, file_url) in missing {
            let token = self.jwt.issue_download(transaction_id, user_id)?;
            if self
                .db
                .transactions()
                .set_download_link(transaction_id, &file_url, &token)
                .await?
            {
                fixed += 1;
            }
        }

        info!(count = fixed, admin_id = actor.user_id(), "Repaired download links");
        Ok(fixed)
    }

    /// Resolve a download capability to the file it grants access to.
    pub async fn resolve_download(
        &self,
        token: &str,
        actor: &AuthenticatedUser,
    ) -> Result<String, TransactionError> {
        let claims = self
            .jwt
            .verify_download(token)
            .map_err(|_| TransactionError::InvalidDownloadToken)?;

        if claims.user_id != actor.user_id() {
            warn!(
                transaction_id = claims.transaction_id,
                user_id = actor.user_id(),
                "Download capability presented by another user"
            );
            return Err(TransactionError::InvalidDownloadToken);
        }

        let transaction = self
            .db
            .transactions()
            .get_by_id(claims.transaction_id)
            .await?
            .ok_or(TransactionError::NotFound)?;

        // Only the most recently issued capability is redeemable
        if transaction.download_token.as_deref() != Some(token) {
            return Err(TransactionError::InvalidDownloadToken);
        }

        match (transaction.status, transaction.download_link) {
            (TransactionStatus::Approved, Some(link)) if transaction.user_id == actor.user_id() => {
                Ok(link)
            }
            _ => Err(TransactionError::NotFound),
        }
    }

    async fn view(
        &self,
        details: TransactionWithDetails,
        actor: &AuthenticatedUser,
    ) -> Result<TransactionView, TransactionError> {
        let tx = &details.transaction;
        let download_url = if tx.user_id == actor.user_id()
            && tx.status == TransactionStatus::Approved
            && tx.download_link.is_some()
        {
            let token = self
                .live_download_token(tx.id, tx.user_id, tx.download_token.as_deref())
                .await?;
            Some(format!("/api/downloads/{}", token))
        } else {
            None
        };
        Ok(TransactionView {
            details,
            download_url,
        })
    }

    /// The stored capability while it is still valid, otherwise a freshly minted one that
    /// replaces it.
    async fn live_download_token(
        &self,
        transaction_id: i64,
        user_id: i64,
        stored: Option<&str>,
    ) -> Result<String, TransactionError> {
        if let Some(stored) = stored {
            if self.jwt.verify_download(stored).is_ok() {
                return Ok(stored.to_string());
            }
        }

        let token = self.jwt.issue_download(transaction_id, user_id)?;
        self.db
            .transactions()
            .set_download_token(transaction_id, &token)
            .await?;
        Ok(token)
    }

    async fn notify_admins(&self, details: &TransactionWithDetails) {
        let admins = match self.db.users().list_admin_ids().await {
            Ok(admins) => admins,
            Err(e) => {
                warn!(error = %e, "Failed to look up admins for notification");
                return;
            }
        };

        let content = NotificationContent::pending_transaction(
            details.transaction.id,
            &details.user_name,
            &details.product_name,
            details.transaction.amount,
        );
        for admin_id in admins {
            if let Err(e) = self.notifier.notify(admin_id, &content).await {
                warn!(admin_id, error = %e, "Failed to notify admin");
            }
        }
    }

    async fn notify_owner(&self, details: &TransactionWithDetails) {
        let tx = &details.transaction;
        let content = match tx.status {
            TransactionStatus::Approved => NotificationContent::transaction_approved(
                tx.id,
                &details.product_name,
                tx.download_link.as_deref(),
            ),
            TransactionStatus::Rejected => {
                NotificationContent::transaction_rejected(tx.id, &details.product_name)
            }
            TransactionStatus::Pending => return,
        };

        if let Err(e) = self.notifier.notify(tx.user_id, &content).await {
            warn!(transaction_id = tx.id, error = %e, "Failed to notify transaction owner");
        }
    }
}
