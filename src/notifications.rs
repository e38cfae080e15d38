//! Notification emitter.
//!
//! Every notification is appended to the database first, then published to the
//! recipient's live subscribers. Subscribers that fall behind or disconnect only miss the
//! push; the stored copy is still returned by the list endpoint.

use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

use crate::db::{Database, Notification, NotificationKind};

/// How many notifications the list endpoint returns.
pub const LIST_LIMIT: i64 = 20;

/// Buffered pushes per subscriber before the slowest one starts lagging.
const CHANNEL_CAPACITY: usize = 32;

/// Per-user publish/subscribe channels for live notification delivery.
#[derive(Clone, Default)]
pub struct NotificationHub {
    channels: Arc<Mutex<HashMap<i64, broadcast::Sender<Notification>>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> std::sync::MutexGuard<'_, HashMap<i64, broadcast::Sender<Notification>>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to notifications for one user.
    pub fn subscribe(&self, user_id: i64) -> broadcast::Receiver<Notification> {
        self.channels()
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Push a notification to its recipient's subscribers, if any.
    pub fn publish(&self, notification: &Notification) {
        let mut channels = self.channels();
        let Some(sender) = channels.get(&notification.user_id) else {
            return;
        };
        if sender.send(notification.clone()).is_err() {
            // Every receiver is gone
            channels.remove(&notification.user_id);
        }
    }

    /// Drop a user's channel once its last subscriber has gone.
    pub fn release(&self, user_id: i64) {
        let mut channels = self.channels();
        if channels
            .get(&user_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&user_id);
        }
    }

    /// Number of live subscribers for a user.
    pub fn subscriber_count(&self, user_id: i64) -> usize {
        self.channels()
            .get(&user_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

/// Where the client should navigate when a notification is clicked.
pub fn action_url(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::TransactionApproved | NotificationKind::TransactionRejected => "/profile",
        NotificationKind::PendingTransaction => "/admin?tab=transactions",
    }
}

/// A notification as returned to its recipient.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub action_url: &'static str,
}

impl From<Notification> for NotificationView {
    fn from(notification: Notification) -> Self {
        let action_url = action_url(notification.kind);
        Self {
            notification,
            action_url,
        }
    }
}

/// The latest notifications for a user plus the unread total.
#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<NotificationView>,
    pub unread_count: i64,
}

/// Title, message and payload of a notification about to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationContent {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

impl NotificationContent {
    /// Tell a customer their order was approved.
    pub fn transaction_approved(
        transaction_id: i64,
        product_name: &str,
        download_link: Option<&str>,
    ) -> Self {
        Self {
            kind: NotificationKind::TransactionApproved,
            title: "Order approved!".to_string(),
            message: format!(
                "Your order for {} has been approved. You can now download your file.",
                product_name
            ),
            data: json!({
                "transactionId": transaction_id,
                "productName": product_name,
                "downloadLink": download_link,
            }),
        }
    }

    /// Tell a customer their order was rejected.
    pub fn transaction_rejected(transaction_id: i64, product_name: &str) -> Self {
        Self {
            kind: NotificationKind::TransactionRejected,
            title: "Order rejected".to_string(),
            message: format!(
                "Your order for {} was rejected. Please contact an admin for more information.",
                product_name
            ),
            data: json!({
                "transactionId": transaction_id,
                "productName": product_name,
            }),
        }
    }

    /// Tell an admin a new order is waiting for review.
    pub fn pending_transaction(
        transaction_id: i64,
        customer_name: &str,
        product_name: &str,
        amount: i64,
    ) -> Self {
        Self {
            kind: NotificationKind::PendingTransaction,
            title: "New order awaiting approval".to_string(),
            message: format!("{} ordered {}", customer_name, product_name),
            data: json!({
                "transactionId": transaction_id,
                "productName": product_name,
                "customerName": customer_name,
                "amount": amount,
            }),
        }
    }
}

/// Persists notifications and fans them out to live subscribers.
#[derive(Clone)]
pub struct Notifier {
    db: Database,
    hub: NotificationHub,
}

impl Notifier {
    pub fn new(db: Database, hub: NotificationHub) -> Self {
        Self { db, hub }
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    /// Append a notification for a user and push it to their subscribers.
    pub async fn notify(
        &self,
        user_id: i64,
        content: &NotificationContent,
    ) -> Result<Notification, sqlx::Error> {
        let notification = self
            .db
            .notifications()
            .create(
                user_id,
                content.kind,
                &content.title,
                &content.message,
                &content.data,
            )
            .await?;

        debug!(
            user_id,
            notification_id = notification.id,
            kind = content.kind.as_str(),
            "Notification created"
        );
        self.hub.publish(&notification);
        Ok(notification)
    }

    /// Latest notifications for a user, newest first.
    pub async fn list(&self, user_id: i64) -> Result<NotificationList, sqlx::Error> {
        let notifications = self
            .db
            .notifications()
            .list_for_user(user_id, LIST_LIMIT)
            .await?;
        let unread_count = self.db.notifications().count_unread(user_id).await?;

        Ok(NotificationList {
            notifications: notifications.into_iter().map(Into::into).collect(),
            unread_count,
        })
    }

    /// Mark a notification read. Notifications owned by someone else are left untouched
    /// without reporting an error.
    pub async fn mark_read(&self, notification_id: i64, user_id: i64) -> Result<(), sqlx::Error> {
        let updated = self
            .db
            .notifications()
            .mark_read(notification_id, user_id)
            .await?;
        if updated == 0 {
            debug!(notification_id, user_id, "Mark-read matched no notification");
        }
        Ok(())
    }

    pub fn subscribe(&self, user_id: i64) -> broadcast::Receiver<Notification> {
        self.hub.subscribe(user_id)
    }
}
