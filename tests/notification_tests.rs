//! Tests for the notification inbox.

mod common;

use axum::http::StatusCode;
use common::{TestApp, get, request, test_app};
use serde_json::json;
use storefront::db::Role;

async fn place_order(t: &TestApp, customer: &str) -> i64 {
    let product = t
        .create_product("Template", 100, Some("https://files.example.com/t.zip"))
        .await;
    let response = t
        .send(request(
            "POST",
            "/api/transactions",
            Some(customer),
            Some(json!({ "product_id": product, "amount": 100 })),
        ))
        .await;
    response.json["transaction"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_list_requires_authentication() {
    let t = test_app().await;
    let response = t.send(get("/api/notifications", None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_sees_pending_order() {
    let t = test_app().await;
    let (_, admin) = t.login_as("admin@x.com", Role::Admin).await;
    let (_, customer) = t.login_as("alice@x.com", Role::Customer).await;
    let tx_id = place_order(&t, &customer).await;

    let response = t.send(get("/api/notifications", Some(&admin))).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["unread_count"], 1);
    let notifications = response.json["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    let n = &notifications[0];
    assert_eq!(n["type"], "pending_transaction");
    assert_eq!(n["title"], "New order awaiting approval");
    assert_eq!(n["read"], false);
    assert_eq!(n["action_url"], "/admin?tab=transactions");
    assert_eq!(n["data"]["transactionId"], tx_id);

    let customer_inbox = t.send(get("/api/notifications", Some(&customer))).await;
    assert_eq!(customer_inbox.json["unread_count"], 0);
}

#[tokio::test]
async fn test_customer_sees_decision() {
    let t = test_app().await;
    let (_, admin) = t.login_as("admin@x.com", Role::Admin).await;
    let (_, customer) = t.login_as("alice@x.com", Role::Customer).await;
    let tx_id = place_order(&t, &customer).await;

    t.send(request(
        "PUT",
        &format!("/api/transactions/{}", tx_id),
        Some(&admin),
        Some(json!({ "status": "approved" })),
    ))
    .await;

    let response = t.send(get("/api/notifications", Some(&customer))).await;
    let n = &response.json["notifications"][0];
    assert_eq!(n["type"], "transaction_approved");
    assert_eq!(n["action_url"], "/profile");
    assert_eq!(n["data"]["productName"], "Template");
}

#[tokio::test]
async fn test_mark_read() {
    let t = test_app().await;
    let (_, admin) = t.login_as("admin@x.com", Role::Admin).await;
    let (_, customer) = t.login_as("alice@x.com", Role::Customer).await;
    place_order(&t, &customer).await;

    let inbox = t.send(get("/api/notifications", Some(&admin))).await;
    let id = inbox.json["notifications"][0]["id"].as_i64().unwrap();

    let response = t
        .send(request(
            "PATCH",
            "/api/notifications",
            Some(&admin),
            Some(json!({ "notificationId": id })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["success"], true);

    let inbox = t.send(get("/api/notifications", Some(&admin))).await;
    assert_eq!(inbox.json["unread_count"], 0);
    assert_eq!(inbox.json["notifications"][0]["read"], true);
}

#[tokio::test]
async fn test_mark_read_of_someone_elses_notification_is_silent() {
    let t = test_app().await;
    let (_, admin) = t.login_as("admin@x.com", Role::Admin).await;
    let (_, customer) = t.login_as("alice@x.com", Role::Customer).await;
    place_order(&t, &customer).await;

    let inbox = t.send(get("/api/notifications", Some(&admin))).await;
    let id = inbox.json["notifications"][0]["id"].as_i64().unwrap();

    let response = t
        .send(request(
            "PATCH",
            "/api/notifications",
            Some(&customer),
            Some(json!({ "notification_id": id })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["success"], true);

    let inbox = t.send(get("/api/notifications", Some(&admin))).await;
    assert_eq!(inbox.json["unread_count"], 1);
}

#[tokio::test]
async fn test_mark_read_requires_id() {
    let t = test_app().await;
    let (_, customer) = t.login_as("alice@x.com", Role::Customer).await;

    let response = t
        .send(request(
            "PATCH",
            "/api/notifications",
            Some(&customer),
            Some(json!({})),
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_websocket_requires_authentication() {
    let t = test_app().await;
    let response = t.send(get("/api/notifications/ws", None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_mark_read_with_malformed_id() {
    let t = test_app().await;
    let (_, customer) = t.login_as("alice@x.com", Role::Customer).await;

    let response = t
        .send(request(
            "PATCH",
            "/api/notifications",
            Some(&customer),
            Some(json!({ "notification_id": "first" })),
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json["error"].is_string());
}
