mod common;

use axum::http::StatusCode;
use common::{get, request, test_app};
use serde_json::json;
use storefront::db::Role;

// --- Member listing ---

#[tokio::test]
async fn test_members_requires_auth() {
    let t = test_app().await;
    let response = t.send(get("/api/admin/members", None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_members_requires_admin_role() {
    let t = test_app().await;
    let (_, token) = t.login_as("alice@x.com", Role::Customer).await;

    let response = t.send(get("/api/admin/members", Some(&token))).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json["error"], "Admin access required");
}

#[tokio::test]
async fn test_members_include_purchase_totals() {
    let t = test_app().await;
    let (_, admin) = t.login_as("admin@x.com", Role::Admin).await;
    let (alice, alice_token) = t.login_as("alice@x.com", Role::Customer).await;
    let product = t
        .create_product("Template", 2_500, Some("https://files.example.com/t.zip"))
        .await;

    let mut ids = Vec::new();
    for _ in 0..2 {
        let response = t
            .send(request(
                "POST",
                "/api/transactions",
                Some(&alice_token),
                Some(json!({ "product_id": product, "amount": 2_500 })),
            ))
            .await;
        ids.push(response.json["transaction"]["id"].as_i64().unwrap());
    }
    t.send(request(
        "PUT",
        &format!("/api/transactions/{}", ids[0]),
        Some(&admin),
        Some(json!({ "status": "approved" })),
    ))
    .await;

    let response = t.send(get("/api/admin/members", Some(&admin))).await;
    assert_eq!(response.status, StatusCode::OK);

    let members = response.json["members"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    let alice_row = members.iter().find(|m| m["id"] == alice).unwrap();
    assert_eq!(alice_row["total_transactions"], 2);
    assert_eq!(alice_row["total_spent"], 2_500);
    assert!(alice_row.get("password_hash").is_none());
}

#[tokio::test]
async fn test_members_search_and_role_filter() {
    let t = test_app().await;
    let (_, admin) = t.login_as("admin@x.com", Role::Admin).await;
    t.create_user("alice@x.com", "Alice Smith", "secret1", Role::Customer)
        .await;
    t.create_user("bob@x.com", "Bob Jones", "secret1", Role::Customer)
        .await;

    let response = t
        .send(get("/api/admin/members?search=smith", Some(&admin)))
        .await;
    let members = response.json["members"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["email"], "alice@x.com");

    let response = t
        .send(get("/api/admin/members?role=customer", Some(&admin)))
        .await;
    assert_eq!(response.json["members"].as_array().unwrap().len(), 2);

    let response = t
        .send(get("/api/admin/members?role=all", Some(&admin)))
        .await;
    assert_eq!(response.json["members"].as_array().unwrap().len(), 3);

    let response = t
        .send(get("/api/admin/members?role=owner", Some(&admin)))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

// --- Member deletion ---

#[tokio::test]
async fn test_delete_member_without_purchases() {
    let t = test_app().await;
    let (_, admin) = t.login_as("admin@x.com", Role::Admin).await;
    let bob = t
        .create_user("bob@x.com", "Bob", "secret1", Role::Customer)
        .await;

    let response = t
        .send(request(
            "DELETE",
            &format!("/api/admin/members/{}", bob),
            Some(&admin),
            None,
        ))
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(t.db.users().get_by_id(bob).await.unwrap().is_none());

    let response = t
        .send(request(
            "DELETE",
            &format!("/api/admin/members/{}", bob),
            Some(&admin),
            None,
        ))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_member_with_purchases_conflicts() {
    let t = test_app().await;
    let (_, admin) = t.login_as("admin@x.com", Role::Admin).await;
    let (alice, alice_token) = t.login_as("alice@x.com", Role::Customer).await;
    let product = t.create_product("Template", 100, None).await;
    t.send(request(
        "POST",
        "/api/transactions",
        Some(&alice_token),
        Some(json!({ "product_id": product, "amount": 100 })),
    ))
    .await;

    let response = t
        .send(request(
            "DELETE",
            &format!("/api/admin/members/{}", alice),
            Some(&admin),
            None,
        ))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert!(t.db.users().get_by_id(alice).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_admin_is_forbidden() {
    let t = test_app().await;
    let (_, admin) = t.login_as("admin@x.com", Role::Admin).await;
    let other_admin = t
        .create_user("root@x.com", "Root", "secret1", Role::Admin)
        .await;

    let response = t
        .send(request(
            "DELETE",
            &format!("/api/admin/members/{}", other_admin),
            Some(&admin),
            None,
        ))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_customer_cannot_delete_members() {
    let t = test_app().await;
    let (_, alice) = t.login_as("alice@x.com", Role::Customer).await;
    let bob = t
        .create_user("bob@x.com", "Bob", "secret1", Role::Customer)
        .await;

    let response = t
        .send(request(
            "DELETE",
            &format!("/api/admin/members/{}", bob),
            Some(&alice),
            None,
        ))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(t.db.users().get_by_id(bob).await.unwrap().is_some());
}
