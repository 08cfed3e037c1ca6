mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::TestApp;
use helpdesk::security::Role;

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_error_bodies() {
    let app = TestApp::new();
    let (_, ana_token) = app.user("ana@x.com", "Ana", Role::Customer).await;

    let (status, body) = app.get("/api/tickets", Some("not.a.jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, body) = app
        .post("/api/tickets", Some(&ana_token), json!({ "description": "no subject" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["message"], "subject is required");

    let (status, body) = app
        .get(&format!("/api/tickets/{}", Uuid::new_v4()), Some(&ana_token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = app
        .get("/api/tickets?status=IN_PROGRESS", Some(&ana_token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_rejects_owner_and_number_changes() {
    let app = TestApp::new();
    let (ana, ana_token) = app.user("ana@x.com", "Ana", Role::Customer).await;
    let (_, bob_token) = app.user("bob@x.com", "Bob", Role::Agent).await;
    let (_, ticket) = app
        .post("/api/tickets", Some(&ana_token), json!({ "subject": "x" }))
        .await;
    let id = ticket["id"].as_str().expect("id").to_string();

    let (status, _) = app
        .patch(
            &format!("/api/tickets/{id}"),
            Some(&bob_token),
            json!({ "number": 99 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .patch(
            &format!("/api/tickets/{id}"),
            Some(&bob_token),
            json!({ "customerId": ana.id, "priority": "LOW" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, unchanged) = app.get(&format!("/api/tickets/{id}"), Some(&bob_token)).await;
    assert_eq!(unchanged["number"], 1);
    assert_eq!(unchanged["priority"], "NORMAL");
}

#[tokio::test]
async fn test_category_crud() {
    let app = TestApp::new();
    let (_, ana_token) = app.user("ana@x.com", "Ana", Role::Customer).await;
    let (_, bob_token) = app.user("bob@x.com", "Bob", Role::Agent).await;

    let (status, category) = app
        .post("/api/categories", Some(&bob_token), json!({ "name": "Hardware" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = category["id"].as_str().expect("id").to_string();

    let (status, _) = app
        .post("/api/categories", Some(&ana_token), json!({ "name": "Billing" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, renamed) = app
        .request(
            Method::PUT,
            &format!("/api/categories/{id}"),
            Some(&bob_token),
            Some(json!({ "name": "Devices", "email": "devices@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Devices");

    let (status, ticket) = app
        .post(
            "/api/tickets",
            Some(&ana_token),
            json!({ "subject": "Broken screen", "categoryId": id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ticket["category"]["name"], "Devices");
    let ticket_id = ticket["id"].as_str().expect("id").to_string();

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/categories/{id}"),
            Some(&bob_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, ticket) = app
        .get(&format!("/api/tickets/{ticket_id}"), Some(&ana_token))
        .await;
    assert!(ticket["category"].is_null());

    let (_, listed) = app.get("/api/categories", Some(&ana_token)).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_customer_management() {
    let app = TestApp::new();
    let (_, bob_token) = app.user("bob@x.com", "Bob", Role::Agent).await;

    let (status, customer) = app
        .post(
            "/api/customers",
            Some(&bob_token),
            json!({
                "name": "Ana",
                "email": "Ana@Example.com",
                "password": "long-enough-pass",
                "location": "Madrid"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(customer["email"], "ana@example.com");
    assert_eq!(customer["ticketCount"], 0);
    assert!(customer.get("passwordHash").is_none());
    let id = customer["id"].as_str().expect("id").to_string();

    let (status, _) = app
        .post(
            "/api/customers",
            Some(&bob_token),
            json!({ "name": "Dup", "email": "ana@example.com", "password": "long-enough-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, updated) = app
        .patch(
            &format!("/api/customers/{id}"),
            Some(&bob_token),
            json!({ "phone": "555-0100", "location": null, "emailNotifications": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["phone"], "555-0100");
    assert!(updated["location"].is_null());
    assert_eq!(updated["emailNotifications"], false);

    let (status, ticket) = app
        .post(
            "/api/tickets",
            Some(&bob_token),
            json!({ "subject": "Opened by phone", "customerId": id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ticket["customer"]["email"], "ana@example.com");
    assert!(app.email.sent().await.is_empty());

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/customers/{id}"),
            Some(&bob_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, listed) = app.get("/api/customers", Some(&bob_token)).await;
    assert_eq!(listed[0]["ticketCount"], 1);
}

#[tokio::test]
async fn test_users_and_profile() {
    let app = TestApp::new();
    let (_, admin_token) = app.user("root@x.com", "Root", Role::Admin).await;
    let (_, bob_token) = app.user("bob@x.com", "Bob", Role::Agent).await;
    app.user("ana@x.com", "Ana", Role::Customer).await;

    let (status, created) = app
        .post(
            "/api/users",
            Some(&admin_token),
            json!({ "name": "Carol", "email": "carol@x.com", "password": "long-enough-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["role"], "AGENT");

    let (status, staff) = app.get("/api/users?role=AGENT,ADMIN", Some(&admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(staff.as_array().map(Vec::len), Some(3));

    let (status, _) = app.get("/api/users", Some(&bob_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, profile) = app
        .patch("/api/profile", Some(&bob_token), json!({ "name": "Robert" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["name"], "Robert");

    let (_, me) = app.get("/api/profile", Some(&bob_token)).await;
    assert_eq!(me["name"], "Robert");
    assert_eq!(me["role"], "AGENT");
}
