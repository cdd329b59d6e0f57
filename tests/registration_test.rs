// Registration: successful signup, duplicate-email rejection, weak-password
// rejection, and malformed-payload validation, against the real
// `POST /v1/auth/register` route and `RegisterRequest` shape.

mod common;

use axum::http::StatusCode;
use common::{setup_test_app, unique_email, STRONG_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn register_creates_an_unverified_account() {
    let app = setup_test_app().await;
    let email = unique_email("register");

    let response = app
        .post("/v1/auth/register")
        .json(&json!({
            "email": email,
            "password": STRONG_PASSWORD,
            "full_name": "Ada Lovelace",
            "company_name": "Analytical Engines Ltd",
        }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);

    let body: serde_json::Value = response.json().await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], email);
    assert_eq!(body["data"]["full_name"], "Ada Lovelace");
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let app = setup_test_app().await;
    let email = unique_email("dup");

    let payload = json!({
        "email": email,
        "password": STRONG_PASSWORD,
        "full_name": "Grace Hopper",
    });

    let first = app.post("/v1/auth/register").json(&payload).send().await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app.post("/v1/auth/register").json(&payload).send().await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_rejects_weak_password() {
    let app = setup_test_app().await;

    let response = app
        .post("/v1/auth/register")
        .json(&json!({
            "email": unique_email("weak"),
            "password": "short",
            "full_name": "Weak Password",
        }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_rejects_malformed_email() {
    let app = setup_test_app().await;

    let response = app
        .post("/v1/auth/register")
        .json(&json!({
            "email": "not-an-email",
            "password": STRONG_PASSWORD,
            "full_name": "Bad Email",
        }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
