// Refresh/logout: a valid refresh token (from either the cookie or the JSON
// body) mints a fresh access token without rotating itself (sticky), an
// invalid or already-logged-out token is rejected, and logout is idempotent
// against a repeat call with the same token.

mod common;

use axum::http::StatusCode;
use common::{setup_test_app, unique_email, STRONG_PASSWORD};
use serde_json::json;

async fn register_and_login(app: &common::TestApp, email: &str) -> serde_json::Value {
    let register_response = app
        .post("/v1/auth/register")
        .json(&json!({
            "email": email,
            "password": STRONG_PASSWORD,
            "full_name": "Refresh Fixture",
        }))
        .send()
        .await;
    assert_eq!(register_response.status(), StatusCode::CREATED);

    let login_response = app
        .post("/v1/auth/login")
        .json(&json!({ "email": email, "password": STRONG_PASSWORD }))
        .send()
        .await;
    assert_eq!(login_response.status(), StatusCode::OK);
    login_response.json().await
}

#[tokio::test]
async fn refresh_with_a_body_token_mints_a_new_access_token() {
    let app = setup_test_app().await;
    let email = unique_email("refresh-body");
    let login_body = register_and_login(&app, &email).await;
    let refresh_token = login_body["data"]["refresh_token"].as_str().unwrap();
    let first_access_token = login_body["data"]["access_token"].as_str().unwrap();

    let response = app
        .post("/v1/auth/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    let second_access_token = body["data"]["access_token"].as_str().unwrap();
    assert_ne!(first_access_token, second_access_token);

    // The refresh token itself is not rotated: a second refresh still works.
    let again = app
        .post("/v1/auth/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await;
    assert_eq!(again.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_rejects_an_unknown_token() {
    let app = setup_test_app().await;

    let response = app
        .post("/v1/auth/refresh")
        .json(&json!({ "refresh_token": "not-a-real-refresh-token" }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_revokes_the_refresh_token_and_is_idempotent() {
    let app = setup_test_app().await;
    let email = unique_email("logout");
    let login_body = register_and_login(&app, &email).await;
    let refresh_token = login_body["data"]["refresh_token"].as_str().unwrap();

    let logout_response = app
        .post("/v1/auth/logout")
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await;
    assert_eq!(logout_response.status(), StatusCode::OK);
    assert!(logout_response
        .cookie("refresh_token")
        .unwrap()
        .contains("refresh_token="));

    // The revoked token can no longer refresh a new access token.
    let refresh_after_logout = app
        .post("/v1/auth/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await;
    assert_eq!(refresh_after_logout.status(), StatusCode::BAD_REQUEST);

    // Logging out again with the same (already-revoked) token is still a success.
    let second_logout = app
        .post("/v1/auth/logout")
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await;
    assert_eq!(second_logout.status(), StatusCode::OK);
}
