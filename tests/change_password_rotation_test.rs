// Change-password: requires the current password, enforces the same
// strength rule as registration, and cascades a full token-version rotation
// so every refresh token issued before the change stops working — including
// the very session that performed the change.

mod common;

use axum::http::StatusCode;
use common::{setup_test_app, unique_email, STRONG_PASSWORD};
use serde_json::json;

const NEW_PASSWORD: &str = "Freshly-Rotated-Battery-3";

#[tokio::test]
async fn change_password_revokes_all_outstanding_refresh_tokens() {
    let app = setup_test_app().await;
    let email = unique_email("change-pw");

    let register_response = app
        .post("/v1/auth/register")
        .json(&json!({
            "email": email,
            "password": STRONG_PASSWORD,
            "full_name": "Rotation Fixture",
        }))
        .send()
        .await;
    assert_eq!(register_response.status(), StatusCode::CREATED);

    let first_login = app
        .post("/v1/auth/login")
        .json(&json!({ "email": email, "password": STRONG_PASSWORD }))
        .send()
        .await;
    assert_eq!(first_login.status(), StatusCode::OK);
    let first_login_body: serde_json::Value = first_login.json().await;
    let first_access_token = first_login_body["data"]["access_token"].as_str().unwrap().to_string();
    let first_refresh_token = first_login_body["data"]["refresh_token"].as_str().unwrap().to_string();

    let second_login = app
        .post("/v1/auth/login")
        .json(&json!({ "email": email, "password": STRONG_PASSWORD }))
        .send()
        .await;
    assert_eq!(second_login.status(), StatusCode::OK);
    let second_login_body: serde_json::Value = second_login.json().await;
    let second_refresh_token = second_login_body["data"]["refresh_token"].as_str().unwrap().to_string();

    let change_response = app
        .post("/v1/auth/change-password")
        .bearer(&first_access_token)
        .json(&json!({ "current_password": STRONG_PASSWORD, "new_password": NEW_PASSWORD }))
        .send()
        .await;
    assert_eq!(change_response.status(), StatusCode::OK);

    // Both sessions' refresh tokens — including the one that requested the
    // change — are invalidated by the rotation.
    let refresh_first = app
        .post("/v1/auth/refresh")
        .json(&json!({ "refresh_token": first_refresh_token }))
        .send()
        .await;
    assert_eq!(refresh_first.status(), StatusCode::BAD_REQUEST);

    let refresh_second = app
        .post("/v1/auth/refresh")
        .json(&json!({ "refresh_token": second_refresh_token }))
        .send()
        .await;
    assert_eq!(refresh_second.status(), StatusCode::BAD_REQUEST);

    let old_password_login = app
        .post("/v1/auth/login")
        .json(&json!({ "email": email, "password": STRONG_PASSWORD }))
        .send()
        .await;
    assert_eq!(old_password_login.status(), StatusCode::UNAUTHORIZED);

    let new_password_login = app
        .post("/v1/auth/login")
        .json(&json!({ "email": email, "password": NEW_PASSWORD }))
        .send()
        .await;
    assert_eq!(new_password_login.status(), StatusCode::OK);
}

#[tokio::test]
async fn change_password_rejects_the_wrong_current_password() {
    let app = setup_test_app().await;
    let email = unique_email("change-pw-wrong");

    let register_response = app
        .post("/v1/auth/register")
        .json(&json!({
            "email": email,
            "password": STRONG_PASSWORD,
            "full_name": "Wrong Current Password",
        }))
        .send()
        .await;
    assert_eq!(register_response.status(), StatusCode::CREATED);

    let login_response = app
        .post("/v1/auth/login")
        .json(&json!({ "email": email, "password": STRONG_PASSWORD }))
        .send()
        .await;
    let login_body: serde_json::Value = login_response.json().await;
    let access_token = login_body["data"]["access_token"].as_str().unwrap();

    let response = app
        .post("/v1/auth/change-password")
        .bearer(access_token)
        .json(&json!({ "current_password": "not-the-current-password", "new_password": NEW_PASSWORD }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
