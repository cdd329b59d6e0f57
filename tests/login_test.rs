// Login: credential verification, the uniform invalid-credentials response
// for both a wrong password and an unknown email, account lockout after
// repeated failures, and the refresh_token cookie/session_id shape of a
// successful login, against the real `POST /v1/auth/login` route.

mod common;

use axum::http::StatusCode;
use common::{setup_test_app, unique_email, STRONG_PASSWORD};
use serde_json::json;

async fn register(app: &common::TestApp, email: &str) {
    let response = app
        .post("/v1/auth/register")
        .json(&json!({
            "email": email,
            "password": STRONG_PASSWORD,
            "full_name": "Login Fixture",
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn login_with_correct_credentials_returns_tokens_and_sets_cookie() {
    let app = setup_test_app().await;
    let email = unique_email("login-ok");
    register(&app, &email).await;

    let response = app
        .post("/v1/auth/login")
        .json(&json!({ "email": email, "password": STRONG_PASSWORD }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.cookie("refresh_token").is_some());

    let body: serde_json::Value = response.json().await;
    assert_eq!(body["data"]["user"]["email"], email);
    assert!(body["data"]["access_token"].as_str().unwrap().len() > 0);
    assert!(body["data"]["refresh_token"].as_str().unwrap().len() > 0);
    assert!(body["data"]["session_id"].as_str().is_some());
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() {
    let app = setup_test_app().await;
    let email = unique_email("login-wrong-pw");
    register(&app, &email).await;

    let response = app
        .post("/v1/auth/login")
        .json(&json!({ "email": email, "password": "definitely-the-wrong-password" }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_with_unknown_email_returns_the_same_error_as_wrong_password() {
    let app = setup_test_app().await;

    let response = app
        .post("/v1/auth/login")
        .json(&json!({ "email": unique_email("never-registered"), "password": STRONG_PASSWORD }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// The default `LOGIN_LOCKOUT_THRESHOLD` is 10 failed attempts; the default
/// per-email login rate limit is also 10/hour, so exactly 10 requests (the
/// failure that crosses the lockout threshold) must still land before any
/// rate limiter kicks in. Each attempt uses a distinct source IP so the
/// per-IP limiter (5/minute) doesn't interfere with counting failures.
#[tokio::test]
async fn repeated_failed_logins_lock_the_account() {
    let app = setup_test_app().await;
    let email = unique_email("lockout");
    register(&app, &email).await;

    let mut last_status = StatusCode::OK;
    for i in 0..10u8 {
        let response = app
            .post("/v1/auth/login")
            .with_ip(&format!("127.0.{}.{}", i, i + 1))
            .json(&json!({ "email": email, "password": "still-the-wrong-password" }))
            .send()
            .await;
        last_status = response.status();
    }

    assert_eq!(last_status, StatusCode::FORBIDDEN);

    let response = app
        .post("/v1/auth/login")
        .with_ip("127.0.99.1")
        .json(&json!({ "email": email, "password": STRONG_PASSWORD }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
