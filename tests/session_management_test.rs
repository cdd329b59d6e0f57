// Session management: listing, single-session revocation (rejecting an
// attempt to revoke the caller's own current session), revoke-others, and
// revoke-all, all gated behind `auth_middleware`'s bearer-token check and
// exercised against the real `/v1/sessions` routes.

mod common;

use axum::http::StatusCode;
use common::{setup_test_app, unique_email, STRONG_PASSWORD};
use serde_json::json;

struct LoggedIn {
    access_token: String,
    refresh_token: String,
    session_id: String,
}

async fn register(app: &common::TestApp, email: &str) {
    let response = app
        .post("/v1/auth/register")
        .json(&json!({
            "email": email,
            "password": STRONG_PASSWORD,
            "full_name": "Sessions Fixture",
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

async fn login(app: &common::TestApp, email: &str) -> LoggedIn {
    let response = app
        .post("/v1/auth/login")
        .json(&json!({ "email": email, "password": STRONG_PASSWORD }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    LoggedIn {
        access_token: body["data"]["access_token"].as_str().unwrap().to_string(),
        refresh_token: body["data"]["refresh_token"].as_str().unwrap().to_string(),
        session_id: body["data"]["session_id"].as_str().unwrap().to_string(),
    }
}

#[tokio::test]
async fn sessions_endpoints_require_a_bearer_token() {
    let app = setup_test_app().await;

    let response = app.get("/v1/sessions/").send().await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn listing_sessions_shows_every_active_login_and_flags_the_current_one() {
    let app = setup_test_app().await;
    let email = unique_email("sessions-list");
    register(&app, &email).await;

    let first = login(&app, &email).await;
    let _second = login(&app, &email).await;

    let response = app
        .get("/v1/sessions/")
        .bearer(&first.access_token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await;
    let sessions = body["data"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions
        .iter()
        .any(|s| s["id"] == first.session_id && s["is_current"] == true));
}

#[tokio::test]
async fn revoking_a_session_blocks_its_refresh_token_but_not_others() {
    let app = setup_test_app().await;
    let email = unique_email("sessions-revoke");
    register(&app, &email).await;

    let first = login(&app, &email).await;
    let second = login(&app, &email).await;

    let revoke = app
        .delete(&format!("/v1/sessions/{}", second.session_id))
        .bearer(&first.access_token)
        .send()
        .await;
    assert_eq!(revoke.status(), StatusCode::OK);

    let refresh_revoked = app
        .post("/v1/auth/refresh")
        .json(&json!({ "refresh_token": second.refresh_token }))
        .send()
        .await;
    assert_eq!(refresh_revoked.status(), StatusCode::BAD_REQUEST);

    let refresh_first = app
        .post("/v1/auth/refresh")
        .json(&json!({ "refresh_token": first.refresh_token }))
        .send()
        .await;
    assert_eq!(refresh_first.status(), StatusCode::OK);
}

#[tokio::test]
async fn revoking_the_current_session_via_the_session_endpoint_is_rejected() {
    let app = setup_test_app().await;
    let email = unique_email("sessions-revoke-self");
    register(&app, &email).await;
    let first = login(&app, &email).await;

    let response = app
        .delete(&format!("/v1/sessions/{}", first.session_id))
        .bearer(&first.access_token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn revoke_others_leaves_only_the_current_session_active() {
    let app = setup_test_app().await;
    let email = unique_email("sessions-revoke-others");
    register(&app, &email).await;

    let first = login(&app, &email).await;
    let second = login(&app, &email).await;
    let third = login(&app, &email).await;

    let response = app
        .post("/v1/sessions/revoke-others")
        .bearer(&first.access_token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["data"]["revoked_count"], 2);

    let refresh_first = app
        .post("/v1/auth/refresh")
        .json(&json!({ "refresh_token": first.refresh_token }))
        .send()
        .await;
    assert_eq!(refresh_first.status(), StatusCode::OK);

    for revoked in [&second, &third] {
        let refresh = app
            .post("/v1/auth/refresh")
            .json(&json!({ "refresh_token": revoked.refresh_token }))
            .send()
            .await;
        assert_eq!(refresh.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn revoke_all_ends_every_session_including_the_current_one() {
    let app = setup_test_app().await;
    let email = unique_email("sessions-revoke-all");
    register(&app, &email).await;

    let first = login(&app, &email).await;
    let second = login(&app, &email).await;

    let response = app
        .post("/v1/sessions/revoke-all")
        .bearer(&first.access_token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["data"]["revoked_count"], 2);

    for revoked in [&first, &second] {
        let refresh = app
            .post("/v1/auth/refresh")
            .json(&json!({ "refresh_token": revoked.refresh_token }))
            .send()
            .await;
        assert_eq!(refresh.status(), StatusCode::BAD_REQUEST);
    }
}
