// Rate limiting: registration is capped at 3 requests/hour per source IP
// (`handlers::auth::register`'s inline `RateLimitConfig`), so a 4th attempt
// from the same IP within the window is rejected with 429 even though each
// payload is otherwise well-formed.

mod common;

use axum::http::StatusCode;
use common::{setup_test_app, unique_email, STRONG_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn a_fourth_registration_from_the_same_ip_within_the_hour_is_rate_limited() {
    let app = setup_test_app().await;
    let ip = "127.2.0.1";

    let mut statuses = Vec::new();
    for _ in 0..4 {
        let response = app
            .post("/v1/auth/register")
            .with_ip(ip)
            .json(&json!({
                "email": unique_email("rate-limit"),
                "password": STRONG_PASSWORD,
                "full_name": "Rate Limited",
            }))
            .send()
            .await;
        statuses.push(response.status());
    }

    assert_eq!(&statuses[0..3], [StatusCode::CREATED; 3]);
    assert_eq!(statuses[3], StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn a_different_source_ip_is_not_affected_by_another_ips_rate_limit() {
    let app = setup_test_app().await;

    for _ in 0..3 {
        let response = app
            .post("/v1/auth/register")
            .with_ip("127.2.0.2")
            .json(&json!({
                "email": unique_email("rate-limit-a"),
                "password": STRONG_PASSWORD,
                "full_name": "Rate Limited A",
            }))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .post("/v1/auth/register")
        .with_ip("127.2.0.3")
        .json(&json!({
            "email": unique_email("rate-limit-b"),
            "password": STRONG_PASSWORD,
            "full_name": "Rate Limited B",
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}
