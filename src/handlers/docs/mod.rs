// API Documentation handlers - modular structure
pub mod auth;
pub mod health;
pub mod schemas;
pub mod swagger_ui;

use axum::{
    extract::OriginalUri,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Serve OpenAPI JSON specification at /v1/docs/openapi.json
pub async fn serve_openapi_spec() -> Response {
    let spec = build_openapi_spec();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::to_string(&spec).unwrap_or_default(),
    )
        .into_response()
}

/// Redirect /docs to /docs/ for proper relative path resolution
pub async fn redirect_to_docs(original_uri: OriginalUri) -> impl IntoResponse {
    let mut path = original_uri.0.path().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, path)]).into_response()
}

/// Re-export swagger UI handler
pub use swagger_ui::serve_swagger_ui;

/// Build the complete OpenAPI specification
fn build_openapi_spec() -> serde_json::Value {
    serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Auth Core API",
            "description": "Credential lifecycle, session, and token-rotation API for the aggregation backend",
            "version": "1.0.0",
            "contact": {
                "name": "Backend Team",
                "email": "dev@qck.sh"
            }
        },
        "servers": [
            {
                "url": "http://localhost:10110",
                "description": "Development server (local)"
            }
        ],
        "tags": [
            {
                "name": "Authentication",
                "description": "Credential lifecycle: registration, login, token refresh, password reset"
            },
            {
                "name": "Health",
                "description": "Service health checks"
            }
        ],
        "paths": {
            "/v1/auth/register": auth::register_endpoint(),
            "/v1/auth/login": auth::login_endpoint(),
            "/v1/auth/refresh": auth::refresh_endpoint(),
            "/v1/auth/logout": auth::logout_endpoint(),
            "/v1/auth/me": auth::get_current_user_endpoint(),
            "/v1/auth/validate": auth::validate_token_endpoint(),
            "/v1/auth/change-password": auth::change_password_endpoint(),
            "/v1/auth/verify-email": auth::verify_email_endpoint(),
            "/v1/auth/forgot-password": auth::forgot_password_endpoint(),
            "/v1/auth/reset-password/check": auth::check_reset_token_endpoint(),
            "/v1/auth/reset-password": auth::reset_password_endpoint(),
            "/v1/health": health::health_endpoint(),
        },
        "components": {
            "schemas": schemas::all_schemas(),
            "securitySchemes": {
                "bearerAuth": {
                    "type": "http",
                    "scheme": "bearer",
                    "bearerFormat": "JWT",
                    "description": "Access token obtained from login or refresh endpoints"
                }
            }
        }
    })
}
