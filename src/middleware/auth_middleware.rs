// Authentication middleware for protected routes.
// Validates signed access tokens and injects AuthenticatedUser into request extensions.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::{
    app::AppState, middleware::auth::AuthenticatedUser, services::session_api::SessionManagementService,
};

/// Validates the `Authorization: Bearer` header against `state.jwt_service`
/// and inserts an [`AuthenticatedUser`] into the request's extensions for
/// downstream handlers to extract.
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "success": false,
                    "message": "Missing or invalid authorization header"
                })),
            )
                .into_response();
        },
    };

    match app_state.jwt_service.require_type(token, "access") {
        Ok(claims) => {
            if claims.is_expired() {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "success": false,
                        "message": "Invalid or expired token"
                    })),
                )
                    .into_response();
            }

            let user_id = match uuid::Uuid::parse_str(&claims.sub) {
                Ok(id) => id,
                Err(_) => {
                    return (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({
                            "success": false,
                            "message": "Invalid or expired token"
                        })),
                    )
                        .into_response();
                },
            };
            let session_id = claims
                .jti
                .as_deref()
                .and_then(|jti| uuid::Uuid::parse_str(jti).ok());

            if let Some(sid) = session_id {
                if SessionManagementService::is_blacklisted(&app_state.redis_pool, sid).await {
                    return (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({
                            "success": false,
                            "message": "Invalid or expired token"
                        })),
                    )
                        .into_response();
                }
            }

            let auth_user = AuthenticatedUser {
                user_id,
                email: claims.email,
                session_id,
                exp: claims.exp,
            };

            request.extensions_mut().insert(auth_user);
            next.run(request).await
        },
        Err(e) => {
            tracing::warn!("Access token validation failed: {}", e);
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "success": false,
                    "message": "Invalid or expired token"
                })),
            )
                .into_response()
        },
    }
}

/// The optional counterpart to [`auth_middleware`] (§4.10): attempts the same
/// bearer-token validation, but any defect — missing header, invalid
/// signature, expired token, revoked session, unparsable claims — silently
/// yields "no principal" instead of rejecting. Used ahead of endpoints that
/// behave differently for authenticated vs. anonymous callers (e.g. the rate
/// limiter's `user:{id}` vs `ip:{address}` identifier selection) without
/// requiring a session to proceed.
pub async fn optional_auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_user) = try_authenticate(&app_state, &request).await {
        request.extensions_mut().insert(auth_user);
    }
    next.run(request).await
}

async fn try_authenticate(app_state: &AppState, request: &Request<Body>) -> Option<AuthenticatedUser> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))?;

    let claims = app_state.jwt_service.require_type(token, "access").ok()?;
    if claims.is_expired() {
        return None;
    }

    let user_id = uuid::Uuid::parse_str(&claims.sub).ok()?;
    let session_id = claims
        .jti
        .as_deref()
        .and_then(|jti| uuid::Uuid::parse_str(jti).ok());

    if let Some(sid) = session_id {
        if SessionManagementService::is_blacklisted(&app_state.redis_pool, sid).await {
            return None;
        }
    }

    Some(AuthenticatedUser {
        user_id,
        email: claims.email,
        session_id,
        exp: claims.exp,
    })
}

/// Identity extracted by [`optional_auth_middleware`]: `Some` for a valid
/// bearer token, `None` for an anonymous or defective one. Never rejects.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(parts.extensions.get::<AuthenticatedUser>().cloned()))
    }
}

/// Lets handlers take `AuthenticatedUser` directly as an extractor argument
/// rather than `Extension<AuthenticatedUser>`.
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "success": false,
                        "message": "Authentication required"
                    })),
                )
            })
    }
}
