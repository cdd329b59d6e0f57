// Session management handlers: the HTTP surface in front of
// `services::session_api::SessionManagementService`. Mirrors
// `handlers::auth`'s shape (AuthResponse envelope, inline rate limiting,
// AuthenticatedUser extraction) but every operation here acts on the
// calling user's own sessions rather than credentials.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::{
    app::AppState, handlers::auth::AuthResponse, middleware::auth::AuthenticatedUser,
    utils::auth_errors::AuthError,
};

/// Applies `limit` against `key` when rate limiting is enabled, returning an
/// early error response on rejection. Parallels the inline check every
/// `handlers::auth` endpoint already does, generalized so each session
/// endpoint doesn't repeat the `enable_rate_limiting` branch. Fails open: a
/// limiter backend error is logged and the request proceeds, matching
/// `handlers::auth::register`'s own `if let Ok(status) = ...` idiom.
async fn enforce_rate_limit(
    state: &AppState,
    key: &str,
    limit: &crate::services::rate_limit::RateLimitConfig,
) -> Result<(), AuthError> {
    if !state.config.enable_rate_limiting {
        return Ok(());
    }

    if let Ok(status) = state.rate_limit_service.check_rate_limit_with_config(key, limit).await {
        if !status.allowed {
            return Err(AuthError::RateLimited {
                retry_after_seconds: status.retry_after.unwrap_or(limit.window_seconds) as u64,
            });
        }
    }

    Ok(())
}

/// GET /sessions
pub async fn list_sessions(user: AuthenticatedUser, State(state): State<AppState>) -> impl IntoResponse {
    let key = format!("sessions:list:{}", user.user_id);
    if let Err(e) = enforce_rate_limit(
        &state,
        &key,
        &crate::services::SessionManagementService::list_rate_limit(),
    )
    .await
    {
        return e.into_response();
    }

    match state
        .session_management_service
        .list(user.user_id, user.session_id)
        .await
    {
        Ok(sessions) => {
            let response = AuthResponse::ok(sessions, "Sessions retrieved successfully");
            Json(response).into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// DELETE /sessions/{session_id}
pub async fn revoke_session(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let key = format!("sessions:revoke:{}", user.user_id);
    if let Err(e) = enforce_rate_limit(
        &state,
        &key,
        &crate::services::SessionManagementService::revoke_rate_limit(),
    )
    .await
    {
        return e.into_response();
    }

    match state
        .session_management_service
        .revoke(user.user_id, session_id, user.session_id)
        .await
    {
        Ok(()) => {
            let response = AuthResponse::<()> {
                success: true,
                data: None,
                message: "Session revoked successfully".to_string(),
            };
            Json(response).into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// POST /sessions/revoke-others
pub async fn revoke_other_sessions(
    user: AuthenticatedUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let key = format!("sessions:revoke_others:{}", user.user_id);
    if let Err(e) = enforce_rate_limit(
        &state,
        &key,
        &crate::services::SessionManagementService::revoke_others_rate_limit(),
    )
    .await
    {
        return e.into_response();
    }

    let Some(current_session_id) = user.session_id else {
        return AuthError::BadRequest("Current session could not be determined".to_string())
            .into_response();
    };

    match state
        .session_management_service
        .revoke_others(user.user_id, current_session_id)
        .await
    {
        Ok(count) => {
            let response = AuthResponse::ok(
                serde_json::json!({ "revoked_count": count }),
                "Other sessions revoked successfully",
            );
            Json(response).into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// POST /sessions/revoke-all
pub async fn revoke_all_sessions(user: AuthenticatedUser, State(state): State<AppState>) -> impl IntoResponse {
    let key = format!("sessions:revoke_all:{}", user.user_id);
    if let Err(e) = enforce_rate_limit(
        &state,
        &key,
        &crate::services::SessionManagementService::revoke_all_rate_limit(),
    )
    .await
    {
        return e.into_response();
    }

    match state.session_management_service.revoke_all(user.user_id).await {
        Ok(count) => {
            let response = AuthResponse::ok(
                serde_json::json!({ "revoked_count": count }),
                "All sessions revoked successfully",
            );
            Json(response).into_response()
        },
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_configs_match_session_api_tiers() {
        assert_eq!(
            crate::services::SessionManagementService::list_rate_limit().max_requests,
            10
        );
        assert_eq!(
            crate::services::SessionManagementService::revoke_all_rate_limit().max_requests,
            3
        );
    }
}
