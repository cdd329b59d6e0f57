// Authentication handlers: the HTTP surface in front of `services::auth::AuthService`.
// Rate limiting, cookie handling, and response shaping live here; credential
// and token semantics live in the service layer.

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use axum_extra::{
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::UserAgent,
    TypedHeader,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use time::Duration as CookieDuration;
use validator::Validate;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::DeviceContext,
    services::rate_limit::RateLimitConfig,
    utils::auth_errors::AuthError,
};

// =============================================================================
// REQUEST / RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 320, message = "Email must be less than 320 characters"))]
    pub email: String,

    pub password: String,

    #[validate(length(
        min = 1,
        max = 255,
        message = "Full name must be between 1 and 255 characters"
    ))]
    pub full_name: String,

    #[validate(length(max = 255, message = "Company name must be less than 255 characters"))]
    pub company_name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CheckResetTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T> AuthResponse<T> {
    pub(crate) fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: String,
    pub session_id: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub email_verification_required: bool,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub email_verified: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetTokenStatusResponse {
    pub valid: bool,
    pub email: Option<String>,
}

// =============================================================================
// COOKIE HELPERS
// =============================================================================

fn refresh_cookie(token: String, config: &crate::app_config::AppConfig) -> Cookie<'static> {
    Cookie::build(("refresh_token", token))
        .path("/")
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(config.jwt.refresh_expiry as i64))
        .build()
}

fn delete_refresh_cookie(config: &crate::app_config::AppConfig) -> Cookie<'static> {
    Cookie::build(("refresh_token", ""))
        .path("/")
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(-1))
        .build()
}

/// Pull the refresh token out of the cookie jar first (web clients), falling
/// back to the JSON body (mobile clients that can't rely on cookies).
fn extract_refresh_token(jar: &CookieJar, body: &RefreshRequest) -> Result<String, Response> {
    if let Some(cookie) = jar.get("refresh_token") {
        return Ok(cookie.value().to_string());
    }

    body.refresh_token
        .clone()
        .ok_or_else(|| AuthError::ValidationError("Refresh token not provided".to_string()).into_response())
}

fn device_context(addr: SocketAddr, user_agent: Option<String>) -> DeviceContext {
    DeviceContext {
        device_info: None,
        ip_address: Some(addr.ip().to_string()),
        user_agent,
        location: None,
        fingerprint: None,
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    if let Err(errors) = req.validate() {
        return AuthError::ValidationError(format_validation_errors(&errors)).into_response();
    }

    if state.config.enable_rate_limiting {
        let key = format!("register:{}", addr.ip());
        let limit = RateLimitConfig {
            max_requests: 3,
            window_seconds: 3600,
            burst_limit: None,
            block_duration: 3600,
            distributed: true,
        };
        if let Ok(status) = state.rate_limit_service.check_rate_limit_with_config(&key, &limit).await {
            if !status.allowed {
                return AuthError::RateLimited {
                    retry_after_seconds: status.retry_after.unwrap_or(3600) as u64,
                }
                .into_response();
            }
        }
    }

    match state
        .auth_service
        .register(&req.email, &req.password, &req.full_name, req.company_name)
        .await
    {
        Ok(user) => {
            let response = AuthResponse::ok(
                RegisterResponse {
                    user_id: user.id.to_string(),
                    email: user.email,
                    full_name: user.full_name,
                    email_verification_required: state.config.security.require_email_verification,
                },
                "Registration successful",
            );
            (StatusCode::CREATED, Json(response)).into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let ip = addr.ip().to_string();
    let ua = user_agent.map(|TypedHeader(ua)| ua.to_string());
    let email = req.email.trim().to_lowercase();

    if state.config.enable_rate_limiting {
        let ip_key = format!("login:ip:{}", ip);
        let ip_limit = RateLimitConfig {
            max_requests: state.config.security.login_rate_limit_per_ip,
            window_seconds: 60,
            burst_limit: Some(state.config.security.login_rate_limit_per_ip),
            block_duration: 60,
            distributed: true,
        };
        if let Ok(status) = state.rate_limit_service.check_rate_limit_with_config(&ip_key, &ip_limit).await {
            if !status.allowed {
                return AuthError::RateLimited {
                    retry_after_seconds: status.retry_after.unwrap_or(60) as u64,
                }
                .into_response();
            }
        }

        let email_key = format!("login:email:{}", email);
        let email_limit = RateLimitConfig {
            max_requests: state.config.security.login_rate_limit_per_email,
            window_seconds: 3600,
            burst_limit: Some(5),
            block_duration: 3600,
            distributed: true,
        };
        if let Ok(status) = state.rate_limit_service.check_rate_limit_with_config(&email_key, &email_limit).await {
            if !status.allowed {
                return AuthError::RateLimited {
                    retry_after_seconds: status.retry_after.unwrap_or(3600) as u64,
                }
                .into_response();
            }
        }
    }

    let device = device_context(addr, ua);

    match state.auth_service.login(&email, &req.password, device).await {
        Ok(outcome) => {
            let response = AuthResponse::ok(
                LoginResponse {
                    access_token: outcome.access_token,
                    refresh_token: outcome.refresh_token.clone(),
                    expires_in: state.config.jwt.access_expiry,
                    token_type: "Bearer".to_string(),
                    session_id: outcome.session_id.to_string(),
                    user: UserSummary {
                        id: outcome.user.id.to_string(),
                        email: outcome.user.email,
                        full_name: outcome.user.full_name,
                        email_verified: outcome.user.email_verified,
                    },
                },
                "Login successful",
            );

            let cookie = refresh_cookie(outcome.refresh_token, &state.config);
            let jar = jar.add(cookie);
            (StatusCode::OK, jar, Json(response)).into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// POST /auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RefreshRequest>,
) -> impl IntoResponse {
    let token = match extract_refresh_token(&jar, &body) {
        Ok(token) => token,
        Err(response) => return response,
    };

    match state.auth_service.refresh(&token).await {
        Ok(access_token) => {
            let response = AuthResponse::ok(
                TokenResponse {
                    access_token,
                    expires_in: state.config.jwt.access_expiry,
                    token_type: "Bearer".to_string(),
                },
                "Token refreshed successfully",
            );
            (StatusCode::OK, Json(response)).into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RefreshRequest>,
) -> impl IntoResponse {
    let token = match extract_refresh_token(&jar, &body) {
        Ok(token) => token,
        Err(response) => return response,
    };

    let _ = state.auth_service.logout(&token).await;

    let response = AuthResponse::<()> {
        success: true,
        data: None,
        message: "Logout successful".to_string(),
    };

    let jar = jar.add(delete_refresh_cookie(&state.config));
    (StatusCode::OK, jar, Json(response)).into_response()
}

/// GET /auth/me
pub async fn get_current_user(user: AuthenticatedUser, State(state): State<AppState>) -> impl IntoResponse {
    let mut conn = match state.diesel_pool.get().await {
        Ok(conn) => conn,
        Err(e) => return AuthError::DatabaseError(e.to_string()).into_response(),
    };

    match crate::models::User::find_by_id(&mut conn, user.user_id).await {
        Ok(db_user) => {
            let response = AuthResponse::ok(
                UserSummary {
                    id: db_user.id.to_string(),
                    email: db_user.email,
                    full_name: db_user.full_name,
                    email_verified: db_user.email_verified,
                },
                "User info retrieved successfully",
            );
            (StatusCode::OK, Json(response)).into_response()
        },
        Err(e) => AuthError::DatabaseError(e.to_string()).into_response(),
    }
}

/// POST /auth/validate — lets a client confirm its access token is still good.
pub async fn validate_token(user: AuthenticatedUser) -> impl IntoResponse {
    let response = AuthResponse::ok(
        serde_json::json!({ "valid": true, "user_id": user.user_id }),
        "Token is valid",
    );
    Json(response)
}

/// POST /auth/verify-email
pub async fn verify_email(State(state): State<AppState>, Json(req): Json<VerifyEmailRequest>) -> impl IntoResponse {
    match state.auth_service.verify_email(&req.token).await {
        Ok(_user_id) => {
            let response = AuthResponse::<()> {
                success: true,
                data: None,
                message: "Email verified successfully".to_string(),
            };
            (StatusCode::OK, Json(response)).into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// POST /auth/change-password
pub async fn change_password(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Json(req): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    match state
        .auth_service
        .change_password(user.user_id, &req.current_password, &req.new_password)
        .await
    {
        Ok(()) => {
            let response = AuthResponse::<()> {
                success: true,
                data: None,
                message: "Password changed. All sessions have been logged out.".to_string(),
            };
            (StatusCode::OK, Json(response)).into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// POST /auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> impl IntoResponse {
    if let Err(errors) = req.validate() {
        return AuthError::ValidationError(format_validation_errors(&errors)).into_response();
    }

    if state.config.enable_rate_limiting {
        let key = format!("forgot_password:{}", addr.ip());
        let limit = RateLimitConfig {
            max_requests: 3,
            window_seconds: 3600,
            burst_limit: None,
            block_duration: 3600,
            distributed: true,
        };
        if let Ok(status) = state.rate_limit_service.check_rate_limit_with_config(&key, &limit).await {
            if !status.allowed {
                return AuthError::RateLimited {
                    retry_after_seconds: status.retry_after.unwrap_or(3600) as u64,
                }
                .into_response();
            }
        }
    }

    let ua = user_agent.map(|TypedHeader(ua)| ua.to_string());
    let _ = state
        .auth_service
        .request_password_reset(&req.email, Some(addr.ip()), ua)
        .await;

    // Always a uniform success response, regardless of whether the email exists.
    let response = AuthResponse::<()> {
        success: true,
        data: None,
        message: "If an account exists for that email, a reset link has been sent.".to_string(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// POST /auth/reset-password/check — non-consuming probe a reset UI can use
/// to show "link expired" before the user types a new password.
pub async fn check_reset_token(
    State(state): State<AppState>,
    Json(req): Json<CheckResetTokenRequest>,
) -> impl IntoResponse {
    match state.auth_service.check_password_reset_token(&req.token).await {
        Ok(Some((email, _expires_at))) => {
            let response = AuthResponse::ok(
                ResetTokenStatusResponse {
                    valid: true,
                    email: Some(email),
                },
                "Token is valid",
            );
            (StatusCode::OK, Json(response)).into_response()
        },
        Ok(None) => {
            let response = AuthResponse::ok(
                ResetTokenStatusResponse {
                    valid: false,
                    email: None,
                },
                "Token is invalid or expired",
            );
            (StatusCode::OK, Json(response)).into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// POST /auth/reset-password
pub async fn reset_password(State(state): State<AppState>, Json(req): Json<ResetPasswordRequest>) -> impl IntoResponse {
    match state
        .auth_service
        .complete_password_reset(&req.token, &req.new_password)
        .await
    {
        Ok(()) => {
            let response = AuthResponse::<()> {
                success: true,
                data: None,
                message: "Password reset successful. Please log in with your new password.".to_string(),
            };
            (StatusCode::OK, Json(response)).into_response()
        },
        Err(e) => e.into_response(),
    }
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, message)
            })
        })
        .collect::<Vec<_>>()
        .join(", ")
}
