// Application state and configuration
use std::sync::Arc;

use crate::{
    app_config::AppConfig,
    config::RateLimitingConfig,
    db::DieselPool,
    services::{
        session_manager::SessionManager, AuthService, EmailService, EmailVerificationService,
        JwtService, PasswordResetService, RateLimitService, SessionManagementService,
        TokenRotationService,
    },
    RedisPool,
};

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub diesel_pool: DieselPool,
    pub redis_pool: RedisPool,
    pub jwt_service: Arc<JwtService>,
    pub rate_limit_service: Arc<RateLimitService>,
    pub rate_limit_config: Arc<RateLimitingConfig>,
    pub email_service: Arc<EmailService>,
    pub email_verification_service: Arc<EmailVerificationService>,
    pub password_reset_service: Arc<PasswordResetService>,
    pub token_rotation_service: Arc<TokenRotationService>,
    pub auth_service: Arc<AuthService>,
    pub session_manager: Arc<SessionManager>,
    pub session_management_service: Arc<SessionManagementService>,
    pub max_connections: u32,
}
