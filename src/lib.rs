// Library exports for the auth core service
// This file exposes modules and functions for library consumers

pub mod app;
pub mod app_config;
pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use config::{GlobalRateLimitSettings, RateLimitingConfig};
pub use db::{DatabaseConfig, DieselPool, RedisConfig, RedisPool};
pub use middleware::AuthenticatedUser;
pub use middleware::auth_middleware;
pub use models::auth::AccessTokenClaims;
pub use models::refresh_token::{RefreshToken, RefreshTokenError};
pub use services::{
    AnalyticsError, AuthService, EmailService, EmailVerificationService, JwtConfig, JwtError,
    JwtService, LoginOutcome, MonitoringStats, PasswordResetService, RateLimitAnalytics,
    RateLimitConfig, RateLimitEvent, RateLimitMetrics, RateLimitResult, RateLimitService, Session,
    SessionApiError, SessionFilters, SessionManagementService, SessionManager, SessionSummary,
    TokenRotationService,
};

// Re-export handler route builders
pub use handlers::{auth_routes, sessions_routes};

// Re-export individual handlers for direct use
pub use handlers::auth::{
    change_password, check_reset_token, forgot_password, get_current_user, login, logout,
    refresh_token, register, reset_password, validate_token, verify_email,
};
pub use handlers::sessions::{list_sessions, revoke_all_sessions, revoke_other_sessions, revoke_session};

// Diesel database pool type alias
use bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

// Library initialization function for external consumers embedding this
// crate directly rather than running the standalone binary.
pub async fn initialize_app_state() -> Result<AppState, Box<dyn std::error::Error>> {
    use std::sync::Arc;
    use tracing::info;

    // Load environment
    dotenv::dotenv().ok();

    // Initialize config
    let config = app_config::config();

    // Initialize database pool
    info!("Initializing database pool...");
    let db_config = db::DieselDatabaseConfig::default();
    let max_connections = db_config.max_connections;
    let diesel_pool = db::create_diesel_pool(db_config).await?;

    // Run migrations if enabled
    if migrations::should_run_migrations() {
        info!("Running embedded migrations...");
        let migration_config = migrations::MigrationConfig::default();
        migrations::run_all_migrations(&diesel_pool, migration_config).await
            .map_err(|e| format!("Migration failed: {}", e))?;
    }

    // Initialize Redis pool
    info!("Initializing Redis pool...");
    let redis_config = RedisConfig::from_env();
    let redis_pool = RedisPool::new(redis_config).await?;

    // Initialize services
    let rate_limit_config = Arc::new(RateLimitingConfig::from_env());
    let rate_limit_service = Arc::new(RateLimitService::new_with_analytics(
        redis_pool.clone(),
        config.rate_limit_analytics_sample_rate,
    ));

    let jwt_service_value = JwtService::from_env()?;
    let jwt_service = Arc::new(jwt_service_value.clone());

    let email_service_value = EmailService::new(config.email.clone())?;
    let email_service = Arc::new(email_service_value.clone());

    let email_verification_service_value =
        EmailVerificationService::new(diesel_pool.clone(), email_service_value.clone());
    let email_verification_service = Arc::new(email_verification_service_value.clone());

    let password_reset_service_value = PasswordResetService::new(diesel_pool.clone());
    let password_reset_service = Arc::new(password_reset_service_value.clone());

    let token_rotation_service_value = TokenRotationService::new(diesel_pool.clone());
    let token_rotation_service = Arc::new(token_rotation_service_value.clone());

    let auth_service = Arc::new(AuthService::new(
        diesel_pool.clone(),
        jwt_service_value,
        email_service_value,
        email_verification_service_value,
        password_reset_service_value,
        token_rotation_service_value,
    ));

    let session_manager = Arc::new(services::session_manager::build_session_manager(
        &config.session_manager,
        diesel_pool.clone(),
        redis_pool.clone(),
    ));
    let session_management_service = Arc::new(SessionManagementService::new(
        session_manager.clone(),
        redis_pool.clone(),
    ));

    // Create app state
    Ok(AppState {
        config: Arc::new(config.clone()),
        diesel_pool: diesel_pool.clone(),
        redis_pool: redis_pool.clone(),
        jwt_service,
        rate_limit_service,
        rate_limit_config,
        email_service,
        email_verification_service,
        password_reset_service,
        token_rotation_service,
        auth_service,
        session_manager,
        session_management_service,
        max_connections,
    })
}

// Health check handler
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>
) -> impl axum::response::IntoResponse {
    use axum::http::StatusCode;
    use axum::Json;

    let mut overall_healthy = true;
    let timestamp = chrono::Utc::now().to_rfc3339();

    // Check PostgreSQL
    let postgres_health = match db::check_diesel_health(&state.diesel_pool).await {
        Ok(_) => serde_json::json!({
            "status": "healthy",
            "max_connections": state.max_connections,
            "error": null
        }),
        Err(e) => {
            overall_healthy = false;
            serde_json::json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e)
            })
        }
    };

    // Check Redis
    let redis_health_result = state.redis_pool.health_check().await;
    if !redis_health_result.is_healthy {
        overall_healthy = false;
    }

    let response = serde_json::json!({
        "status": if overall_healthy { "healthy" } else { "degraded" },
        "service": "auth-core",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health,
            "redis": serde_json::json!({
                "status": if redis_health_result.is_healthy { "healthy" } else { "unhealthy" },
                "latency_ms": redis_health_result.latency_ms,
                "error": redis_health_result.error
            })
        }
    });

    if overall_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
