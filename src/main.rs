// Module declarations
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

// Re-export CONFIG for use in other modules
pub use app_config::CONFIG;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    app::AppState,
    config::RateLimitingConfig,
    db::{
        check_diesel_health, create_diesel_pool, mask_connection_string, DieselDatabaseConfig,
        RedisConfig, RedisPool,
    },
    handlers::{auth_routes, docs as docs_handlers, sessions_routes},
    services::{
        session_manager::build_session_manager, AuthService, EmailService,
        EmailVerificationService, JwtService, PasswordResetService, RateLimitService,
        SessionManagementService, TokenRotationService,
    },
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle version flag for container health checks - must be FIRST
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--version" {
        println!("auth-core v{}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_core=debug,axum=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize centralized config (loads all env vars ONCE)
    let config = crate::app_config::config();
    let bind_address = config.bind_address.clone();
    info!("=== STARTING AUTH CORE API ===");
    info!("Starting auth core API on {}", bind_address);

    // Initialize Diesel database pool
    info!("Initializing database pool...");
    let db_config = DieselDatabaseConfig::default();
    info!("Database URL: {}", mask_connection_string(&db_config.url));

    let max_connections = db_config.max_connections;
    let diesel_pool = match create_diesel_pool(db_config).await {
        Ok(pool) => {
            info!("✓ Database connection pool initialized successfully");
            pool
        },
        Err(e) => {
            error!("✗ Failed to initialize database pool: {}", e);
            return Err(format!("Database initialization failed: {}", e).into());
        },
    };

    // Run embedded migrations (production/test environments)
    if crate::migrations::should_run_migrations() {
        info!("Running embedded migrations...");
        let migration_config = crate::migrations::MigrationConfig::default();

        match crate::migrations::run_all_migrations(&diesel_pool, migration_config).await {
            Ok(()) => {
                info!("✓ All migrations completed successfully");
            },
            Err(e) => {
                error!("✗ Migration failed: {}", e);
                return Err(format!("Migration failed: {}", e).into());
            },
        }
    } else {
        info!("Embedded migrations disabled - using external migration scripts");
    }

    // Initialize Redis pool
    info!("Initializing Redis pool...");
    let redis_config = RedisConfig::from_env();
    let redis_pool = match RedisPool::new(redis_config).await {
        Ok(pool) => {
            info!("✓ Redis connection pool initialized successfully");
            pool
        },
        Err(e) => {
            error!("✗ Failed to initialize Redis pool: {}", e);
            return Err(format!("Redis initialization failed: {}", e).into());
        },
    };

    // Initialize rate limiting service and configuration
    info!("Initializing rate limiting service...");
    let rate_limit_config = Arc::new(RateLimitingConfig::from_env());

    // Validate rate limiting configuration
    if let Err(e) = rate_limit_config.validate() {
        error!("✗ Rate limiting configuration validation failed: {}", e);
        return Err(format!("Rate limiting configuration invalid: {}", e).into());
    }

    // Enable analytics with configured sampling rate for production performance
    let analytics_sample_rate = config.rate_limit_analytics_sample_rate;

    let rate_limit_service = Arc::new(RateLimitService::new_with_analytics(
        redis_pool.clone(),
        analytics_sample_rate,
    ));
    info!(
        "✓ Rate limiting service initialized successfully (analytics enabled with {}% sampling)",
        analytics_sample_rate * 100.0
    );

    // Initialize JWT service
    info!("Initializing JWT service...");
    let jwt_service_value = match JwtService::from_env() {
        Ok(service) => {
            info!("✓ JWT service initialized successfully");
            service
        },
        Err(e) => {
            error!("✗ Failed to initialize JWT service: {}", e);
            return Err(format!("JWT service initialization failed: {}", e).into());
        },
    };
    let jwt_service = Arc::new(jwt_service_value.clone());

    // Initialize email service
    info!("Initializing email service...");
    let email_service_value = match EmailService::new(config.email.clone()) {
        Ok(service) => {
            info!("✓ Email service initialized successfully");
            service
        },
        Err(e) => {
            error!("✗ Failed to initialize email service: {}", e);
            return Err(format!("Email service initialization failed: {}", e).into());
        },
    };
    let email_service = Arc::new(email_service_value.clone());

    // Initialize email verification service
    info!("Initializing email verification service...");
    let email_verification_service_value =
        EmailVerificationService::new(diesel_pool.clone(), email_service_value.clone());
    let email_verification_service = Arc::new(email_verification_service_value.clone());

    // Initialize password reset service
    info!("Initializing password reset service...");
    let password_reset_service_value = PasswordResetService::new(diesel_pool.clone());
    let password_reset_service = Arc::new(password_reset_service_value.clone());

    // Initialize token rotation service
    info!("Initializing token rotation service...");
    let token_rotation_service_value = TokenRotationService::new(diesel_pool.clone());
    let token_rotation_service = Arc::new(token_rotation_service_value.clone());

    // Initialize auth orchestration service
    info!("Initializing auth service...");
    let auth_service = Arc::new(AuthService::new(
        diesel_pool.clone(),
        jwt_service_value,
        email_service_value,
        email_verification_service_value,
        password_reset_service_value,
        token_rotation_service_value,
    ));
    info!("✓ Auth service initialized successfully");

    // Initialize the pluggable session manager (C7) and its HTTP-facing
    // orchestration layer (C8).
    info!("Initializing session manager...");
    let session_manager = Arc::new(build_session_manager(
        &config.session_manager,
        diesel_pool.clone(),
        redis_pool.clone(),
    ));
    let session_management_service = Arc::new(SessionManagementService::new(
        session_manager.clone(),
        redis_pool.clone(),
    ));

    // Create shared application state
    let app_state = AppState {
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
    };

    // Configure CORS - Environment-aware wildcard handling
    info!(
        "CORS: Configuring origins for {} environment: {:?}",
        config.environment, config.cors_allowed_origins
    );

    let has_wildcard = config
        .cors_allowed_origins
        .iter()
        .any(|origin| origin == "*");

    if has_wildcard && !config.is_production() {
        info!("CORS: Using dynamic origin reflection for staging/dev (wildcard with credentials support)");
    } else if has_wildcard && config.is_production() {
        error!("CORS: Wildcard '*' detected in production - will be ignored for security!");
    } else {
        info!(
            "CORS: Using whitelist mode with origins: {:?}",
            config.cors_allowed_origins
        );
    }

    // Build the application router - conditionally include Swagger UI
    let mut app = Router::new()
        // Health check endpoints
        .route("/v1/health", get(comprehensive_health_check))
        .route("/v1/metrics/rate-limiting", get(rate_limit_metrics_handler));

    if config.enable_swagger_ui {
        info!("Swagger UI: ENABLED at /v1/docs");
        app = app
            .route("/v1/docs", get(docs_handlers::redirect_to_docs))
            .route("/v1/docs/", get(docs_handlers::serve_swagger_ui))
            .route("/v1/docs/openapi.json", get(docs_handlers::serve_openapi_spec));
    } else {
        info!("Swagger UI: DISABLED (set ENABLE_SWAGGER_UI=true to enable)");
    }

    // Complete router setup
    let app = app
        // Authentication routes
        .nest("/v1/auth", auth_routes())
        // Session management routes — every operation acts on the caller's
        // own sessions, so the whole sub-router sits behind auth_middleware.
        .nest(
            "/v1/sessions",
            sessions_routes().layer(axum_middleware::from_fn_with_state(
                app_state.clone(),
                crate::middleware::auth_middleware,
            )),
        )
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(crate::middleware::dynamic_cors_middleware))
                .layer(Extension(app_state.clone())),
        )
        .with_state(app_state.clone());

    // Parse and bind to address
    let addr: SocketAddr = bind_address.parse()?;
    info!("Starting HTTP server on {}...", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

// Health check handler
async fn comprehensive_health_check(State(state): State<AppState>) -> impl IntoResponse {
    use serde_json::json;

    let mut overall_healthy = true;
    let timestamp = chrono::Utc::now().to_rfc3339();

    let postgres_health = match check_diesel_health(&state.diesel_pool).await {
        Ok(_) => {
            json!({
                "status": "healthy",
                "max_connections": state.max_connections,
                "error": null
            })
        },
        Err(e) => {
            overall_healthy = false;
            json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e)
            })
        },
    };

    let redis_health_result = state.redis_pool.health_check().await;
    if !redis_health_result.is_healthy {
        overall_healthy = false;
    }
    let redis_health = json!({
        "status": if redis_health_result.is_healthy { "healthy" } else { "unhealthy" },
        "latency_ms": redis_health_result.latency_ms,
        "active_connections": redis_health_result.active_connections,
        "total_connections": redis_health_result.total_connections,
        "error": redis_health_result.error
    });

    let response = json!({
        "status": if overall_healthy { "healthy" } else { "degraded" },
        "service": "auth-core",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health,
            "redis": redis_health
        }
    });

    if overall_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

async fn rate_limit_metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    use serde_json::json;

    let analytics_metrics = state.rate_limit_service.get_analytics_metrics(60).await;
    let monitoring_stats = state.rate_limit_service.get_monitoring_stats().await;

    let response = json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "analytics_enabled": analytics_metrics.is_some(),
        "metrics": analytics_metrics,
        "monitoring": monitoring_stats
    });

    Json(response)
}
