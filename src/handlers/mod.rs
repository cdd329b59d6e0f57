// HTTP handlers

pub mod auth;
pub mod docs; // Modular documentation structure
pub mod sessions;

use crate::app::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};

// Authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh_token))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::get_current_user))
        .route("/validate", post(auth::validate_token))
        .route("/change-password", post(auth::change_password))
        .route("/verify-email", post(auth::verify_email))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password/check", post(auth::check_reset_token))
        .route("/reset-password", post(auth::reset_password))
}

// Session management routes. Mounted behind `auth_middleware` by the binary,
// since every operation here acts on the calling user's own sessions.
pub fn sessions_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(sessions::list_sessions))
        .route("/revoke-others", post(sessions::revoke_other_sessions))
        .route("/revoke-all", post(sessions::revoke_all_sessions))
        .route("/{session_id}", delete(sessions::revoke_session))
}
