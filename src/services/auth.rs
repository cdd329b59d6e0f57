// Auth orchestration — the register/login/refresh/logout/change-password
// surface, composed out of the password (C1), signed-token (C2),
// email-verification (C3), password-reset (C4), and token-rotation (C5)
// services. Handlers call through here rather than touching models directly.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    app_config::config,
    db::DieselPool,
    models::{DeviceContext, NewUser, RefreshToken, SecurityConfig, User, UserError, UserUpdate},
    services::{
        email::EmailService, email_verification::EmailVerificationService, jwt::JwtService,
        password_reset::PasswordResetService, token_rotation::TokenRotationService,
    },
    utils::{
        auth_errors::AuthError,
        password::{hash_password, needs_rehash, validate_strength, PasswordConfig},
        verify_password,
    },
};

#[derive(Clone)]
pub struct AuthService {
    pool: DieselPool,
    jwt: JwtService,
    email: EmailService,
    email_verification: EmailVerificationService,
    password_reset: PasswordResetService,
    rotation: TokenRotationService,
}

pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub session_id: Uuid,
    pub user: User,
}

/// A password hash string no real user could ever produce — compared
/// against on the "user not found" branch of login so the verify step
/// always runs and the two paths cost the same wall-clock time.
const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHQxMjM0NTY3OA$YWJjZGVmZ2hpamtsbW5vcHFyc3R1dnd4eXo";

impl AuthService {
    pub fn new(
        pool: DieselPool,
        jwt: JwtService,
        email: EmailService,
        email_verification: EmailVerificationService,
        password_reset: PasswordResetService,
        rotation: TokenRotationService,
    ) -> Self {
        Self {
            pool,
            jwt,
            email,
            email_verification,
            password_reset,
            rotation,
        }
    }

    /// Register a new, unverified account and kick off email verification.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        company_name: Option<String>,
    ) -> Result<User, AuthError> {
        validate_strength(password).map_err(AuthError::ValidationError)?;

        let email = email.trim().to_lowercase();
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Database connection failed: {}", e)))?;

        match User::find_by_email(&mut conn, &email).await {
            Ok(_) => {
                return Err(AuthError::Conflict(
                    "An account with this email address already exists".to_string(),
                ));
            },
            Err(UserError::NotFound) => {},
            Err(e) => return Err(AuthError::DatabaseError(e.to_string())),
        }

        let password_hash = hash_password(password).map_err(|e| {
            tracing::error!("Failed to hash password during registration: {}", e);
            AuthError::InternalError
        })?;

        let new_user = NewUser {
            email: email.clone(),
            password_hash: Some(password_hash),
            full_name: full_name.to_string(),
            company_name,
        };

        let user = User::create(&mut conn, new_user)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        drop(conn);

        if let Err(e) = self
            .email_verification
            .issue(user.id, &user.email, &user.full_name, None, None)
            .await
        {
            tracing::error!(
                "Failed to issue email verification token for new user {}: {}",
                user.id,
                e
            );
        }

        tracing::info!("New user registered: {}", user.email);
        Ok(user)
    }

    /// Consume an email-verification token. See `EmailVerificationService::verify`.
    pub async fn verify_email(&self, token: &str) -> Result<Uuid, AuthError> {
        self.email_verification.verify(token).await
    }

    /// Authenticate and mint a fresh access/refresh token pair.
    ///
    /// The password-verify step always runs, even for an unknown email
    /// (against `DUMMY_PASSWORD_HASH`), so the unknown-user and
    /// wrong-password paths cost comparable wall-clock time.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device: DeviceContext,
    ) -> Result<LoginOutcome, AuthError> {
        let email = email.trim().to_lowercase();
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Database connection failed: {}", e)))?;

        let user = match User::find_by_email(&mut conn, &email).await {
            Ok(user) => Some(user),
            Err(UserError::NotFound) => None,
            Err(e) => return Err(AuthError::DatabaseError(e.to_string())),
        };

        let password_matches = verify_password(
            password,
            user.as_ref()
                .and_then(|u| u.password_hash.as_deref())
                .unwrap_or(DUMMY_PASSWORD_HASH),
        )
        .unwrap_or(false);

        let Some(user) = user else {
            return Err(AuthError::InvalidCredentials);
        };

        if !password_matches {
            let update = user.record_failed_login(
                config().security.login_lockout_threshold as i32,
                config().security.login_lockout_duration_seconds as i64,
            );
            let locked = update.account_locked_until.flatten().is_some();
            User::update(&mut conn, user.id, update)
                .await
                .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

            if locked {
                return Err(AuthError::AccountLocked {
                    retry_after_seconds: config().security.login_lockout_duration_seconds as u64,
                });
            }
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }
        if user.is_locked() {
            let retry_after = user
                .account_locked_until
                .map(|until| (until - Utc::now()).num_seconds().max(0) as u64)
                .unwrap_or(0);
            return Err(AuthError::AccountLocked {
                retry_after_seconds: retry_after,
            });
        }
        if config().security.require_email_verification && !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        // Silently upgrade the stored hash if its work factor is stale.
        if let Ok(true) = needs_rehash(
            user.password_hash.as_deref().unwrap_or(DUMMY_PASSWORD_HASH),
            &PasswordConfig::default(),
        ) {
            if let Ok(rehashed) = hash_password(password) {
                let _ = User::update(
                    &mut conn,
                    user.id,
                    UserUpdate {
                        password_hash: Some(Some(rehashed)),
                        ..Default::default()
                    },
                )
                .await;
            }
        }

        let update = user.record_successful_login(device.ip_address.clone());
        let user = User::update(&mut conn, user.id, update)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let global_version = SecurityConfig::current_global_min_version(&mut conn)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let (secret, secret_hash) = RefreshToken::generate_secret();
        let expires_at =
            Utc::now() + Duration::seconds(config().jwt.refresh_expiry as i64);

        let refresh_row = RefreshToken::store(
            &mut conn,
            user.id,
            secret_hash,
            expires_at,
            user.min_token_version,
            global_version,
            device,
        )
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let access_token = self
            .jwt
            .make_access(&user.id.to_string(), &user.email, Some(&refresh_row.id.to_string()))
            .map_err(|e| AuthError::TokenError(e.to_string()))?;

        tracing::info!("Login successful for user {}", user.id);

        Ok(LoginOutcome {
            access_token,
            refresh_token: secret,
            session_id: refresh_row.id,
            user,
        })
    }

    /// Mint a fresh access token for a still-valid refresh token. The
    /// refresh token itself is not rotated (sticky refresh).
    pub async fn refresh(&self, refresh_token_plain: &str) -> Result<String, AuthError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Database connection failed: {}", e)))?;

        let token = RefreshToken::find_by_secret(&mut conn, refresh_token_plain)
            .await
            .map_err(|_| AuthError::InvalidToken)?;

        let global_version = SecurityConfig::current_global_min_version(&mut conn)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let user = User::find_by_id(&mut conn, token.user_id)
            .await
            .map_err(|_| AuthError::InvalidToken)?;

        if !token.is_valid_for_versions(user.min_token_version, global_version) {
            return Err(AuthError::InvalidToken);
        }
        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        RefreshToken::mark_as_used(&mut conn, token.id)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        self.jwt
            .make_access(&user.id.to_string(), &user.email, Some(&token.id.to_string()))
            .map_err(|e| AuthError::TokenError(e.to_string()))
    }

    /// Revoke a single refresh token. A no-match is treated as success so
    /// logout never leaks whether a token existed.
    pub async fn logout(&self, refresh_token_plain: &str) -> Result<(), AuthError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Database connection failed: {}", e)))?;

        if let Ok(token) = RefreshToken::find_by_secret(&mut conn, refresh_token_plain).await {
            RefreshToken::revoke(&mut conn, token.id)
                .await
                .map_err(|e| AuthError::DatabaseError(e.to_string()))?;
        }

        Ok(())
    }

    /// Change a known-authenticated user's password, cascading a full
    /// session sign-out via C5.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_strength(new_password).map_err(AuthError::ValidationError)?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Database connection failed: {}", e)))?;

        let user = User::find_by_id(&mut conn, user_id)
            .await
            .map_err(|e| match e {
                UserError::NotFound => AuthError::UserNotFound,
                e => AuthError::DatabaseError(e.to_string()),
            })?;

        let matches = verify_password(
            current_password,
            user.password_hash.as_deref().unwrap_or(DUMMY_PASSWORD_HASH),
        )
        .unwrap_or(false);
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = hash_password(new_password).map_err(|e| {
            tracing::error!("Failed to hash password during password change: {}", e);
            AuthError::InternalError
        })?;

        User::update(
            &mut conn,
            user_id,
            UserUpdate {
                password_hash: Some(Some(new_hash)),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        drop(conn);

        self.rotation
            .rotate_user(user_id, "password changed by the account holder")
            .await?;

        if let Err(e) = self
            .email
            .send_password_change_notification(&user.email, &user.full_name, "unknown", "unknown")
            .await
        {
            tracing::warn!("Failed to send password-change notification: {}", e);
        }

        Ok(())
    }

    /// Kick off the uniform, enumeration-safe password-reset request flow.
    pub async fn request_password_reset(
        &self,
        email: &str,
        ip_address: Option<std::net::IpAddr>,
        user_agent: Option<String>,
    ) -> Result<(), AuthError> {
        let token_info = self
            .password_reset
            .create_reset_request(email, ip_address, user_agent)
            .await?;

        let Some(token_info) = token_info else {
            return Ok(());
        };

        let user_name = self
            .password_reset
            .get_user_name_by_email(email)
            .await?
            .unwrap_or_else(|| "there".to_string());

        if let Err(e) = self
            .email
            .send_password_reset_email(email, &user_name, &token_info.token)
            .await
        {
            tracing::error!("Failed to send password reset email to {}: {}", email, e);
        }

        Ok(())
    }

    /// Check a reset token's validity without consuming it (probe endpoint).
    pub async fn check_password_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<(String, chrono::DateTime<Utc>)>, AuthError> {
        self.password_reset.check_token_validity(token).await
    }

    /// Complete a password reset: consume the token (cascading session
    /// revocation, per `PasswordResetService::validate_and_consume_token`),
    /// set the new password, and notify the user.
    pub async fn complete_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_strength(new_password).map_err(AuthError::ValidationError)?;

        let user_id = self.password_reset.validate_and_consume_token(token).await?;

        let new_hash = hash_password(new_password).map_err(|e| {
            tracing::error!("Failed to hash password during password reset: {}", e);
            AuthError::InternalError
        })?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Database connection failed: {}", e)))?;

        let user = User::update(
            &mut conn,
            user_id,
            UserUpdate {
                password_hash: Some(Some(new_hash)),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        drop(conn);

        if let Err(e) = self
            .email
            .send_password_change_notification(&user.email, &user.full_name, "unknown", "unknown")
            .await
        {
            tracing::warn!("Failed to send password-change notification: {}", e);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::DUMMY_PASSWORD_HASH;
    use crate::utils::verify_password;

    #[test]
    fn dummy_hash_is_a_well_formed_argon2_string() {
        assert!(DUMMY_PASSWORD_HASH.starts_with("$argon2id$"));
        // It must parse and simply never match a real password.
        assert_eq!(
            verify_password("any password at all", DUMMY_PASSWORD_HASH).unwrap(),
            false
        );
    }
}
