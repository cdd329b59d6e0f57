// Email verification token issue/consume service.
//
// Mirrors `password_reset.rs`'s opaque-token pattern: a 32-byte random secret
// is handed to the user, only its SHA-256 hash is ever persisted, and lookup
// on consume is a constant-time scan over `used_at IS NULL` candidates (see
// the Open Question entry in DESIGN.md for why this isn't Argon2).

use base64::prelude::*;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::net::IpAddr;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{
    app_config::config,
    db::DieselPool,
    models::{EmailVerificationToken, NewEmailVerificationToken, User},
    schema::{email_verification_tokens, users},
    services::email::EmailService,
    utils::auth_errors::AuthError,
};

#[derive(Clone)]
pub struct EmailVerificationService {
    pool: DieselPool,
    email: EmailService,
    timing_attack_delay_ms: u64,
}

#[derive(Debug)]
pub struct VerificationTokenInfo {
    pub token: String,
    pub token_hash: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl EmailVerificationService {
    pub fn new(pool: DieselPool, email: EmailService) -> Self {
        Self {
            pool,
            email,
            timing_attack_delay_ms: 150,
        }
    }

    /// Generate a cryptographically secure email-verification token.
    pub fn generate_verification_token() -> VerificationTokenInfo {
        let mut token_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut token_bytes);

        let token = BASE64_URL_SAFE_NO_PAD.encode(token_bytes);

        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        let token_hash = format!("{:x}", hasher.finalize());

        let expires_at =
            Utc::now() + Duration::seconds(config().security.email_verification_ttl_seconds as i64);

        VerificationTokenInfo {
            token,
            token_hash,
            expires_at,
        }
    }

    /// Issue a fresh verification token for `user_id` and email it. Any
    /// unconsumed tokens already on file for this user are discarded first,
    /// so only the most recently issued link ever works.
    pub async fn issue(
        &self,
        user_id: Uuid,
        to_email: &str,
        user_name: &str,
        ip_address: Option<IpAddr>,
        user_agent: Option<String>,
    ) -> Result<(), AuthError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Database connection failed: {}", e)))?;

        diesel::delete(
            email_verification_tokens::table
                .filter(email_verification_tokens::user_id.eq(user_id))
                .filter(email_verification_tokens::used_at.is_null()),
        )
        .execute(&mut conn)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to clean existing tokens: {}", e)))?;

        let token_info = Self::generate_verification_token();

        let new_token = NewEmailVerificationToken::new(
            user_id,
            token_info.token_hash.clone(),
            token_info.expires_at,
            ip_address.map(|ip| ip.to_string()),
            user_agent,
        );

        diesel::insert_into(email_verification_tokens::table)
            .values(&new_token)
            .execute(&mut conn)
            .await
            .map_err(|e| {
                AuthError::DatabaseError(format!("Failed to create verification token: {}", e))
            })?;

        drop(conn);

        let expiry_hours =
            ((config().security.email_verification_ttl_seconds + 3599) / 3600).max(1) as u32;

        self.email
            .send_email_verification_link(to_email, user_name, &token_info.token, expiry_hours)
            .await
            .map_err(|e| {
                tracing::error!("Failed to send verification email: {}", e);
                AuthError::InternalError
            })?;

        tracing::info!("Email verification token issued for user {}", user_id);

        Ok(())
    }

    /// Validate and consume a verification token, marking the owning user's
    /// email confirmed. Sends the welcome email best-effort: its failure
    /// never fails the verification that already committed.
    pub async fn verify(&self, token: &str) -> Result<Uuid, AuthError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Database connection failed: {}", e)))?;

        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        let provided_token_hash = format!("{:x}", hasher.finalize());

        let candidates: Vec<EmailVerificationToken> = email_verification_tokens::table
            .filter(email_verification_tokens::used_at.is_null())
            .filter(email_verification_tokens::expires_at.gt(Utc::now()))
            .load(&mut conn)
            .await
            .map_err(|e| {
                AuthError::DatabaseError(format!("Failed to load verification tokens: {}", e))
            })?;

        let mut found: Option<EmailVerificationToken> = None;
        for candidate in candidates {
            let is_match = provided_token_hash
                .as_bytes()
                .ct_eq(candidate.token_hash.as_bytes());
            if is_match.into() {
                found = Some(candidate);
                break;
            }
        }

        let verification_token = found.ok_or(AuthError::InvalidToken)?;

        diesel::update(email_verification_tokens::table.find(verification_token.id))
            .set(email_verification_tokens::used_at.eq(Utc::now()))
            .execute(&mut conn)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to mark token as used: {}", e)))?;

        let user = diesel::update(users::table.find(verification_token.user_id))
            .set((
                users::email_verified.eq(true),
                users::email_verified_at.eq(Some(Utc::now())),
                users::updated_at.eq(Utc::now()),
            ))
            .get_result::<User>(&mut conn)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to confirm user email: {}", e)))?;

        drop(conn);

        tracing::info!("Email verified for user {}", user.id);

        if let Err(e) = self
            .email
            .send_welcome_email(&user.email, &user.full_name)
            .await
        {
            tracing::warn!(
                "Welcome email send failed for user {} (verification already committed): {}",
                user.id,
                e
            );
        }

        Ok(user.id)
    }

    /// Re-issue a verification link for an already-registered, unverified
    /// email. Silently no-ops (after a timing-matched delay) for unknown or
    /// already-verified addresses so the endpoint can't be used to probe
    /// account existence.
    pub async fn resend(&self, email: &str) -> Result<(), AuthError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Database connection failed: {}", e)))?;

        let user: Option<User> = users::table
            .filter(users::email.eq(email))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| AuthError::DatabaseError(format!("Failed to look up user: {}", e)))?;

        drop(conn);

        let user = match user {
            Some(user) if !user.email_verified => user,
            _ => {
                tokio::time::sleep(std::time::Duration::from_millis(
                    self.timing_attack_delay_ms,
                ))
                .await;
                return Ok(());
            },
        };

        self.issue(user.id, &user.email, &user.full_name, None, None)
            .await
    }

    /// Delete expired, unconsumed tokens (periodic housekeeping).
    pub async fn cleanup_expired_tokens(&self) -> Result<u64, AuthError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Database connection failed: {}", e)))?;

        let deleted_count = diesel::delete(
            email_verification_tokens::table
                .filter(email_verification_tokens::expires_at.lt(Utc::now())),
        )
        .execute(&mut conn)
        .await
        .map_err(|e| {
            AuthError::DatabaseError(format!("Failed to cleanup expired tokens: {}", e))
        })?;

        if deleted_count > 0 {
            tracing::info!(
                "Cleaned up {} expired email verification tokens",
                deleted_count
            );
        }

        Ok(deleted_count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_verification_token_has_expected_shape() {
        let info = EmailVerificationService::generate_verification_token();

        assert_eq!(info.token_hash.len(), 64);
        assert!(!info.token.is_empty());
        assert!(info.expires_at > Utc::now());
    }

    #[test]
    fn generate_verification_token_produces_distinct_tokens() {
        let a = EmailVerificationService::generate_verification_token();
        let b = EmailVerificationService::generate_verification_token();

        assert_ne!(a.token, b.token);
        assert_ne!(a.token_hash, b.token_hash);
    }
}
