// Token version rotation — the cascade-revocation half of the hybrid
// rotation model. A per-user rotation invalidates every refresh token issued
// to one account; a global rotation invalidates every refresh token in the
// system, optionally after a grace period. Both paths bump a version counter
// and sweep `refresh_tokens` for rows issued under an older version.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    db::DieselPool,
    models::{RefreshToken, SecurityConfig, User, UserUpdate},
    utils::auth_errors::AuthError,
};

/// Minimum length a rotation reason string must carry, so audit trails never
/// read "reason: x". Enforced here rather than at the DTO layer since both
/// the per-user and global paths take a reason and neither has its own DTO.
pub const MIN_REASON_LENGTH: usize = 20;

#[derive(Clone)]
pub struct TokenRotationService {
    pool: DieselPool,
}

#[derive(Debug, Clone)]
pub struct UserRotationResult {
    pub user_id: Uuid,
    pub new_token_version: i32,
    pub revoked_count: usize,
}

#[derive(Debug, Clone)]
pub struct GlobalRotationResult {
    pub new_global_version: i32,
    pub affected_tokens: usize,
    pub affected_users: usize,
    pub effective_at: chrono::DateTime<chrono::Utc>,
}

impl TokenRotationService {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }

    fn validate_reason(reason: &str) -> Result<(), AuthError> {
        if reason.trim().chars().count() < MIN_REASON_LENGTH {
            return Err(AuthError::ValidationError(format!(
                "Rotation reason must be at least {} characters",
                MIN_REASON_LENGTH
            )));
        }
        Ok(())
    }

    /// Invalidate every refresh token currently issued to `user_id`. Used
    /// after a password change, a password reset, or an operator-initiated
    /// "sign out everywhere" action.
    ///
    /// Picks the new version strictly above both the user's current
    /// `min_token_version` and the highest `token_version` any of their
    /// live tokens already carries, so a rotation can never accidentally
    /// leave a token valid.
    pub async fn rotate_user(
        &self,
        user_id: Uuid,
        reason: &str,
    ) -> Result<UserRotationResult, AuthError> {
        Self::validate_reason(reason)?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Database connection failed: {}", e)))?;

        let user = User::find_by_id(&mut conn, user_id)
            .await
            .map_err(|e| match e {
                crate::models::UserError::NotFound => AuthError::UserNotFound,
                e => AuthError::DatabaseError(e.to_string()),
            })?;

        let max_issued = RefreshToken::max_token_version_for_user(&mut conn, user_id)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let new_version = user.min_token_version.max(max_issued) + 1;

        User::update(
            &mut conn,
            user_id,
            UserUpdate {
                min_token_version: Some(new_version),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let revoked_count =
            RefreshToken::revoke_stale_versions_for_user(&mut conn, user_id, new_version)
                .await
                .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        tracing::info!(
            user_id = %user_id,
            new_token_version = new_version,
            revoked_count,
            reason,
            "User token version rotated"
        );

        Ok(UserRotationResult {
            user_id,
            new_token_version: new_version,
            revoked_count,
        })
    }

    /// Invalidate every refresh token in the system, effective either
    /// immediately (`grace_minutes == 0`) or after a grace window. During the
    /// grace window tokens remain usable; `refresh_tokens.revoked_at` is
    /// stamped with the future effective time for forensic/UX purposes, but
    /// validity is gated on `is_revoked` alone, so a grace window only delays
    /// when the row is marked revoked, not whether it eventually is.
    ///
    /// Logged at error severity: this is the single most disruptive
    /// operation the service exposes, sufficient reason to sign every
    /// session out system-wide, and should never fire silently.
    pub async fn rotate_global(
        &self,
        reason: &str,
        initiator: &str,
        grace_minutes: i64,
    ) -> Result<GlobalRotationResult, AuthError> {
        Self::validate_reason(reason)?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Database connection failed: {}", e)))?;

        let old_version = SecurityConfig::current_global_min_version(&mut conn)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let new_version = SecurityConfig::bump_global_version(
            &mut conn,
            Some(initiator.to_string()),
            Some(reason.to_string()),
        )
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let effective_at = Utc::now() + Duration::minutes(grace_minutes.max(0));

        let (affected_tokens, affected_users) =
            RefreshToken::revoke_stale_global(&mut conn, new_version, effective_at)
                .await
                .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        tracing::error!(
            old_global_version = old_version,
            new_global_version = new_version,
            affected_tokens,
            affected_users,
            initiator,
            reason,
            grace_minutes,
            effective_at = %effective_at,
            "Global token version rotated — every session in the system is being signed out"
        );

        Ok(GlobalRotationResult {
            new_global_version: new_version,
            affected_tokens,
            affected_users,
            effective_at,
        })
    }

    /// Read the current global security configuration. Returns `None` if no
    /// global rotation has ever run (the singleton row does not exist yet).
    pub async fn get_config(&self) -> Result<Option<SecurityConfig>, AuthError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Database connection failed: {}", e)))?;

        SecurityConfig::current(&mut conn)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_reason_rejects_short_strings() {
        assert!(TokenRotationService::validate_reason("too short").is_err());
        assert!(TokenRotationService::validate_reason("compromised credential reported by user").is_ok());
    }

    #[test]
    fn validate_reason_counts_characters_not_bytes() {
        let reason = "ró".repeat(12);
        assert!(reason.len() >= MIN_REASON_LENGTH);
        assert!(TokenRotationService::validate_reason(&reason).is_ok());
    }
}
