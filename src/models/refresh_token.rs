// Refresh token database model.
//
// Refresh tokens are opaque 256-bit secrets handed to the client; only their
// SHA-256 hash is ever persisted. This mirrors the password-reset token shape
// in this crate rather than the JWT-ID-hashing scheme used elsewhere, since
// an opaque high-entropy secret needs no extra salt to resist enumeration.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::schema::refresh_tokens;

/// Client/device context captured at issuance time, for session listing and
/// advisory suspicious-activity checks. Never used to gate authentication.
#[derive(Debug, Clone, Default)]
pub struct DeviceContext {
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub location: Option<String>,
    pub fingerprint: Option<String>,
}

/// Refresh token / session row.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = refresh_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub location: Option<String>,
    pub fingerprint: Option<String>,
    pub is_trusted_device: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub token_version: i32,
    pub global_version_at_issuance: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub location: Option<String>,
    pub fingerprint: Option<String>,
    pub token_version: i32,
    pub global_version_at_issuance: i32,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = refresh_tokens)]
pub struct RefreshTokenUpdate {
    pub is_revoked: Option<bool>,
    pub revoked_at: Option<Option<DateTime<Utc>>>,
    pub last_used_at: Option<Option<DateTime<Utc>>>,
    pub is_trusted_device: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

#[derive(thiserror::Error, Debug)]
pub enum RefreshTokenError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Token not found")]
    NotFound,

    #[error("Token expired")]
    Expired,

    #[error("Token revoked")]
    Revoked,

    #[error("Token version is stale")]
    StaleVersion,

    #[error("Connection pool error")]
    Pool(String),
}

impl RefreshToken {
    /// Generate a new opaque refresh token secret and its storage hash.
    pub fn generate_secret() -> (String, String) {
        use base64::prelude::*;
        use rand::RngCore;

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let secret = BASE64_URL_SAFE_NO_PAD.encode(bytes);
        (secret.clone(), Self::hash_secret(&secret))
    }

    /// Hash a raw refresh token secret for storage/lookup.
    pub fn hash_secret(secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Persist a new refresh token row.
    pub async fn store(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
        token_hash_val: String,
        expires_at_val: DateTime<Utc>,
        token_version_val: i32,
        global_version_at_issuance_val: i32,
        device: DeviceContext,
    ) -> Result<Self, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let new_token = NewRefreshToken {
            user_id: user_id_val,
            token_hash: token_hash_val,
            expires_at: expires_at_val,
            device_info: device.device_info,
            ip_address: device.ip_address,
            user_agent: device.user_agent,
            location: device.location,
            fingerprint: device.fingerprint,
            token_version: token_version_val,
            global_version_at_issuance: global_version_at_issuance_val,
        };

        diesel::insert_into(refresh_tokens)
            .values(&new_token)
            .get_result::<Self>(conn)
            .await
            .map_err(RefreshTokenError::Database)
    }

    /// Look up the row matching a raw secret and confirm it via constant-time
    /// comparison of the stored hash. Does not check expiry/revocation/version;
    /// callers compose those checks (see `services::token_rotation`).
    pub async fn find_by_secret(
        conn: &mut AsyncPgConnection,
        secret: &str,
    ) -> Result<Self, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let candidate_hash = Self::hash_secret(secret);

        let token = refresh_tokens
            .filter(token_hash.eq(&candidate_hash))
            .first::<Self>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => RefreshTokenError::NotFound,
                _ => RefreshTokenError::Database(e),
            })?;

        let matches: bool = candidate_hash
            .as_bytes()
            .ct_eq(token.token_hash.as_bytes())
            .into();
        if !matches {
            return Err(RefreshTokenError::NotFound);
        }

        Ok(token)
    }

    /// Revoke a single token by id.
    pub async fn revoke(
        conn: &mut AsyncPgConnection,
        token_id: Uuid,
    ) -> Result<bool, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let now = Utc::now();
        let updated = diesel::update(
            refresh_tokens
                .filter(id.eq(token_id))
                .filter(is_revoked.eq(false)),
        )
        .set((is_revoked.eq(true), revoked_at.eq(Some(now)), updated_at.eq(now)))
        .execute(conn)
        .await?;

        Ok(updated > 0)
    }

    /// Revoke every active session for a user other than `except_id`, if given.
    pub async fn revoke_all_for_user(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
        except_id: Option<Uuid>,
    ) -> Result<usize, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let now = Utc::now();
        let updated = match except_id {
            Some(keep) => {
                diesel::update(
                    refresh_tokens
                        .filter(user_id.eq(user_id_val))
                        .filter(is_revoked.eq(false))
                        .filter(id.ne(keep)),
                )
                .set((is_revoked.eq(true), revoked_at.eq(Some(now)), updated_at.eq(now)))
                .execute(conn)
                .await?
            },
            None => {
                diesel::update(
                    refresh_tokens
                        .filter(user_id.eq(user_id_val))
                        .filter(is_revoked.eq(false)),
                )
                .set((is_revoked.eq(true), revoked_at.eq(Some(now)), updated_at.eq(now)))
                .execute(conn)
                .await?
            },
        };

        Ok(updated)
    }

    /// List active (unrevoked, unexpired) sessions for a user, newest first.
    pub async fn list_active_for_user(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
    ) -> Result<Vec<Self>, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let now = Utc::now();
        let rows = refresh_tokens
            .filter(user_id.eq(user_id_val))
            .filter(is_revoked.eq(false))
            .filter(expires_at.gt(now))
            .order(created_at.desc())
            .load::<Self>(conn)
            .await?;

        Ok(rows)
    }

    /// Delete expired or revoked rows (periodic housekeeping).
    pub async fn cleanup_expired(conn: &mut AsyncPgConnection) -> Result<usize, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let now = Utc::now();
        let deleted = diesel::delete(
            refresh_tokens
                .filter(expires_at.le(now))
                .or_filter(is_revoked.eq(true)),
        )
        .execute(conn)
        .await?;

        Ok(deleted)
    }

    /// Stamp a token as used just now (sticky refresh: no rotation on use).
    pub async fn mark_as_used(
        conn: &mut AsyncPgConnection,
        token_id: Uuid,
    ) -> Result<bool, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let now = Utc::now();
        let updated = diesel::update(
            refresh_tokens
                .filter(id.eq(token_id))
                .filter(is_revoked.eq(false)),
        )
        .set((last_used_at.eq(Some(now)), updated_at.eq(now)))
        .execute(conn)
        .await?;

        Ok(updated > 0)
    }

    /// Highest `token_version` among this user's refresh tokens, or 0 if they
    /// have none. Used by rotation to pick a new version strictly above any
    /// version already in circulation.
    pub async fn max_token_version_for_user(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
    ) -> Result<i32, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;
        use diesel::dsl::max;

        let highest: Option<i32> = refresh_tokens
            .filter(user_id.eq(user_id_val))
            .select(max(token_version))
            .first(conn)
            .await?;

        Ok(highest.unwrap_or(0))
    }

    /// Revoke every non-revoked token belonging to a user whose `token_version`
    /// is below `new_min_version`. Returns the number of rows affected.
    pub async fn revoke_stale_versions_for_user(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
        new_min_version: i32,
    ) -> Result<usize, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let now = Utc::now();
        let updated = diesel::update(
            refresh_tokens
                .filter(user_id.eq(user_id_val))
                .filter(is_revoked.eq(false))
                .filter(token_version.lt(new_min_version)),
        )
        .set((is_revoked.eq(true), revoked_at.eq(Some(now)), updated_at.eq(now)))
        .execute(conn)
        .await?;

        Ok(updated)
    }

    /// Revoke every non-revoked token across all users whose
    /// `global_version_at_issuance` is below `new_min_version`. `revoked_at`
    /// is stamped with `effective_at`, which may be in the future to express
    /// a grace period (see `services::token_rotation`). Returns the number of
    /// rows affected and the number of distinct users touched.
    pub async fn revoke_stale_global(
        conn: &mut AsyncPgConnection,
        new_min_version: i32,
        effective_at: DateTime<Utc>,
    ) -> Result<(usize, usize), RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let affected_users: Vec<Uuid> = refresh_tokens
            .filter(is_revoked.eq(false))
            .filter(global_version_at_issuance.lt(new_min_version))
            .select(user_id)
            .distinct()
            .load(conn)
            .await?;

        let updated = diesel::update(
            refresh_tokens
                .filter(is_revoked.eq(false))
                .filter(global_version_at_issuance.lt(new_min_version)),
        )
        .set((
            is_revoked.eq(true),
            revoked_at.eq(Some(effective_at)),
            updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await?;

        Ok((updated, affected_users.len()))
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Whether this session is usable right now: not revoked, not expired,
    /// and issued at or after the caller-supplied minimum token versions.
    pub fn is_valid_for_versions(&self, min_user_version: i32, min_global_version: i32) -> bool {
        !self.is_revoked
            && !self.is_expired()
            && self.token_version >= min_user_version
            && self.global_version_at_issuance >= min_global_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn generate_secret_produces_distinct_tokens() {
        let (secret_a, hash_a) = RefreshToken::generate_secret();
        let (secret_b, hash_b) = RefreshToken::generate_secret();

        assert_ne!(secret_a, secret_b);
        assert_ne!(hash_a, hash_b);
        assert_eq!(hash_a, RefreshToken::hash_secret(&secret_a));
    }

    fn sample_token(
        is_revoked: bool,
        expires_at: DateTime<Utc>,
        token_version: i32,
        global_version_at_issuance: i32,
    ) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "hash".to_string(),
            expires_at,
            is_revoked,
            revoked_at: None,
            device_info: None,
            ip_address: None,
            user_agent: None,
            location: None,
            fingerprint: None,
            is_trusted_device: false,
            last_used_at: None,
            token_version,
            global_version_at_issuance,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn is_valid_for_versions_rejects_stale_user_version() {
        let token = sample_token(false, Utc::now() + Duration::hours(1), 1, 1);
        assert!(token.is_valid_for_versions(1, 1));
        assert!(!token.is_valid_for_versions(2, 1));
    }

    #[test]
    fn is_valid_for_versions_rejects_stale_global_version() {
        let token = sample_token(false, Utc::now() + Duration::hours(1), 1, 1);
        assert!(!token.is_valid_for_versions(1, 2));
    }

    #[test]
    fn is_valid_for_versions_rejects_revoked_or_expired() {
        let revoked = sample_token(true, Utc::now() + Duration::hours(1), 1, 1);
        assert!(!revoked.is_valid_for_versions(1, 1));

        let expired = sample_token(false, Utc::now() - Duration::hours(1), 1, 1);
        assert!(!expired.is_valid_for_versions(1, 1));
    }
}
