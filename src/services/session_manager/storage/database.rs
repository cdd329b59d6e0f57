// Database-backed session storage. Sessions and refresh tokens are the same
// underlying row (`refresh_tokens`) viewed through different lenses: the
// auth orchestration layer (`services::auth::AuthService`) issues tokens and
// writes that table directly via `models::RefreshToken`, since it must also
// set the rotation columns (`token_hash`, `token_version`,
// `global_version_at_issuance`) a generic `Session` has no business knowing
// about. This storage implements the *read/list/revoke* side of the
// contract against that same table, which is what the session-management
// API (listing, revoking) actually needs; `save` synthesizes a placeholder
// token hash from the session id so sessions created directly through the
// session manager (tests, or a future non-refresh-token session type) still
// satisfy the table's `NOT NULL` constraint on `token_hash`.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::Storage;
use crate::db::DieselPool;
use crate::models::RefreshToken;
use crate::schema::refresh_tokens;
use crate::services::session_manager::{Session, SessionFilters};
use crate::utils::auth_errors::AuthError;

pub struct DatabaseStorage {
    pool: DieselPool,
}

impl DatabaseStorage {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }

    fn placeholder_token_hash(session_id: Uuid) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"session-manager:");
        hasher.update(session_id.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn row_to_session(row: RefreshToken) -> Session {
    Session {
        id: row.id,
        user_id: row.user_id,
        device_info: row.device_info,
        ip_address: row.ip_address,
        user_agent: row.user_agent,
        location: row.location,
        fingerprint: row.fingerprint,
        is_trusted_device: row.is_trusted_device,
        is_revoked: row.is_revoked,
        revoked_at: row.revoked_at,
        last_used_at: row.last_used_at,
        created_at: row.created_at,
        expires_at: row.expires_at,
    }
}

fn db_err(e: impl std::fmt::Display) -> AuthError {
    AuthError::DatabaseError(e.to_string())
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn save(&self, session: Session) -> Result<(), AuthError> {
        use refresh_tokens::dsl;

        let mut conn = self.pool.get().await.map_err(db_err)?;
        let token_hash = Self::placeholder_token_hash(session.id);

        diesel::insert_into(refresh_tokens::table)
            .values((
                dsl::id.eq(session.id),
                dsl::user_id.eq(session.user_id),
                dsl::token_hash.eq(token_hash),
                dsl::expires_at.eq(session.expires_at),
                dsl::is_revoked.eq(session.is_revoked),
                dsl::revoked_at.eq(session.revoked_at),
                dsl::device_info.eq(session.device_info),
                dsl::ip_address.eq(session.ip_address),
                dsl::user_agent.eq(session.user_agent),
                dsl::location.eq(session.location),
                dsl::fingerprint.eq(session.fingerprint),
                dsl::is_trusted_device.eq(session.is_trusted_device),
                dsl::last_used_at.eq(session.last_used_at),
                dsl::created_at.eq(session.created_at),
                dsl::updated_at.eq(session.created_at),
            ))
            .execute(&mut conn)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>, AuthError> {
        use refresh_tokens::dsl;

        let mut conn = self.pool.get().await.map_err(db_err)?;

        let row = dsl::refresh_tokens
            .filter(dsl::id.eq(id))
            .first::<RefreshToken>(&mut conn)
            .await
            .optional()
            .map_err(db_err)?;

        Ok(row.map(row_to_session))
    }

    async fn list(&self, user_id: Uuid, filters: SessionFilters) -> Result<Vec<Session>, AuthError> {
        use refresh_tokens::dsl;

        let mut conn = self.pool.get().await.map_err(db_err)?;

        let mut query = dsl::refresh_tokens
            .filter(dsl::user_id.eq(user_id))
            .into_boxed();

        if filters.active_only {
            query = query
                .filter(dsl::is_revoked.eq(false))
                .filter(dsl::expires_at.gt(chrono::Utc::now()));
        }
        if let Some(ip) = &filters.ip_address {
            query = query.filter(dsl::ip_address.eq(ip.clone()));
        }
        if let Some(trusted) = filters.is_trusted {
            query = query.filter(dsl::is_trusted_device.eq(trusted));
        }
        if let Some(after) = filters.created_after {
            query = query.filter(dsl::created_at.ge(after));
        }
        if let Some(before) = filters.created_before {
            query = query.filter(dsl::created_at.le(before));
        }

        query = query.order(dsl::created_at.desc());

        if filters.limit > 0 {
            query = query.limit(filters.limit).offset(filters.offset.max(0));
        }

        let rows = query.load::<RefreshToken>(&mut conn).await.map_err(db_err)?;

        // `device_type` and `location` are substring matches the query
        // builder above can't express portably; applied in memory.
        let sessions: Vec<Session> = rows
            .into_iter()
            .map(row_to_session)
            .filter(|s| {
                let device_ok = filters.device_type.as_ref().map_or(true, |needle| {
                    s.device_info
                        .as_ref()
                        .map(|v| v.to_lowercase().contains(&needle.to_lowercase()))
                        .unwrap_or(false)
                });
                let location_ok = filters.location.as_ref().map_or(true, |needle| {
                    s.location
                        .as_ref()
                        .map(|v| v.to_lowercase().contains(&needle.to_lowercase()))
                        .unwrap_or(false)
                });
                device_ok && location_ok
            })
            .collect();

        Ok(sessions)
    }

    async fn revoke(&self, id: Uuid, _reason: &str) -> Result<bool, AuthError> {
        let mut conn = self.pool.get().await.map_err(db_err)?;
        RefreshToken::revoke(&mut conn, id)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AuthError> {
        use refresh_tokens::dsl;

        let mut conn = self.pool.get().await.map_err(db_err)?;
        let deleted = diesel::delete(dsl::refresh_tokens.filter(dsl::id.eq(id)))
            .execute(&mut conn)
            .await
            .map_err(db_err)?;

        Ok(deleted > 0)
    }
}
