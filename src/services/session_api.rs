// Session management API (C8): the four user-facing operations built on
// top of the session manager — list, revoke, revoke_others, revoke_all.
// Lives as its own service, the same separation `services::token_rotation`
// draws between raw model operations and the orchestration a handler calls,
// so the HTTP layer (`handlers::sessions`, not yet wired to a route) stays
// thin.

use chrono::Utc;
use redis::AsyncCommands;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::RedisPool;
use crate::services::rate_limit::RateLimitConfig;
use crate::services::session_manager::{Session, SessionFilters, SessionManager};
use crate::utils::auth_errors::AuthError;

/// Re-used as-is: the session API's failure modes (`BadRequest`, `NotFound`,
/// `DatabaseError`, ...) are already covered by the auth error taxonomy, so
/// this doesn't need its own enum.
pub type SessionApiError = AuthError;

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub is_trusted_device: bool,
    pub is_current: bool,
    pub created_at: chrono::DateTime<Utc>,
    pub last_used_at: Option<chrono::DateTime<Utc>>,
    pub expires_at: chrono::DateTime<Utc>,
}

impl SessionSummary {
    fn from_session(session: Session, current_session_id: Option<Uuid>) -> Self {
        let is_current = current_session_id == Some(session.id);
        Self {
            id: session.id,
            device_info: session.device_info,
            ip_address: session.ip_address,
            location: session.location,
            user_agent: session.user_agent,
            is_trusted_device: session.is_trusted_device,
            is_current,
            created_at: session.created_at,
            last_used_at: session.last_used_at,
            expires_at: session.expires_at,
        }
    }
}

pub struct SessionManagementService {
    manager: Arc<SessionManager>,
    redis_pool: RedisPool,
}

fn revocation_cache_key(session_id: Uuid) -> String {
    format!("session_revoked:{}", session_id)
}

impl SessionManagementService {
    pub fn new(manager: Arc<SessionManager>, redis_pool: RedisPool) -> Self {
        Self {
            manager,
            redis_pool,
        }
    }

    pub fn list_rate_limit() -> RateLimitConfig {
        RateLimitConfig {
            max_requests: 10,
            window_seconds: 60,
            burst_limit: None,
            block_duration: 60,
            distributed: true,
        }
    }

    pub fn revoke_rate_limit() -> RateLimitConfig {
        RateLimitConfig {
            max_requests: 20,
            window_seconds: 60,
            burst_limit: None,
            block_duration: 60,
            distributed: true,
        }
    }

    pub fn revoke_others_rate_limit() -> RateLimitConfig {
        RateLimitConfig {
            max_requests: 5,
            window_seconds: 3600,
            burst_limit: None,
            block_duration: 3600,
            distributed: true,
        }
    }

    pub fn revoke_all_rate_limit() -> RateLimitConfig {
        RateLimitConfig {
            max_requests: 3,
            window_seconds: 3600,
            burst_limit: None,
            block_duration: 3600,
            distributed: true,
        }
    }

    /// All non-revoked, non-expired sessions of `user_id`, newest-used
    /// first with never-used sessions ordered first, each carrying
    /// `is_current` relative to `current_session_id` (the access token's
    /// `jti`), with `location` backfilled on read where possible.
    pub async fn list(
        &self,
        user_id: Uuid,
        current_session_id: Option<Uuid>,
    ) -> Result<Vec<SessionSummary>, SessionApiError> {
        let sessions = self
            .manager
            .list_sessions(user_id, SessionFilters {
                active_only: true,
                ..Default::default()
            })
            .await?;

        let mut backfilled = Vec::with_capacity(sessions.len());
        for session in sessions {
            backfilled.push(self.manager.backfill_location(session).await);
        }

        backfilled.sort_by(|a, b| match (a.last_used_at, b.last_used_at) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => y.cmp(&x),
        });

        Ok(backfilled
            .into_iter()
            .map(|s| SessionSummary::from_session(s, current_session_id))
            .collect())
    }

    /// Revokes one session. `session_id == current_session_id` is rejected:
    /// ending the calling session is `logout`'s job, not this endpoint's.
    pub async fn revoke(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        current_session_id: Option<Uuid>,
    ) -> Result<(), SessionApiError> {
        if current_session_id == Some(session_id) {
            return Err(AuthError::BadRequest(
                "Use logout to end the current session".to_string(),
            ));
        }

        let session = self
            .manager
            .get_session(session_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| AuthError::NotFound("Session not found".to_string()))?;

        if session.is_revoked {
            return Err(AuthError::BadRequest("Session already revoked".to_string()));
        }

        let revoked = self
            .manager
            .revoke_session(session_id, "revoked via session management API")
            .await?;

        if revoked {
            self.blacklist(session_id, session.expires_at).await;
        }

        Ok(())
    }

    /// Revokes every session of `user_id` except `current_session_id`.
    /// Returns the number revoked.
    pub async fn revoke_others(
        &self,
        user_id: Uuid,
        current_session_id: Uuid,
    ) -> Result<usize, SessionApiError> {
        let sessions = self
            .manager
            .list_sessions(user_id, SessionFilters {
                active_only: true,
                ..Default::default()
            })
            .await?;

        let count = self
            .manager
            .revoke_all_user_sessions(
                user_id,
                "revoke others requested via session management API",
                Some(current_session_id),
            )
            .await?;

        for session in sessions {
            if session.id != current_session_id {
                self.blacklist(session.id, session.expires_at).await;
            }
        }

        Ok(count)
    }

    /// Revokes every session of `user_id`, including the current one.
    /// Returns the number revoked.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<usize, SessionApiError> {
        let sessions = self
            .manager
            .list_sessions(user_id, SessionFilters {
                active_only: true,
                ..Default::default()
            })
            .await?;

        let count = self
            .manager
            .revoke_all_user_sessions(user_id, "revoke all requested via session management API", None)
            .await?;

        for session in sessions {
            self.blacklist(session.id, session.expires_at).await;
        }

        Ok(count)
    }

    /// Inserts `session_id` into the revocation cache with a TTL matching
    /// its remaining lifetime, closing the window between revocation and
    /// the backing access token's natural expiry. Best-effort: a Redis
    /// outage here must not fail the revoke operation, which has already
    /// committed against the storage backend.
    async fn blacklist(&self, session_id: Uuid, expires_at: chrono::DateTime<Utc>) {
        let ttl = (expires_at - Utc::now()).num_seconds().max(1) as u64;

        let Ok(mut conn) = self.redis_pool.get_connection().await else {
            tracing::warn!(session_id = %session_id, "failed to acquire redis connection for revocation blacklist");
            return;
        };

        let result: Result<(), redis::RedisError> =
            conn.set_ex(revocation_cache_key(session_id), "1", ttl).await;
        self.redis_pool.return_connection(conn).await;

        if let Err(e) = result {
            tracing::warn!(session_id = %session_id, error = %e, "failed to write revocation blacklist entry");
        }
    }

    /// Whether `session_id` is in the revocation blacklist. Consulted by
    /// the access-token middleware in addition to the stored `is_revoked`
    /// flag, since the blacklist exists precisely to cover requests that
    /// land between revocation and the access token's own expiry.
    pub async fn is_blacklisted(redis_pool: &RedisPool, session_id: Uuid) -> bool {
        let Ok(mut conn) = redis_pool.get_connection().await else {
            return false;
        };

        let exists: Result<bool, redis::RedisError> =
            conn.exists(revocation_cache_key(session_id)).await;
        redis_pool.return_connection(conn).await;

        exists.unwrap_or(false)
    }
}
