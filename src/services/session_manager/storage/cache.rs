// Cache-backed session storage. Each session is a serialized snapshot under
// `session:{id}`, with its Redis TTL derived from the session's own expiry
// so stale entries self-evict without a sweep. There is no secondary index
// from user id to session ids, so `list` returns an empty result rather
// than pretending to be a general-purpose session index — callers that need
// listing should reach for `DatabaseStorage` or `MemoryStorage`.

use async_trait::async_trait;
use redis::AsyncCommands;
use uuid::Uuid;

use super::Storage;
use crate::db::RedisPool;
use crate::services::session_manager::{Session, SessionFilters};
use crate::utils::auth_errors::AuthError;

pub struct CacheStorage {
    redis: RedisPool,
    min_ttl_seconds: u64,
}

impl CacheStorage {
    pub fn new(redis: RedisPool, min_ttl_seconds: u64) -> Self {
        Self {
            redis,
            min_ttl_seconds,
        }
    }

    fn key(id: Uuid) -> String {
        format!("session:{}", id)
    }

    fn ttl_for(&self, session: &Session) -> i64 {
        let remaining = (session.expires_at - chrono::Utc::now()).num_seconds();
        remaining.max(self.min_ttl_seconds as i64)
    }
}

fn redis_err(e: redis::RedisError) -> AuthError {
    AuthError::DatabaseError(format!("Redis error: {}", e))
}

#[async_trait]
impl Storage for CacheStorage {
    async fn save(&self, session: Session) -> Result<(), AuthError> {
        let payload = serde_json::to_string(&session)
            .map_err(|e| AuthError::TokenError(format!("Session serialization failed: {}", e)))?;
        let ttl = self.ttl_for(&session);

        let mut conn = self.redis.get_connection().await.map_err(redis_err)?;
        let result: Result<(), redis::RedisError> =
            conn.set_ex(Self::key(session.id), payload, ttl as u64).await;
        self.redis.return_connection(conn).await;
        result.map_err(redis_err)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>, AuthError> {
        let mut conn = self.redis.get_connection().await.map_err(redis_err)?;
        let raw: Result<Option<String>, redis::RedisError> = conn.get(Self::key(id)).await;
        self.redis.return_connection(conn).await;

        match raw.map_err(redis_err)? {
            Some(payload) => {
                let session = serde_json::from_str(&payload).map_err(|e| {
                    AuthError::TokenError(format!("Session deserialization failed: {}", e))
                })?;
                Ok(Some(session))
            },
            None => Ok(None),
        }
    }

    async fn list(&self, _user_id: Uuid, _filters: SessionFilters) -> Result<Vec<Session>, AuthError> {
        Ok(Vec::new())
    }

    async fn revoke(&self, id: Uuid, _reason: &str) -> Result<bool, AuthError> {
        let Some(mut session) = self.get(id).await? else {
            return Ok(false);
        };

        session.is_revoked = true;
        session.revoked_at = Some(chrono::Utc::now());
        self.save(session).await?;
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AuthError> {
        let mut conn = self.redis.get_connection().await.map_err(redis_err)?;
        let result: Result<i64, redis::RedisError> = conn.del(Self::key(id)).await;
        self.redis.return_connection(conn).await;

        Ok(result.map_err(redis_err)? > 0)
    }
}
