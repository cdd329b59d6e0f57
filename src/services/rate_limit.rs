// Rate Limiting Service for the auth core
// Token-bucket rate limiting over Redis, atomic via a Lua script.

use once_cell::sync::Lazy;
use redis::AsyncCommands;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::db::RedisPool;
use crate::services::analytics::{RateLimitAnalytics, RateLimitEvent as AnalyticsEvent};

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Redis connection error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limit exceeded")]
    LimitExceeded,

    #[error("Invalid rate limit key")]
    InvalidKey,
}

// =============================================================================
// CONFIGURATION STRUCTURES
// =============================================================================

/// One rate-limiting rule. `max_requests` doubles as the bucket's burst
/// capacity (`max_tokens`); `burst_limit`, when set, raises the capacity
/// above the steady-state rate so short bursts don't immediately trip the
/// limiter. The refill rate is derived as `max_requests / window_seconds`
/// tokens per second — equivalent to the token-bucket formulation of
/// "N requests per window" without a separate field to keep in sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Steady-state requests allowed per `window_seconds` (defines refill rate)
    pub max_requests: u32,

    /// Time window in seconds the refill rate is expressed against
    pub window_seconds: u32,

    /// Optional burst capacity above `max_requests` (the bucket's ceiling)
    pub burst_limit: Option<u32>,

    /// Advisory retry-after floor reported while the bucket is empty
    pub block_duration: u32,

    /// Whether this rule is enforced against the shared Redis store (true)
    /// or would be local-only per instance in a multi-instance deployment
    /// (false) — reserved for very-high-volume endpoints with no need for
    /// cross-instance coordination.
    pub distributed: bool,
}

impl RateLimitConfig {
    /// Authentication endpoint configuration (stricter limits)
    pub fn auth_endpoint() -> Self {
        Self {
            max_requests: 5,
            window_seconds: 900, // 15 minutes
            burst_limit: None,
            block_duration: 1800, // 30 minutes
            distributed: true,
        }
    }

    /// Default configuration for unspecified endpoints
    pub fn default_api() -> Self {
        Self {
            max_requests: 1000,
            window_seconds: 3600,
            burst_limit: Some(20),
            block_duration: 300,
            distributed: true,
        }
    }

    /// Effective bucket capacity: `burst_limit` if set, else `max_requests`.
    pub fn capacity(&self) -> u32 {
        self.burst_limit.unwrap_or(self.max_requests).max(1)
    }

    /// Tokens refilled per second.
    pub fn refill_per_second(&self) -> f64 {
        self.max_requests as f64 / (self.window_seconds.max(1) as f64)
    }
}

/// Rate limit check result
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,

    /// Remaining tokens in the bucket after this check
    pub remaining: u32,

    /// Seconds until the bucket fully refills (`capacity / refill_rate`)
    pub reset_time: u64,

    /// Retry after seconds (if blocked)
    pub retry_after: Option<u32>,

    /// Current request count this window (capacity - remaining, for analytics)
    pub current_count: u32,
}

/// Rate limit analytics event
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitEvent {
    pub key: String,
    pub endpoint: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub blocked: bool,
    pub current_count: u32,
    pub limit: u32,
    pub latency_ms: u64,
}

// =============================================================================
// ENDPOINT KEY CANONICALIZATION
// =============================================================================

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});
static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

/// Replaces path segments that look like identifiers with `{id}` so that
/// `"GET /v1/sessions/550e8400-e29b-41d4-a716-446655440000"` and
/// `"GET /v1/sessions/6ba7b810-9dad-11d1-80b4-00c04fd430c8"` collapse to the
/// same configuration key regardless of the concrete session id.
pub fn canonicalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.is_empty() {
                segment
            } else if UUID_SEGMENT.is_match(segment) || NUMERIC_SEGMENT.is_match(segment) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Builds the `"METHOD /canonical/path"` endpoint key a rule is looked up by.
pub fn endpoint_key(method: &str, path: &str) -> String {
    format!("{} {}", method.to_uppercase(), canonicalize_path(path))
}

// =============================================================================
// RATE LIMITING SERVICE
// =============================================================================

/// Token-bucket rate limiting service with atomic Redis operations
pub struct RateLimitService {
    redis_pool: RedisPool,
    default_config: RateLimitConfig,
    endpoint_configs: HashMap<String, RateLimitConfig>,
    analytics: Option<RateLimitAnalytics>,
}

impl RateLimitService {
    /// Create new rate limiting service with Redis backend
    pub fn new(redis_pool: RedisPool) -> Self {
        let mut endpoint_configs = HashMap::new();

        endpoint_configs.insert("POST /v1/auth/login".to_string(), RateLimitConfig::auth_endpoint());
        endpoint_configs.insert(
            "POST /v1/auth/register".to_string(),
            RateLimitConfig {
                max_requests: 3,
                window_seconds: 3600,
                burst_limit: None,
                block_duration: 3600,
                distributed: true,
            },
        );
        endpoint_configs.insert(
            "POST /v1/auth/refresh".to_string(),
            RateLimitConfig {
                max_requests: 10,
                window_seconds: 300,
                burst_limit: Some(3),
                block_duration: 300,
                distributed: true,
            },
        );
        endpoint_configs.insert(
            "GET /v1/sessions/".to_string(),
            crate::services::session_api::SessionManagementService::list_rate_limit(),
        );
        endpoint_configs.insert(
            "DELETE /v1/sessions/{id}".to_string(),
            crate::services::session_api::SessionManagementService::revoke_rate_limit(),
        );
        endpoint_configs.insert(
            "POST /v1/sessions/revoke-others".to_string(),
            crate::services::session_api::SessionManagementService::revoke_others_rate_limit(),
        );
        endpoint_configs.insert(
            "POST /v1/sessions/revoke-all".to_string(),
            crate::services::session_api::SessionManagementService::revoke_all_rate_limit(),
        );

        let default_config = RateLimitConfig::default_api();

        Self {
            redis_pool,
            default_config,
            endpoint_configs,
            analytics: None,
        }
    }

    /// Create new rate limiting service with analytics enabled
    pub fn new_with_analytics(redis_pool: RedisPool, sample_rate: f64) -> Self {
        let analytics = RateLimitAnalytics::new(redis_pool.clone(), sample_rate);

        let mut service = Self::new(redis_pool);
        service.analytics = Some(analytics);
        service
    }

    /// Check rate limit with custom configuration
    pub async fn check_rate_limit_with_config(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError> {
        self.token_bucket_check(key, config).await
    }

    /// Check rate limit for `endpoint`, resolving its configured rule (or
    /// the default) and recording an analytics event on the way out.
    #[instrument(skip(self), fields(key, endpoint))]
    pub async fn check_rate_limit(
        &self,
        key: &str,
        endpoint: &str,
    ) -> Result<RateLimitResult, RateLimitError> {
        let start_time = std::time::Instant::now();
        let config = self.get_config_for_endpoint(endpoint);

        let result = self.token_bucket_check(key, config).await?;

        let latency_ms = start_time.elapsed().as_millis() as u64;

        if let Some(ref analytics) = self.analytics {
            let analytics_event = AnalyticsEvent {
                id: uuid::Uuid::new_v4().to_string(),
                timestamp: chrono::Utc::now(),
                key: key.to_string(),
                endpoint: endpoint.to_string(),
                blocked: !result.allowed,
                current_count: result.current_count,
                limit: config.max_requests,
                user_tier: None,
                client_ip: None,
                check_latency_ms: latency_ms,
                metadata: std::collections::HashMap::new(),
            };

            if let Err(e) = analytics.record_event(analytics_event).await {
                warn!("Failed to record analytics event: {}", e);
            }
        }

        if latency_ms > 5 {
            warn!(
                "Rate limit check exceeded 5ms target: {}ms for key: {}",
                latency_ms, key
            );
        }

        Ok(result)
    }

    /// Atomic token-bucket check via a Lua script: read-refill-consume in one
    /// round trip so concurrent requests for the same key never race.
    async fn token_bucket_check(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError> {
        let mut conn = self.redis_pool.get_connection().await?;

        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;

        let bucket_key = format!("rate_limit:{}", key);
        let capacity = config.capacity();
        let refill_per_ms = config.refill_per_second() / 1000.0;

        // Lua script: refill tokens for elapsed time since last check, then
        // consume one if available. Returns {allowed, remaining_tokens, retry_after_ms}.
        let script = r#"
            local key = KEYS[1]
            local now = tonumber(ARGV[1])
            local capacity = tonumber(ARGV[2])
            local refill_per_ms = tonumber(ARGV[3])

            local bucket = redis.call('HMGET', key, 'tokens', 'ts')
            local tokens = tonumber(bucket[1])
            local ts = tonumber(bucket[2])

            if tokens == nil then
                tokens = capacity
                ts = now
            end

            local elapsed = math.max(0, now - ts)
            tokens = math.min(capacity, tokens + elapsed * refill_per_ms)

            local allowed = 0
            local retry_after_ms = 0
            if tokens >= 1 then
                tokens = tokens - 1
                allowed = 1
            else
                if refill_per_ms > 0 then
                    retry_after_ms = math.ceil((1 - tokens) / refill_per_ms)
                else
                    retry_after_ms = 1000
                end
            end

            redis.call('HMSET', key, 'tokens', tokens, 'ts', now)
            local ttl_seconds = math.ceil(capacity / math.max(refill_per_ms * 1000, 0.001)) + 60
            redis.call('EXPIRE', key, ttl_seconds)

            return {allowed, math.floor(tokens), retry_after_ms}
        "#;

        let result: Vec<i64> = redis::Script::new(script)
            .key(&bucket_key)
            .arg(now_ms)
            .arg(capacity)
            .arg(refill_per_ms)
            .invoke_async(&mut conn)
            .await?;

        let allowed = result[0] == 1;
        let remaining = result[1].max(0) as u32;
        let retry_after_ms = result[2].max(0) as u64;

        let reset_time = if config.refill_per_second() > 0.0 {
            (capacity as f64 / config.refill_per_second()).ceil() as u64
        } else {
            config.window_seconds as u64
        };

        let retry_after = if allowed {
            None
        } else {
            Some(((retry_after_ms + 999) / 1000).max(1).max(config.block_duration as u64) as u32)
        };

        Ok(RateLimitResult {
            allowed,
            remaining,
            reset_time,
            retry_after,
            current_count: capacity.saturating_sub(remaining),
        })
    }

    /// Get configuration for specific endpoint with fallback logic
    fn get_config_for_endpoint(&self, endpoint: &str) -> &RateLimitConfig {
        if let Some(config) = self.endpoint_configs.get(endpoint) {
            return config;
        }

        if endpoint.starts_with("POST /v1/auth/") || endpoint.starts_with("GET /v1/auth/") {
            if let Some(config) = self.endpoint_configs.get("POST /v1/auth/login") {
                return config;
            }
        }

        &self.default_config
    }

    /// Check a user-scoped rate limit against the default rule.
    #[instrument(skip(self))]
    pub async fn check_user_rate_limit(
        &self,
        user_id: &str,
        endpoint: &str,
    ) -> Result<RateLimitResult, RateLimitError> {
        let key = format!("user:{}:{}", user_id, endpoint);
        self.token_bucket_check(&key, &self.default_config).await
    }

    /// Get rate limiting statistics for monitoring
    pub async fn get_statistics(&self) -> Result<HashMap<String, u64>, RateLimitError> {
        let mut conn = self.redis_pool.get_connection().await?;

        let mut stats = HashMap::new();
        let mut total_count: u64 = 0;

        let mut cursor = 0u64;
        loop {
            let result: redis::RedisResult<(u64, Vec<String>)> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg("rate_limit:*")
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await;

            match result {
                Ok((new_cursor, keys)) => {
                    total_count += keys.len() as u64;
                    cursor = new_cursor;
                    if cursor == 0 {
                        break;
                    }
                },
                Err(e) => return Err(RateLimitError::Redis(e)),
            }
        }

        stats.insert("total_keys".to_string(), total_count);

        Ok(stats)
    }

    /// Clear rate limit for a specific key (admin function)
    pub async fn clear_rate_limit(&self, key: &str) -> Result<(), RateLimitError> {
        let mut conn = self.redis_pool.get_connection().await?;

        let bucket_key = format!("rate_limit:{}", key);
        let _: () = conn.del(&bucket_key).await?;

        info!("Cleared rate limit for key: {}", key);
        Ok(())
    }

    /// Get analytics metrics if analytics are enabled
    pub async fn get_analytics_metrics(
        &self,
        window_minutes: u64,
    ) -> Option<crate::services::analytics::RateLimitMetrics> {
        if let Some(ref analytics) = self.analytics {
            analytics.get_metrics(window_minutes).await.ok()
        } else {
            None
        }
    }

    /// Get monitoring statistics if analytics are enabled
    pub async fn get_monitoring_stats(
        &self,
    ) -> Option<crate::services::analytics::MonitoringStats> {
        if let Some(ref analytics) = self.analytics {
            analytics.get_monitoring_stats().await.ok()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_config_creation() {
        let auth_config = RateLimitConfig::auth_endpoint();
        assert_eq!(auth_config.max_requests, 5);
        assert_eq!(auth_config.window_seconds, 900);
        assert_eq!(auth_config.block_duration, 1800);
        assert_eq!(auth_config.capacity(), 5);
    }

    #[test]
    fn refill_rate_derived_from_window() {
        let config = RateLimitConfig {
            max_requests: 60,
            window_seconds: 60,
            burst_limit: None,
            block_duration: 30,
            distributed: true,
        };
        assert!((config.refill_per_second() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn burst_limit_raises_capacity_above_steady_rate() {
        let config = RateLimitConfig {
            max_requests: 10,
            window_seconds: 60,
            burst_limit: Some(25),
            block_duration: 30,
            distributed: true,
        };
        assert_eq!(config.capacity(), 25);
    }

    #[test]
    fn canonicalize_path_replaces_uuid_segments() {
        assert_eq!(
            canonicalize_path("/v1/sessions/550e8400-e29b-41d4-a716-446655440000"),
            "/v1/sessions/{id}"
        );
    }

    #[test]
    fn canonicalize_path_replaces_numeric_segments() {
        assert_eq!(canonicalize_path("/v1/items/42"), "/v1/items/{id}");
    }

    #[test]
    fn canonicalize_path_leaves_literal_segments_alone() {
        assert_eq!(canonicalize_path("/v1/auth/login"), "/v1/auth/login");
    }

    #[test]
    fn endpoint_key_uppercases_method_and_canonicalizes_path() {
        assert_eq!(
            endpoint_key("delete", "/v1/sessions/550e8400-e29b-41d4-a716-446655440000"),
            "DELETE /v1/sessions/{id}"
        );
    }
}
