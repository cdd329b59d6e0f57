// Session manager: a four-part composition (backend, storage, audit,
// enrichers) over a storage-agnostic `Session` domain type. This lets the
// relational `refresh_tokens` table, a Redis-cached snapshot, or an
// in-process map all serve as the session store behind the same API,
// mirroring the pluggable-backend shape `services::email` already uses
// for provider selection, generalized to three concerns instead of one.

pub mod audit;
pub mod backend;
pub mod enrichers;
pub mod factory;
pub mod storage;

pub use audit::{Audit, DatabaseAudit, LoggerAudit, MetricsAudit, MetricsSink, NoopAudit};
pub use backend::DefaultBackend;
pub use enrichers::{Enricher, GeoEnricher, UserAgentEnricher};
pub use factory::build_session_manager;
pub use storage::{CacheStorage, DatabaseStorage, MemoryStorage, Storage};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::utils::auth_errors::AuthError;

/// A device/login instance, independent of whichever `Storage` persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub location: Option<String>,
    pub fingerprint: Option<String>,
    pub is_trusted_device: bool,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn is_active(&self) -> bool {
        !self.is_revoked && !self.is_expired()
    }
}

/// Structured query over a user's sessions. Every field is optional; an
/// absent field means "don't filter on this".
#[derive(Debug, Clone, Default)]
pub struct SessionFilters {
    pub active_only: bool,
    pub device_type: Option<String>,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub is_trusted: Option<bool>,
    pub offset: i64,
    pub limit: i64,
}

impl SessionFilters {
    /// Applies every filter field against one session in memory. Shared by
    /// the memory storage (its only evaluator) and usable by tests against
    /// other storages without needing a live database.
    pub fn matches(&self, session: &Session) -> bool {
        if self.active_only && !session.is_active() {
            return false;
        }
        if let Some(device) = &self.device_type {
            match &session.device_info {
                Some(info) if info.to_lowercase().contains(&device.to_lowercase()) => {},
                _ => return false,
            }
        }
        if let Some(ip) = &self.ip_address {
            if session.ip_address.as_deref() != Some(ip.as_str()) {
                return false;
            }
        }
        if let Some(loc) = &self.location {
            match &session.location {
                Some(l) if l.to_lowercase().contains(&loc.to_lowercase()) => {},
                _ => return false,
            }
        }
        if let Some(after) = self.created_after {
            if session.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if session.created_at > before {
                return false;
            }
        }
        if let Some(trusted) = self.is_trusted {
            if session.is_trusted_device != trusted {
                return false;
            }
        }
        true
    }
}

/// Free-form context passed to audit sinks; keys and values are whatever the
/// caller finds useful for the event (e.g. `"reason" => "user requested"`).
pub type AuditContext = HashMap<String, String>;

/// Domain rules for a session's shape and validity. The reference
/// implementation (`DefaultBackend`) issues a fresh id and a TTL-bounded
/// expiry and otherwise defers everything to the `Session` struct itself;
/// a database-backed backend reusing `models::RefreshToken`'s own
/// `is_valid_for_versions` is also a legitimate implementation of this
/// trait (not provided here — token-version validity is orchestrated at
/// the `AuthService` layer instead, see `services::auth`).
#[async_trait]
pub trait Backend: Send + Sync {
    async fn create(
        &self,
        user_id: Uuid,
        device_info: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
        meta: AuditContext,
    ) -> Result<Session, AuthError>;

    fn validate(&self, session: &Session) -> bool;
}

/// The composed session manager: wires one backend, one storage, one audit
/// sink, and zero or more enrichers behind the four operations the session
/// API (handlers) actually calls.
pub struct SessionManager {
    backend: Box<dyn Backend>,
    storage: Box<dyn Storage>,
    audit: Box<dyn Audit>,
    enrichers: Vec<Box<dyn Enricher>>,
}

impl SessionManager {
    pub fn new(
        backend: Box<dyn Backend>,
        storage: Box<dyn Storage>,
        audit: Box<dyn Audit>,
        enrichers: Vec<Box<dyn Enricher>>,
    ) -> Self {
        Self {
            backend,
            storage,
            audit,
            enrichers,
        }
    }

    /// backend.create -> enrichers in order -> storage.save -> audit.log_created
    pub async fn create_session(
        &self,
        user_id: Uuid,
        device_info: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
        meta: AuditContext,
    ) -> Result<Session, AuthError> {
        let mut session = self
            .backend
            .create(user_id, device_info, ip_address, user_agent, meta.clone())
            .await?;

        for enricher in &self.enrichers {
            session = enricher.enrich(session).await;
        }

        self.storage.save(session.clone()).await?;
        self.audit.log_created(&session, &meta).await;

        Ok(session)
    }

    /// storage.get (existence check, false without audit on miss) ->
    /// storage.revoke -> audit.log_revoked
    pub async fn revoke_session(
        &self,
        session_id: Uuid,
        reason: &str,
    ) -> Result<bool, AuthError> {
        let existing = self.storage.get(session_id).await?;
        let Some(session) = existing else {
            return Ok(false);
        };

        let revoked = self.storage.revoke(session_id, reason).await?;
        if revoked {
            let mut ctx = AuditContext::new();
            ctx.insert("reason".to_string(), reason.to_string());
            self.audit.log_revoked(&session, &ctx).await;
        }

        Ok(revoked)
    }

    /// storage.get -> backend.validate
    pub async fn validate_session(&self, session_id: Uuid) -> Result<bool, AuthError> {
        match self.storage.get(session_id).await? {
            Some(session) => Ok(self.backend.validate(&session)),
            None => Ok(false),
        }
    }

    /// Revokes every session belonging to `user_id`, except `except_id` if
    /// given. Returns the count actually revoked.
    pub async fn revoke_all_user_sessions(
        &self,
        user_id: Uuid,
        reason: &str,
        except: Option<Uuid>,
    ) -> Result<usize, AuthError> {
        let sessions = self
            .storage
            .list(user_id, SessionFilters {
                active_only: true,
                ..Default::default()
            })
            .await?;

        let mut revoked_count = 0;
        for session in sessions {
            if Some(session.id) == except {
                continue;
            }
            if self.storage.revoke(session.id, reason).await? {
                revoked_count += 1;
                let mut ctx = AuditContext::new();
                ctx.insert("reason".to_string(), reason.to_string());
                self.audit.log_revoked(&session, &ctx).await;
            }
        }

        Ok(revoked_count)
    }

    pub async fn list_sessions(
        &self,
        user_id: Uuid,
        filters: SessionFilters,
    ) -> Result<Vec<Session>, AuthError> {
        self.storage.list(user_id, filters).await
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>, AuthError> {
        self.storage.get(session_id).await
    }

    /// Runs enrichers over a session missing `location` and persists the
    /// result. A no-op while only the stub enrichers are wired in, but the
    /// call site (session listing, §4.8) is real: it's what a concrete
    /// geolocation enricher would hook into.
    pub async fn backfill_location(&self, mut session: Session) -> Session {
        if session.location.is_some() || session.ip_address.is_none() {
            return session;
        }

        for enricher in &self.enrichers {
            session = enricher.enrich(session).await;
        }

        if session.location.is_some() {
            let _ = self.storage.save(session.clone()).await;
        }

        session
    }

    pub async fn mark_accessed(&self, session_id: Uuid) -> Result<(), AuthError> {
        if let Some(session) = self.storage.get(session_id).await? {
            self.audit.log_accessed(&session, &AuditContext::new()).await;
        }
        Ok(())
    }

    pub async fn flag_suspicious(
        &self,
        session_id: Uuid,
        context: AuditContext,
    ) -> Result<(), AuthError> {
        if let Some(session) = self.storage.get(session_id).await? {
            self.audit.log_suspicious(&session, &context).await;
        }
        Ok(())
    }
}
