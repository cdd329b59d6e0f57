// Post-hoc audit sink for session lifecycle events. Never blocks or fails
// the business operation it's attached to: every implementation swallows
// its own errors and logs them, the same contract `utils::audit_logger`
// documented (as a TODO) for its link-domain audit trail — this is that
// idea carried all the way through to a real `database` backend, plus
// `logger`/`noop`/`metrics` alternatives, for the session domain instead.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde_json::Value as Json;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{AuditContext, Session};
use crate::db::DieselPool;
use crate::schema::session_audit_log;

fn context_to_json(context: &AuditContext) -> Json {
    serde_json::to_value(context).unwrap_or(Json::Object(Default::default()))
}

#[async_trait]
pub trait Audit: Send + Sync {
    async fn log_created(&self, session: &Session, context: &AuditContext);
    async fn log_revoked(&self, session: &Session, context: &AuditContext);
    async fn log_accessed(&self, session: &Session, context: &AuditContext);
    async fn log_suspicious(&self, session: &Session, context: &AuditContext);
}

#[derive(Insertable)]
#[diesel(table_name = session_audit_log)]
struct NewAuditRow {
    id: Uuid,
    session_id: Uuid,
    user_id: Uuid,
    event_type: String,
    context: Json,
}

/// Persists each event as a row in `session_audit_log`.
pub struct DatabaseAudit {
    pool: DieselPool,
}

impl DatabaseAudit {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, event_type: &str, session: &Session, context: &AuditContext) {
        let row = NewAuditRow {
            id: Uuid::new_v4(),
            session_id: session.id,
            user_id: session.user_id,
            event_type: event_type.to_string(),
            context: context_to_json(context),
        };

        let conn = self.pool.get().await;
        let Ok(mut conn) = conn else {
            warn!("session audit: failed to acquire db connection, dropping event");
            return;
        };

        if let Err(e) = diesel::insert_into(session_audit_log::table)
            .values(&row)
            .execute(&mut conn)
            .await
        {
            warn!("session audit: failed to persist {} event: {}", event_type, e);
        }
    }
}

#[async_trait]
impl Audit for DatabaseAudit {
    async fn log_created(&self, session: &Session, context: &AuditContext) {
        self.insert("created", session, context).await;
    }

    async fn log_revoked(&self, session: &Session, context: &AuditContext) {
        self.insert("revoked", session, context).await;
    }

    async fn log_accessed(&self, session: &Session, context: &AuditContext) {
        self.insert("accessed", session, context).await;
    }

    async fn log_suspicious(&self, session: &Session, context: &AuditContext) {
        self.insert("suspicious", session, context).await;
    }
}

/// Writes structured records through `tracing` under the `"audit"` target,
/// with no durable storage of its own.
pub struct LoggerAudit;

#[async_trait]
impl Audit for LoggerAudit {
    async fn log_created(&self, session: &Session, context: &AuditContext) {
        info!(target: "audit", session_id = %session.id, user_id = %session.user_id, ?context, "session created");
    }

    async fn log_revoked(&self, session: &Session, context: &AuditContext) {
        info!(target: "audit", session_id = %session.id, user_id = %session.user_id, ?context, "session revoked");
    }

    async fn log_accessed(&self, session: &Session, context: &AuditContext) {
        info!(target: "audit", session_id = %session.id, user_id = %session.user_id, ?context, "session accessed");
    }

    async fn log_suspicious(&self, session: &Session, context: &AuditContext) {
        error!(target: "audit", session_id = %session.id, user_id = %session.user_id, ?context, "suspicious session activity");
    }
}

/// Drops every event. Valid for environments with no audit requirement.
pub struct NoopAudit;

#[async_trait]
impl Audit for NoopAudit {
    async fn log_created(&self, _session: &Session, _context: &AuditContext) {}
    async fn log_revoked(&self, _session: &Session, _context: &AuditContext) {}
    async fn log_accessed(&self, _session: &Session, _context: &AuditContext) {}
    async fn log_suspicious(&self, _session: &Session, _context: &AuditContext) {}
}

/// Narrow counter protocol the metrics-backed audit sink emits through,
/// kept separate from any concrete metrics crate so this module doesn't
/// force a dependency choice on embedders that don't want one.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, counter: &str);
}

/// Emits counters through an injected [`MetricsSink`] instead of persisting
/// event bodies; use alongside `LoggerAudit`/`DatabaseAudit` rather than as
/// a replacement when event detail must be retained.
pub struct MetricsAudit<M: MetricsSink> {
    sink: M,
}

impl<M: MetricsSink> MetricsAudit<M> {
    pub fn new(sink: M) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl<M: MetricsSink> Audit for MetricsAudit<M> {
    async fn log_created(&self, _session: &Session, _context: &AuditContext) {
        self.sink.increment("session.created");
    }

    async fn log_revoked(&self, _session: &Session, _context: &AuditContext) {
        self.sink.increment("session.revoked");
    }

    async fn log_accessed(&self, _session: &Session, _context: &AuditContext) {
        self.sink.increment("session.accessed");
    }

    async fn log_suspicious(&self, _session: &Session, _context: &AuditContext) {
        self.sink.increment("session.suspicious");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink {
        count: Arc<AtomicUsize>,
    }

    impl MetricsSink for CountingSink {
        fn increment(&self, _counter: &str) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sample_session() -> Session {
        let now = chrono::Utc::now();
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            device_info: None,
            ip_address: None,
            user_agent: None,
            location: None,
            fingerprint: None,
            is_trusted_device: false,
            is_revoked: false,
            revoked_at: None,
            last_used_at: None,
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn metrics_audit_increments_on_every_event() {
        let count = Arc::new(AtomicUsize::new(0));
        let audit = MetricsAudit::new(CountingSink {
            count: count.clone(),
        });
        let session = sample_session();
        let ctx = AuditContext::new();

        audit.log_created(&session, &ctx).await;
        audit.log_revoked(&session, &ctx).await;
        audit.log_accessed(&session, &ctx).await;
        audit.log_suspicious(&session, &ctx).await;

        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn noop_audit_never_panics() {
        let audit = NoopAudit;
        let session = sample_session();
        let ctx = AuditContext::new();
        audit.log_created(&session, &ctx).await;
        audit.log_suspicious(&session, &ctx).await;
    }
}
