// Builds a `SessionManager` from configuration, wiring one of the three
// storages and one of the four audit sinks per `SessionManagerConfig`
// (§ app_config::SessionManagerConfig) — the same config-driven selection
// `services::email::EmailService` already does for its provider backend.

use tracing::info;

use super::{
    audit::MetricsSink, Audit, Backend, CacheStorage, DatabaseAudit, DatabaseStorage,
    DefaultBackend, Enricher, GeoEnricher, LoggerAudit, MemoryStorage, MetricsAudit, NoopAudit,
    SessionManager, Storage, UserAgentEnricher,
};
use crate::app_config::{SessionAuditSink, SessionManagerConfig, SessionStorageBackend};
use crate::db::{DieselPool, RedisPool};

/// Increments a tracing event per counter name. A real deployment wiring
/// its own metrics crate (e.g. the `prometheus` stack this project dropped
/// when its link-analytics surface was trimmed) would supply its own
/// `MetricsSink` instead of this one.
struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn increment(&self, counter: &str) {
        tracing::debug!(counter, "session manager metric incremented");
    }
}

pub fn build_session_manager(
    config: &SessionManagerConfig,
    diesel_pool: DieselPool,
    redis_pool: RedisPool,
) -> SessionManager {
    let backend: Box<dyn Backend> = Box::new(DefaultBackend::new(config.default_ttl_seconds));

    let storage: Box<dyn Storage> = match config.storage_backend {
        SessionStorageBackend::Database => Box::new(DatabaseStorage::new(diesel_pool.clone())),
        SessionStorageBackend::Cache => {
            Box::new(CacheStorage::new(redis_pool, config.cache_min_ttl_seconds))
        },
        SessionStorageBackend::Memory => Box::new(MemoryStorage::new()),
    };

    let audit: Box<dyn Audit> = match config.audit_sink {
        SessionAuditSink::Database => Box::new(DatabaseAudit::new(diesel_pool)),
        SessionAuditSink::Logger => Box::new(LoggerAudit),
        SessionAuditSink::Metrics => Box::new(MetricsAudit::new(TracingMetricsSink)),
        SessionAuditSink::Noop => Box::new(NoopAudit),
    };

    let enrichers: Vec<Box<dyn Enricher>> = vec![Box::new(GeoEnricher), Box::new(UserAgentEnricher)];

    info!(
        storage = ?config.storage_backend,
        audit = ?config.audit_sink,
        "session manager initialized"
    );

    SessionManager::new(backend, storage, audit, enrichers)
}
