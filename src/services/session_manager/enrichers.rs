// Best-effort decorators applied after backend-create and before
// storage-save. Concrete geolocation/user-agent parsing is out of scope for
// this core (the spec calls this out explicitly); these are stubs that
// wire into the composition correctly and fail open.

use async_trait::async_trait;

use super::Session;

#[async_trait]
pub trait Enricher: Send + Sync {
    /// Any error is caught internally and the unmodified session returned —
    /// enrichment must never fail session creation.
    async fn enrich(&self, session: Session) -> Session;
}

/// Would resolve `ip_address` to a `location` string via a geolocation
/// lookup; currently a pass-through, since no geolocation provider is wired
/// into this core.
pub struct GeoEnricher;

#[async_trait]
impl Enricher for GeoEnricher {
    async fn enrich(&self, session: Session) -> Session {
        session
    }
}

/// Would parse `user_agent` into a normalized `device_info` string (e.g.
/// via `woothee`, already a dependency of this crate); currently a
/// pass-through.
pub struct UserAgentEnricher;

#[async_trait]
impl Enricher for UserAgentEnricher {
    async fn enrich(&self, session: Session) -> Session {
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_session() -> Session {
        let now = chrono::Utc::now();
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            device_info: None,
            ip_address: Some("1.2.3.4".to_string()),
            user_agent: Some("curl/8.0".to_string()),
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
    async fn stub_enrichers_pass_sessions_through_unmodified() {
        let session = sample_session();
        let after_geo = GeoEnricher.enrich(session.clone()).await;
        assert_eq!(after_geo.location, session.location);

        let after_ua = UserAgentEnricher.enrich(session.clone()).await;
        assert_eq!(after_ua.device_info, session.device_info);
    }
}
