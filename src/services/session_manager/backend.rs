// Reference `Backend` implementation: "JWT-style" in the sense the spec
// uses the term — ids are freshly generated and the TTL comes from config,
// with no further domain rules beyond what `Session` itself encodes. A
// database-backed backend that re-validates against `User.min_token_version`
// would be a legitimate alternative implementation of this trait; that
// validation currently lives at the `AuthService` orchestration layer
// instead (see `services::auth::AuthService::refresh`), so it is not
// duplicated here.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::{AuditContext, Backend, Session};
use crate::utils::auth_errors::AuthError;

pub struct DefaultBackend {
    ttl_seconds: u64,
}

impl DefaultBackend {
    pub fn new(ttl_seconds: u64) -> Self {
        Self { ttl_seconds }
    }
}

#[async_trait]
impl Backend for DefaultBackend {
    async fn create(
        &self,
        user_id: Uuid,
        device_info: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
        meta: AuditContext,
    ) -> Result<Session, AuthError> {
        let now = Utc::now();

        Ok(Session {
            id: Uuid::new_v4(),
            user_id,
            device_info,
            ip_address,
            user_agent,
            location: meta.get("location").cloned(),
            fingerprint: meta.get("fingerprint").cloned(),
            is_trusted_device: meta
                .get("is_trusted_device")
                .map(|v| v == "true")
                .unwrap_or(false),
            is_revoked: false,
            revoked_at: None,
            last_used_at: None,
            created_at: now,
            expires_at: now + Duration::seconds(self.ttl_seconds as i64),
        })
    }

    fn validate(&self, session: &Session) -> bool {
        session.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_sets_expiry_from_ttl() {
        let backend = DefaultBackend::new(3600);
        let session = backend
            .create(Uuid::new_v4(), None, None, None, AuditContext::new())
            .await
            .unwrap();

        let delta = session.expires_at - session.created_at;
        assert_eq!(delta.num_seconds(), 3600);
        assert!(backend.validate(&session));
    }

    #[tokio::test]
    async fn validate_rejects_revoked_session() {
        let backend = DefaultBackend::new(3600);
        let mut session = backend
            .create(Uuid::new_v4(), None, None, None, AuditContext::new())
            .await
            .unwrap();
        session.is_revoked = true;

        assert!(!backend.validate(&session));
    }
}
