// In-process session storage: a mutex-guarded map, full filter/pagination
// support, opportunistic expired-entry sweep on every call. Meant for tests
// and local development, not for a multi-instance deployment (state is not
// shared across processes).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::Storage;
use crate::services::session_manager::{Session, SessionFilters};
use crate::utils::auth_errors::AuthError;

#[derive(Default)]
pub struct MemoryStorage {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep(sessions: &mut HashMap<Uuid, Session>) {
        sessions.retain(|_, s| !s.is_expired());
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save(&self, session: Session) -> Result<(), AuthError> {
        let mut sessions = self.sessions.lock().unwrap();
        Self::sweep(&mut sessions);
        sessions.insert(session.id, session);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>, AuthError> {
        let mut sessions = self.sessions.lock().unwrap();
        Self::sweep(&mut sessions);
        Ok(sessions.get(&id).cloned())
    }

    async fn list(&self, user_id: Uuid, filters: SessionFilters) -> Result<Vec<Session>, AuthError> {
        let mut sessions = self.sessions.lock().unwrap();
        Self::sweep(&mut sessions);

        let mut matching: Vec<Session> = sessions
            .values()
            .filter(|s| s.user_id == user_id && filters.matches(s))
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if filters.limit > 0 {
            let start = filters.offset.max(0) as usize;
            let end = start.saturating_add(filters.limit as usize);
            matching = matching
                .into_iter()
                .skip(start)
                .take(end.saturating_sub(start))
                .collect();
        }

        Ok(matching)
    }

    async fn revoke(&self, id: Uuid, _reason: &str) -> Result<bool, AuthError> {
        let mut sessions = self.sessions.lock().unwrap();
        Self::sweep(&mut sessions);

        match sessions.get_mut(&id) {
            Some(session) if !session.is_revoked => {
                session.is_revoked = true;
                session.revoked_at = Some(chrono::Utc::now());
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AuthError> {
        let mut sessions = self.sessions.lock().unwrap();
        Ok(sessions.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn sample(user_id: Uuid, expires_in_secs: i64) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            user_id,
            device_info: Some("iPhone".to_string()),
            ip_address: Some("1.2.3.4".to_string()),
            user_agent: None,
            location: Some("Berlin".to_string()),
            fingerprint: None,
            is_trusted_device: false,
            is_revoked: false,
            revoked_at: None,
            last_used_at: None,
            created_at: now,
            expires_at: now + Duration::seconds(expires_in_secs),
        }
    }

    #[tokio::test]
    async fn save_and_get_round_trip() {
        let storage = MemoryStorage::new();
        let session = sample(Uuid::new_v4(), 3600);
        let id = session.id;

        storage.save(session).await.unwrap();
        let fetched = storage.get(id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn sweep_drops_expired_entries() {
        let storage = MemoryStorage::new();
        let expired = sample(Uuid::new_v4(), -10);
        let id = expired.id;

        storage.save(expired).await.unwrap();
        let fetched = storage.get(id).await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn list_filters_by_device_type_substring() {
        let storage = MemoryStorage::new();
        let user_id = Uuid::new_v4();
        storage.save(sample(user_id, 3600)).await.unwrap();

        let matching = storage
            .list(user_id, SessionFilters {
                device_type: Some("iphone".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(matching.len(), 1);

        let none_matching = storage
            .list(user_id, SessionFilters {
                device_type: Some("android".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none_matching.is_empty());
    }

    #[tokio::test]
    async fn revoke_is_idempotent_false_on_second_call() {
        let storage = MemoryStorage::new();
        let session = sample(Uuid::new_v4(), 3600);
        let id = session.id;
        storage.save(session).await.unwrap();

        assert!(storage.revoke(id, "test").await.unwrap());
        assert!(!storage.revoke(id, "test").await.unwrap());
    }
}
