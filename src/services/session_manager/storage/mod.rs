pub mod cache;
pub mod database;
pub mod memory;

pub use cache::CacheStorage;
pub use database::DatabaseStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use uuid::Uuid;

use super::{Session, SessionFilters};
use crate::utils::auth_errors::AuthError;

/// Persistence contract for `SessionManager`. Each implementation trades off
/// query richness for operational cost differently — see the storage table
/// in the session-manager design notes.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn save(&self, session: Session) -> Result<(), AuthError>;
    async fn get(&self, id: Uuid) -> Result<Option<Session>, AuthError>;
    async fn list(&self, user_id: Uuid, filters: SessionFilters) -> Result<Vec<Session>, AuthError>;
    async fn revoke(&self, id: Uuid, reason: &str) -> Result<bool, AuthError>;
    async fn delete(&self, id: Uuid) -> Result<bool, AuthError>;
}
