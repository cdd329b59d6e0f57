// Request-scoped identity extracted from a validated access token.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity carried by a validated access token, injected into request
/// extensions by [`crate::middleware::auth_middleware::auth_middleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    /// Session (refresh-token row) this access token was minted against, if any.
    pub session_id: Option<Uuid>,
    pub exp: u64,
}
