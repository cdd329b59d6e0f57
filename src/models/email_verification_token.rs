// Email verification token database model.
//
// Same opaque-secret shape as `password_reset.rs`, with a longer TTL and no
// `confirm_password` DTO companion: verification only ever consumes a token.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::email_verification_tokens;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = email_verification_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EmailVerificationToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = email_verification_tokens)]
pub struct NewEmailVerificationToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewEmailVerificationToken {
    pub fn new(
        user_id: Uuid,
        token_hash: String,
        expires_at: DateTime<Utc>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            user_id,
            token_hash,
            expires_at,
            ip_address,
            user_agent,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, validator::Validate)]
pub struct VerifyEmailRequest {
    #[validate(length(min = 32, max = 64, message = "Invalid verification token format"))]
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, validator::Validate)]
pub struct ResendVerificationRequest {
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
}
