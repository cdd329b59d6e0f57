// User database model.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::users;

/// User database model - queryable from database.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// `None` for accounts provisioned without a local password (future SSO hook).
    pub password_hash: Option<String>,
    pub full_name: String,
    pub company_name: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub failed_login_attempts: i32,
    pub account_locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub min_token_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user for insertion.
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub full_name: String,
    pub company_name: Option<String>,
}

/// Partial user update.
#[derive(Debug, AsChangeset, Default)]
#[diesel(table_name = users)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password_hash: Option<Option<String>>,
    pub full_name: Option<String>,
    pub company_name: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub email_verified: Option<bool>,
    pub email_verified_at: Option<Option<DateTime<Utc>>>,
    pub failed_login_attempts: Option<i32>,
    pub account_locked_until: Option<Option<DateTime<Utc>>>,
    pub last_login_at: Option<Option<DateTime<Utc>>>,
    pub last_login_ip: Option<Option<String>>,
    pub min_token_version: Option<i32>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Errors for user operations.
#[derive(thiserror::Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("User not found")]
    NotFound,

    #[error("Invalid user ID format")]
    InvalidId,

    #[error("Connection pool error")]
    Pool(String),
}

impl User {
    /// Find user by ID.
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(id.eq(user_id))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Find user by email (case-insensitive).
    pub async fn find_by_email(
        conn: &mut AsyncPgConnection,
        email_str: &str,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;
        use diesel::PgTextExpressionMethods;

        users
            .filter(email.ilike(email_str))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Create a new user.
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_user: NewUser,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        diesel::insert_into(users)
            .values(&new_user)
            .get_result::<User>(conn)
            .await
            .map_err(UserError::Database)
    }

    /// Update user.
    pub async fn update(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        mut update: UserUpdate,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        update.updated_at.get_or_insert_with(Utc::now);

        diesel::update(users.filter(id.eq(user_id)))
            .set(&update)
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Whether the account is currently locked out due to repeated failed logins.
    pub fn is_locked(&self) -> bool {
        self.account_locked_until
            .map(|until| until > Utc::now())
            .unwrap_or(false)
    }

    /// Whether this user can authenticate with a password at all.
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Increment the failed-login counter, returning the update to persist.
    pub fn record_failed_login(&self, lockout_threshold: i32, lockout_duration_secs: i64) -> UserUpdate {
        let attempts = self.failed_login_attempts + 1;
        let locked_until = if attempts >= lockout_threshold {
            Some(Utc::now() + chrono::Duration::seconds(lockout_duration_secs))
        } else {
            self.account_locked_until
        };

        UserUpdate {
            failed_login_attempts: Some(attempts),
            account_locked_until: Some(locked_until),
            ..Default::default()
        }
    }

    /// Reset lockout bookkeeping and stamp the successful login, returning the update to persist.
    pub fn record_successful_login(&self, ip: Option<String>) -> UserUpdate {
        UserUpdate {
            failed_login_attempts: Some(0),
            account_locked_until: Some(None),
            last_login_at: Some(Some(Utc::now())),
            last_login_ip: Some(ip),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(failed_login_attempts: i32, account_locked_until: Option<DateTime<Utc>>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            password_hash: Some("hash".to_string()),
            full_name: "Test User".to_string(),
            company_name: None,
            is_active: true,
            email_verified: true,
            email_verified_at: Some(now),
            failed_login_attempts,
            account_locked_until,
            last_login_at: None,
            last_login_ip: None,
            min_token_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn is_locked_reflects_future_lockout_only() {
        let unlocked = sample_user(0, None);
        assert!(!unlocked.is_locked());

        let locked = sample_user(10, Some(Utc::now() + chrono::Duration::minutes(5)));
        assert!(locked.is_locked());

        let expired = sample_user(10, Some(Utc::now() - chrono::Duration::minutes(5)));
        assert!(!expired.is_locked());
    }

    #[test]
    fn record_failed_login_locks_at_threshold() {
        let user = sample_user(9, None);
        let update = user.record_failed_login(10, 3600);
        assert_eq!(update.failed_login_attempts, Some(10));
        assert!(update.account_locked_until.unwrap().is_some());
    }

    #[test]
    fn record_failed_login_below_threshold_does_not_lock() {
        let user = sample_user(2, None);
        let update = user.record_failed_login(10, 3600);
        assert_eq!(update.failed_login_attempts, Some(3));
        assert_eq!(update.account_locked_until, Some(None));
    }

    #[test]
    fn record_successful_login_clears_lockout_state() {
        let user = sample_user(9, Some(Utc::now() + chrono::Duration::minutes(1)));
        let update = user.record_successful_login(Some("10.0.0.5".to_string()));
        assert_eq!(update.failed_login_attempts, Some(0));
        assert_eq!(update.account_locked_until, Some(None));
        assert_eq!(update.last_login_ip, Some(Some("10.0.0.5".to_string())));
    }
}
