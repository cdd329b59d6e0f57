// Global security configuration — a single singleton row (id = 1) holding
// the global minimum token version used for system-wide token revocation.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::schema::security_config;

/// The well-known id of the single row this table ever holds.
pub const SINGLETON_ID: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = security_config)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SecurityConfig {
    pub id: i32,
    pub global_min_token_version: i32,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub reason: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum SecurityConfigError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl SecurityConfig {
    /// Read the current global minimum token version, defaulting to 0 if the
    /// singleton row has not been created yet (no global revocation has ever run).
    pub async fn current_global_min_version(
        conn: &mut AsyncPgConnection,
    ) -> Result<i32, SecurityConfigError> {
        Ok(Self::current(conn).await?.map(|r| r.global_min_token_version).unwrap_or(0))
    }

    /// Read the singleton row as-is, or `None` if no rotation has ever run.
    pub async fn current(
        conn: &mut AsyncPgConnection,
    ) -> Result<Option<Self>, SecurityConfigError> {
        use crate::schema::security_config::dsl::*;

        let row = security_config
            .filter(id.eq(SINGLETON_ID))
            .first::<Self>(conn)
            .await
            .optional()?;

        Ok(row)
    }

    /// Bump the global minimum token version, creating the singleton row on
    /// first use. Every access token and refresh token issued before this
    /// call is rejected on its next use.
    pub async fn bump_global_version(
        conn: &mut AsyncPgConnection,
        updated_by_val: Option<String>,
        reason_val: Option<String>,
    ) -> Result<i32, SecurityConfigError> {
        use crate::schema::security_config::dsl::*;

        let current = Self::current_global_min_version(conn).await?;
        let next = current + 1;
        let now = Utc::now();

        diesel::insert_into(security_config)
            .values((
                id.eq(SINGLETON_ID),
                global_min_token_version.eq(next),
                updated_at.eq(now),
                updated_by.eq(&updated_by_val),
                reason.eq(&reason_val),
            ))
            .on_conflict(id)
            .do_update()
            .set((
                global_min_token_version.eq(next),
                updated_at.eq(now),
                updated_by.eq(&updated_by_val),
                reason.eq(&reason_val),
            ))
            .execute(conn)
            .await?;

        Ok(next)
    }
}
