//! PostgreSQL-backed throttle store using the `throttle` table.
//!
//! Every mutation is a single statement, so row-level locking serialises
//! concurrent attempts against the same principal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use warden_application::ThrottleRepository;
use warden_core::{AppError, AppResult};
use warden_domain::{Principal, ThrottleRecord};


const RECORD_COLUMNS: &str = "principal_kind, principal_key, attempt_count, last_attempt_at, \
     suspended, suspended_at, banned, banned_at";

/// `attempt_count` is an `INTEGER` column; the counter saturates here.
const MAX_STORED_ATTEMPTS: i32 = i32::MAX;

/// PostgreSQL implementation of the throttle repository port.
#[derive(Clone)]
pub struct PostgresThrottleRepository {
    pool: PgPool,
}

impl PostgresThrottleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn execute_for(&self, sql: &str, principal: &Principal, action: &str) -> AppResult<()> {
        sqlx::query(sql)
            .bind(principal.kind().as_str())
            .bind(principal.key())
            .execute(&self.pool)
            .await
            .map_err(|error| store_error(error, action))?;

        Ok(())
    }
}

#[async_trait]
impl ThrottleRepository for PostgresThrottleRepository {
    async fn get(&self, principal: &Principal) -> AppResult<ThrottleRecord> {
        let row = sqlx::query_as::<_, ThrottleRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM throttle
            WHERE principal_kind = $1 AND principal_key = $2
            "#
        ))
        .bind(principal.kind().as_str())
        .bind(principal.key())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| store_error(error, "load throttle record"))?;

        match row {
            Some(row) => row.try_into(),
            None => Ok(ThrottleRecord::new(*principal)),
        }
    }

    async fn record_failure(&self, principal: &Principal) -> AppResult<ThrottleRecord> {
        let row = sqlx::query_as::<_, ThrottleRow>(&format!(
            r#"
            INSERT INTO throttle (principal_kind, principal_key, attempt_count, last_attempt_at)
            VALUES ($1, $2, 1, now())
            ON CONFLICT (principal_kind, principal_key) DO UPDATE
            SET
                attempt_count = LEAST(throttle.attempt_count + 1, $3),
                last_attempt_at = now(),
                updated_at = now()
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(principal.kind().as_str())
        .bind(principal.key())
        .bind(MAX_STORED_ATTEMPTS)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| store_error(error, "record failed attempt"))?;

        row.try_into()
    }

    async fn record_success(&self, principal: &Principal) -> AppResult<()> {
        self.execute_for(
            r#"
            UPDATE throttle
            SET attempt_count = 0, updated_at = now()
            WHERE principal_kind = $1 AND principal_key = $2 AND attempt_count <> 0
            "#,
            principal,
            "reset failed attempts",
        )
        .await
    }

    async fn suspend(&self, principal: &Principal) -> AppResult<()> {
        self.execute_for(
            r#"
            INSERT INTO throttle (principal_kind, principal_key, suspended, suspended_at)
            VALUES ($1, $2, TRUE, now())
            ON CONFLICT (principal_kind, principal_key) DO UPDATE
            SET
                suspended = TRUE,
                suspended_at = CASE
                    WHEN throttle.suspended THEN throttle.suspended_at
                    ELSE now()
                END,
                updated_at = now()
            "#,
            principal,
            "suspend principal",
        )
        .await
    }

    async fn unsuspend(&self, principal: &Principal) -> AppResult<()> {
        self.execute_for(
            r#"
            UPDATE throttle
            SET suspended = FALSE, suspended_at = NULL, updated_at = now()
            WHERE principal_kind = $1 AND principal_key = $2
            "#,
            principal,
            "unsuspend principal",
        )
        .await
    }

    async fn ban(&self, principal: &Principal) -> AppResult<()> {
        self.execute_for(
            r#"
            INSERT INTO throttle (principal_kind, principal_key, banned, banned_at)
            VALUES ($1, $2, TRUE, now())
            ON CONFLICT (principal_kind, principal_key) DO UPDATE
            SET
                banned = TRUE,
                banned_at = CASE
                    WHEN throttle.banned THEN throttle.banned_at
                    ELSE now()
                END,
                updated_at = now()
            "#,
            principal,
            "ban principal",
        )
        .await
    }

    async fn unban(&self, principal: &Principal) -> AppResult<()> {
        self.execute_for(
            r#"
            UPDATE throttle
            SET banned = FALSE, banned_at = NULL, updated_at = now()
            WHERE principal_kind = $1 AND principal_key = $2
            "#,
            principal,
            "unban principal",
        )
        .await
    }

    async fn list_restricted(&self, limit: usize) -> AppResult<Vec<ThrottleRecord>> {
        let limit = i64::try_from(limit)
            .map_err(|error| AppError::Validation(format!("invalid limit: {error}")))?;

        let rows = sqlx::query_as::<_, ThrottleRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM throttle
            WHERE suspended OR banned
            ORDER BY updated_at DESC, id DESC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| store_error(error, "list restricted principals"))?;

        rows.into_iter().map(ThrottleRecord::try_from).collect()
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|error| store_error(error, "ping throttle store"))?;

        Ok(())
    }
}

/// Maps connectivity failures to `StoreUnavailable`; anything else is internal.
pub(crate) fn store_error(error: sqlx::Error, action: &str) -> AppError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            AppError::StoreUnavailable(format!("failed to {action}: {error}"))
        }
        _ => AppError::Internal(format!("failed to {action}: {error}")),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ThrottleRow {
    principal_kind: String,
    principal_key: String,
    attempt_count: i32,
    last_attempt_at: Option<DateTime<Utc>>,
    suspended: bool,
    suspended_at: Option<DateTime<Utc>>,
    banned: bool,
    banned_at: Option<DateTime<Utc>>,
}

impl TryFrom<ThrottleRow> for ThrottleRecord {
    type Error = AppError;

    fn try_from(row: ThrottleRow) -> Result<Self, Self::Error> {
        let principal = Principal::from_parts(&row.principal_kind, &row.principal_key)
            .map_err(|error| AppError::Internal(format!("corrupt throttle row: {error}")))?;
        let attempt_count = u32::try_from(row.attempt_count).map_err(|error| {
            AppError::Internal(format!("invalid stored attempt count: {error}"))
        })?;

        Ok(Self {
            principal,
            attempt_count,
            last_attempt_at: row.last_attempt_at,
            suspended: row.suspended,
            suspended_at: row.suspended_at,
            banned: row.banned,
            banned_at: row.banned_at,
        })
    }
}
