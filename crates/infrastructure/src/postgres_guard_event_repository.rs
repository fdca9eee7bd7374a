use async_trait::async_trait;
use sqlx::PgPool;

use warden_application::{GuardEvent, GuardEventRepository};
use warden_core::AppResult;

use crate::postgres_throttle_repository::store_error;

/// PostgreSQL-backed repository for guard audit events.
#[derive(Clone)]
pub struct PostgresGuardEventRepository {
    pool: PgPool,
}

impl PostgresGuardEventRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GuardEventRepository for PostgresGuardEventRepository {
    async fn append_event(&self, event: GuardEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO guard_events (
                principal,
                event_type,
                outcome,
                actor
            )
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(event.principal)
        .bind(event.event_type)
        .bind(event.outcome)
        .bind(event.actor)
        .execute(&self.pool)
        .await
        .map_err(|error| store_error(error, "append guard event"))?;

        Ok(())
    }
}
