use std::sync::Arc;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use warden_application::{
    AccessGuardService, GuardEventRepository, GuardEventService, ThrottleRepository,
};
use warden_core::AppError;
use warden_infrastructure::{
    InMemoryThrottleRepository, MIGRATOR, PostgresGuardEventRepository,
    PostgresThrottleRepository, RedisThrottleRepository, TracingGuardEventRepository,
};

use crate::api_config::{ApiConfig, ThrottleStoreConfig};
use crate::state::AppState;

pub async fn connect_and_migrate(database_url: &str) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

pub fn build_redis_client(redis_url: &str) -> Result<redis::Client, AppError> {
    redis::Client::open(redis_url)
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))
}

pub async fn build_app_state(config: &ApiConfig) -> Result<AppState, AppError> {
    let (throttle_repository, event_repository): (
        Arc<dyn ThrottleRepository>,
        Arc<dyn GuardEventRepository>,
    ) = match &config.store {
        ThrottleStoreConfig::Memory => {
            info!("using in-memory throttle store");
            (
                Arc::new(InMemoryThrottleRepository::new()),
                Arc::new(TracingGuardEventRepository::new()),
            )
        }
        ThrottleStoreConfig::Postgres { database_url } => {
            let pool = connect_and_migrate(database_url).await?;
            info!("using postgres throttle store");
            (
                Arc::new(PostgresThrottleRepository::new(pool.clone())),
                Arc::new(PostgresGuardEventRepository::new(pool)),
            )
        }
        ThrottleStoreConfig::Redis {
            redis_url,
            key_prefix,
        } => {
            let client = build_redis_client(redis_url)?;
            info!(key_prefix = %key_prefix, "using redis throttle store");
            (
                Arc::new(RedisThrottleRepository::new(client, key_prefix.clone())),
                Arc::new(TracingGuardEventRepository::new()),
            )
        }
    };

    let guard_service = AccessGuardService::new(
        throttle_repository,
        config.policy,
        GuardEventService::new(event_repository),
    );

    Ok(AppState {
        guard_service,
        admin_token: Arc::from(config.admin_token.as_str()),
        trusted_proxies: Arc::from(config.trusted_proxies.clone()),
    })
}
