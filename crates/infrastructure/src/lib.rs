//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_throttle_repository;
mod postgres_guard_event_repository;
mod postgres_throttle_repository;
mod redis_throttle_repository;
mod tracing_guard_event_repository;

pub use in_memory_throttle_repository::InMemoryThrottleRepository;
pub use postgres_guard_event_repository::PostgresGuardEventRepository;
pub use postgres_throttle_repository::PostgresThrottleRepository;
pub use redis_throttle_repository::RedisThrottleRepository;
pub use tracing_guard_event_repository::TracingGuardEventRepository;

/// Embedded SQL migrations for the throttle and guard event tables.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
