//! Redis-backed throttle store.
//!
//! One hash per principal holds the record; a sorted set indexes the
//! principals that are currently suspended or banned. Read-modify-write
//! sequences run as Lua scripts so they are atomic per principal. Keys are
//! never given a TTL; records are retained like the relational table.
//! The scripts touch two keys, so the store targets a single Redis node.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use redis::{AsyncCommands, RedisError, Script};

use warden_application::ThrottleRepository;
use warden_core::{AppError, AppResult};
use warden_domain::{Principal, ThrottleRecord};

#[cfg(test)]
mod tests;

const RECORD_FIELDS: [&str; 6] = [
    "attempt_count",
    "last_attempt_at",
    "suspended",
    "suspended_at",
    "banned",
    "banned_at",
];

const RECORD_FAILURE_SCRIPT: &str = r#"
local key = KEYS[1]
local count = tonumber(redis.call('HGET', key, 'attempt_count') or '0')
if count < tonumber(ARGV[2]) then
  redis.call('HINCRBY', key, 'attempt_count', 1)
end
redis.call('HSET', key, 'last_attempt_at', ARGV[1])
return redis.call('HMGET', key, 'attempt_count', 'last_attempt_at', 'suspended', 'suspended_at', 'banned', 'banned_at')
"#;

const RECORD_SUCCESS_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  redis.call('HSET', KEYS[1], 'attempt_count', 0)
end
return 1
"#;

const SET_FLAG_SCRIPT: &str = r#"
local key = KEYS[1]
local index = KEYS[2]
local flag = ARGV[1]
local stamp = ARGV[2]
local now = ARGV[3]
local member = ARGV[4]

if redis.call('HGET', key, flag) ~= '1' then
  redis.call('HSET', key, flag, '1', stamp, now)
end
redis.call('HSETNX', key, 'attempt_count', 0)
redis.call('ZADD', index, now, member)
return 1
"#;

const CLEAR_FLAG_SCRIPT: &str = r#"
local key = KEYS[1]
local index = KEYS[2]
local flag = ARGV[1]
local stamp = ARGV[2]
local now = ARGV[3]
local member = ARGV[4]

if redis.call('EXISTS', key) == 0 then
  return 0
end

redis.call('HSET', key, flag, '0')
redis.call('HDEL', key, stamp)

if redis.call('HGET', key, 'suspended') == '1' or redis.call('HGET', key, 'banned') == '1' then
  redis.call('ZADD', index, now, member)
else
  redis.call('ZREM', index, member)
end
return 1
"#;

type RawRecord = (
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
);

#[derive(Debug, Clone, Copy)]
enum Flag {
    Suspended,
    Banned,
}

impl Flag {
    fn field(self) -> &'static str {
        match self {
            Self::Suspended => "suspended",
            Self::Banned => "banned",
        }
    }

    fn stamp_field(self) -> &'static str {
        match self {
            Self::Suspended => "suspended_at",
            Self::Banned => "banned_at",
        }
    }
}

/// Redis implementation of the throttle repository port.
#[derive(Clone)]
pub struct RedisThrottleRepository {
    client: redis::Client,
    key_prefix: String,
}

impl RedisThrottleRepository {
    /// Creates a repository with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, principal: &Principal) -> String {
        format!("{}:{principal}", self.key_prefix)
    }

    fn index_key(&self) -> String {
        format!("{}:restricted", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| {
                AppError::StoreUnavailable(format!("failed to connect to redis: {error}"))
            })
    }

    async fn set_flag(&self, principal: &Principal, flag: Flag) -> AppResult<()> {
        let mut connection = self.connection().await?;
        Script::new(SET_FLAG_SCRIPT)
            .key(self.key_for(principal))
            .key(self.index_key())
            .arg(flag.field())
            .arg(flag.stamp_field())
            .arg(Utc::now().timestamp_millis())
            .arg(principal.to_string())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| redis_error(error, "set throttle flag"))?;

        Ok(())
    }

    async fn clear_flag(&self, principal: &Principal, flag: Flag) -> AppResult<()> {
        let mut connection = self.connection().await?;
        Script::new(CLEAR_FLAG_SCRIPT)
            .key(self.key_for(principal))
            .key(self.index_key())
            .arg(flag.field())
            .arg(flag.stamp_field())
            .arg(Utc::now().timestamp_millis())
            .arg(principal.to_string())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| redis_error(error, "clear throttle flag"))?;

        Ok(())
    }

    async fn load(
        &self,
        connection: &mut redis::aio::MultiplexedConnection,
        principal: &Principal,
    ) -> AppResult<ThrottleRecord> {
        let raw: RawRecord = redis::cmd("HMGET")
            .arg(self.key_for(principal))
            .arg(&RECORD_FIELDS[..])
            .query_async(connection)
            .await
            .map_err(|error| redis_error(error, "load throttle record"))?;

        record_from_raw(*principal, raw)
    }
}

#[async_trait]
impl ThrottleRepository for RedisThrottleRepository {
    async fn get(&self, principal: &Principal) -> AppResult<ThrottleRecord> {
        let mut connection = self.connection().await?;
        self.load(&mut connection, principal).await
    }

    async fn record_failure(&self, principal: &Principal) -> AppResult<ThrottleRecord> {
        let mut connection = self.connection().await?;
        let raw: RawRecord = Script::new(RECORD_FAILURE_SCRIPT)
            .key(self.key_for(principal))
            .arg(Utc::now().timestamp_millis())
            .arg(u32::MAX)
            .invoke_async(&mut connection)
            .await
            .map_err(|error| redis_error(error, "record failed attempt"))?;

        record_from_raw(*principal, raw)
    }

    async fn record_success(&self, principal: &Principal) -> AppResult<()> {
        let mut connection = self.connection().await?;
        Script::new(RECORD_SUCCESS_SCRIPT)
            .key(self.key_for(principal))
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| redis_error(error, "reset failed attempts"))?;

        Ok(())
    }

    async fn suspend(&self, principal: &Principal) -> AppResult<()> {
        self.set_flag(principal, Flag::Suspended).await
    }

    async fn unsuspend(&self, principal: &Principal) -> AppResult<()> {
        self.clear_flag(principal, Flag::Suspended).await
    }

    async fn ban(&self, principal: &Principal) -> AppResult<()> {
        self.set_flag(principal, Flag::Banned).await
    }

    async fn unban(&self, principal: &Principal) -> AppResult<()> {
        self.clear_flag(principal, Flag::Banned).await
    }

    async fn list_restricted(&self, limit: usize) -> AppResult<Vec<ThrottleRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let stop = isize::try_from(limit - 1)
            .map_err(|error| AppError::Validation(format!("invalid limit: {error}")))?;
        let mut connection = self.connection().await?;
        let members: Vec<String> = connection
            .zrevrange(self.index_key(), 0, stop)
            .await
            .map_err(|error| redis_error(error, "list restricted principals"))?;

        let mut records = Vec::with_capacity(members.len());
        for member in members {
            let principal = parse_member(&member)?;
            records.push(self.load(&mut connection, &principal).await?);
        }

        Ok(records)
    }

    async fn ping(&self) -> AppResult<()> {
        let mut connection = self.connection().await?;
        let response = connection
            .ping::<String>()
            .await
            .map_err(|error| redis_error(error, "ping throttle store"))?;

        if !response.eq_ignore_ascii_case("pong") {
            return Err(AppError::StoreUnavailable(format!(
                "unexpected redis ping response: {response}"
            )));
        }

        Ok(())
    }
}

fn redis_error(error: RedisError, action: &str) -> AppError {
    if error.is_io_error()
        || error.is_connection_refusal()
        || error.is_connection_dropped()
        || error.is_timeout()
    {
        return AppError::StoreUnavailable(format!("failed to {action}: {error}"));
    }

    AppError::Internal(format!("failed to {action}: {error}"))
}

fn parse_member(member: &str) -> AppResult<Principal> {
    let (kind, key) = member.split_once(':').ok_or_else(|| {
        AppError::Internal(format!("invalid restricted index member '{member}'"))
    })?;

    Principal::from_parts(kind, key)
        .map_err(|error| AppError::Internal(format!("corrupt restricted index member: {error}")))
}

fn record_from_raw(principal: Principal, raw: RawRecord) -> AppResult<ThrottleRecord> {
    let (attempt_count, last_attempt_at, suspended, suspended_at, banned, banned_at) = raw;

    let attempt_count = u32::try_from(attempt_count.unwrap_or(0))
        .map_err(|error| AppError::Internal(format!("invalid redis attempt count: {error}")))?;

    Ok(ThrottleRecord {
        principal,
        attempt_count,
        last_attempt_at: timestamp(last_attempt_at)?,
        suspended: suspended == Some(1),
        suspended_at: timestamp(suspended_at)?,
        banned: banned == Some(1),
        banned_at: timestamp(banned_at)?,
    })
}

fn timestamp(value: Option<i64>) -> AppResult<Option<DateTime<Utc>>> {
    value
        .map(|millis| {
            Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
                AppError::Internal(format!("invalid redis timestamp: {millis}"))
            })
        })
        .transpose()
}
