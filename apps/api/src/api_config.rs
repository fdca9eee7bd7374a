use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::Duration;
use ipnet::IpNet;
use tracing_subscriber::EnvFilter;
use warden_core::AppError;
use warden_domain::{BackoffPolicy, GuardPolicy, SuspensionPolicy};

const MIN_ADMIN_TOKEN_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleStoreConfig {
    Memory,
    Postgres { database_url: String },
    Redis { redis_url: String, key_prefix: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub api_host: String,
    pub api_port: u16,
    pub store: ThrottleStoreConfig,
    pub admin_token: String,
    pub trusted_proxies: Vec<IpNet>,
    pub policy: GuardPolicy,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3002);

        let store = match env::var("WARDEN_STORE")
            .unwrap_or_else(|_| "memory".to_owned())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => ThrottleStoreConfig::Memory,
            "postgres" => ThrottleStoreConfig::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
            },
            "redis" => ThrottleStoreConfig::Redis {
                redis_url: required_non_empty_env("REDIS_URL")?,
                key_prefix: env::var("REDIS_KEY_PREFIX")
                    .ok()
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| "warden:throttle".to_owned()),
            },
            other => {
                return Err(AppError::Validation(format!(
                    "WARDEN_STORE must be one of 'memory', 'postgres' or 'redis', got '{other}'"
                )));
            }
        };

        let admin_token = required_env("WARDEN_ADMIN_TOKEN")?;
        if admin_token.len() < MIN_ADMIN_TOKEN_LENGTH {
            return Err(AppError::Validation(format!(
                "WARDEN_ADMIN_TOKEN must be at least {MIN_ADMIN_TOKEN_LENGTH} characters"
            )));
        }

        let trusted_proxies =
            parse_trusted_proxies(env::var("WARDEN_TRUSTED_PROXIES").unwrap_or_default().as_str())?;

        let policy = load_policy(|name| env::var(name).ok())?;

        Ok(Self {
            migrate_only,
            api_host,
            api_port,
            store,
            admin_token,
            trusted_proxies,
            policy,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

pub fn parse_trusted_proxies(value: &str) -> Result<Vec<IpNet>, AppError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            IpNet::from_str(entry)
                .or_else(|_| IpAddr::from_str(entry).map(IpNet::from))
                .map_err(|error| {
                    AppError::Validation(format!(
                        "invalid WARDEN_TRUSTED_PROXIES entry '{entry}': {error}"
                    ))
                })
        })
        .collect()
}

/// Builds the guard policy from `WARDEN_*` variables read through `lookup`.
pub fn load_policy(lookup: impl Fn(&str) -> Option<String>) -> Result<GuardPolicy, AppError> {
    let backoff = BackoffPolicy::new(
        parse_or(&lookup, "WARDEN_THROTTLE_FREE_ATTEMPTS", 3)?,
        seconds(parse_or(&lookup, "WARDEN_THROTTLE_BASE_SECONDS", 1)?),
        seconds(parse_or(&lookup, "WARDEN_THROTTLE_CAP_SECONDS", 1024)?),
    )?;

    let threshold = match setting(&lookup, "WARDEN_SUSPENSION_THRESHOLD").as_deref() {
        None => Some(10),
        Some("0" | "off") => None,
        Some(value) => Some(parse_value("WARDEN_SUSPENSION_THRESHOLD", value)?),
    };
    let duration = match setting(&lookup, "WARDEN_SUSPENSION_SECONDS").as_deref() {
        None => Some(Duration::hours(24)),
        Some("0" | "indefinite") => None,
        Some(value) => Some(seconds(parse_value("WARDEN_SUSPENSION_SECONDS", value)?)),
    };
    let suspension = SuspensionPolicy::new(threshold, duration)?;

    let store_failure_retry = seconds(parse_or(&lookup, "WARDEN_STORE_FAILURE_RETRY_SECONDS", 5)?);
    if store_failure_retry <= Duration::zero() {
        return Err(AppError::Validation(
            "WARDEN_STORE_FAILURE_RETRY_SECONDS must be positive".to_owned(),
        ));
    }

    Ok(GuardPolicy {
        backoff,
        suspension,
        store_failure_retry,
    })
}

fn setting(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
}

fn parse_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u32,
) -> Result<u32, AppError> {
    match setting(lookup, name) {
        Some(value) => parse_value(name, value.as_str()),
        None => Ok(default),
    }
}

fn parse_value(name: &str, value: &str) -> Result<u32, AppError> {
    value
        .parse::<u32>()
        .map_err(|error| AppError::Validation(format!("invalid {name} '{value}': {error}")))
}

fn seconds(value: u32) -> Duration {
    Duration::seconds(i64::from(value))
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
