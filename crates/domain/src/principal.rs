//! Identities that throttle, suspension and ban state is tracked against.

use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_core::{AppError, AppResult};

/// Unique identifier for a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UserId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Storage discriminator for a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// A user account.
    User,
    /// A client IP address.
    Ip,
}

impl PrincipalKind {
    /// Stable storage value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ip => "ip",
        }
    }
}

impl FromStr for PrincipalKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "ip" => Ok(Self::Ip),
            _ => Err(AppError::Validation(format!(
                "unknown principal kind '{value}'"
            ))),
        }
    }
}

/// The identity a throttle record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum Principal {
    /// A user account.
    User(UserId),
    /// A client IP address.
    Ip(IpAddr),
}

impl Principal {
    /// Rebuilds a principal from its persisted `(kind, key)` pair.
    pub fn from_parts(kind: &str, key: &str) -> AppResult<Self> {
        match kind.parse::<PrincipalKind>()? {
            PrincipalKind::User => Uuid::parse_str(key.trim())
                .map(|value| Self::User(UserId::from_uuid(value)))
                .map_err(|error| AppError::Validation(format!("invalid user principal: {error}"))),
            PrincipalKind::Ip => IpAddr::from_str(key.trim())
                .map(|value| Self::Ip(canonical_ip(value)))
                .map_err(|error| AppError::Validation(format!("invalid ip principal: {error}"))),
        }
    }

    /// Creates an IP principal, folding IPv4-mapped IPv6 addresses to IPv4.
    #[must_use]
    pub fn ip(address: IpAddr) -> Self {
        Self::Ip(canonical_ip(address))
    }

    /// Returns the storage discriminator.
    #[must_use]
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Self::User(_) => PrincipalKind::User,
            Self::Ip(_) => PrincipalKind::Ip,
        }
    }

    /// Returns the storage key within the principal kind.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::User(user_id) => user_id.to_string(),
            Self::Ip(address) => address.to_string(),
        }
    }
}

impl Display for Principal {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.kind().as_str(), self.key())
    }
}

fn canonical_ip(address: IpAddr) -> IpAddr {
    match address {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map_or(IpAddr::V6(v6), IpAddr::V4),
        IpAddr::V4(_) => address,
    }
}
