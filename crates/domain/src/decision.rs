//! Decisions returned by the checkpoint chain.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Principal;

/// Outcome of running the checkpoint chain for a login attempt.
///
/// Every restricting variant names the principal that caused it so the
/// caller can attach the affected account to its response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Credential verification may proceed.
    Allow,
    /// Too many recent failures; retry after the given delay.
    Delay {
        /// Throttled principal.
        principal: Principal,
        /// Time left until the next attempt is accepted.
        #[serde(with = "duration_seconds")]
        retry_after: Duration,
    },
    /// The principal is suspended.
    Suspended {
        /// Suspended principal.
        principal: Principal,
        /// End of a time-bounded suspension; `None` when indefinite.
        until: Option<DateTime<Utc>>,
    },
    /// The principal is banned.
    Banned {
        /// Banned principal.
        principal: Principal,
    },
}

impl GuardDecision {
    /// Returns whether the attempt may proceed to credential verification.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns the principal that blocked the attempt, if any.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Allow => None,
            Self::Delay { principal, .. }
            | Self::Suspended { principal, .. }
            | Self::Banned { principal } => Some(principal),
        }
    }

    /// Ordering used when several principals yield different decisions.
    ///
    /// Matches the checkpoint order: ban, then suspension, then throttling.
    #[must_use]
    pub fn severity(&self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Delay { .. } => 1,
            Self::Suspended { .. } => 2,
            Self::Banned { .. } => 3,
        }
    }

    /// Stable label used in audit events and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Delay { .. } => "delay",
            Self::Suspended { .. } => "suspended",
            Self::Banned { .. } => "banned",
        }
    }
}

mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        // Round up so a client never retries before the delay has passed.
        let millis = value.num_milliseconds().max(0);
        serializer.serialize_i64((millis + 999) / 1000)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let seconds = i64::deserialize(deserializer)?;
        Duration::try_seconds(seconds)
            .ok_or_else(|| serde::de::Error::custom("retry_after out of range"))
    }
}
