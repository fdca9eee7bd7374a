//! Per-principal throttle state and its transitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{GuardPolicy, Principal};

/// Persisted throttle, suspension and ban state for one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleRecord {
    /// Identity the record belongs to.
    pub principal: Principal,
    /// Consecutive failed attempts since the last success.
    pub attempt_count: u32,
    /// Time of the most recent failed attempt.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Whether the principal is suspended.
    pub suspended: bool,
    /// When the current suspension started.
    pub suspended_at: Option<DateTime<Utc>>,
    /// Whether the principal is banned. Supersedes suspension.
    pub banned: bool,
    /// When the current ban started.
    pub banned_at: Option<DateTime<Utc>>,
}

impl ThrottleRecord {
    /// Creates the zero-valued record of a principal with no history.
    #[must_use]
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            attempt_count: 0,
            last_attempt_at: None,
            suspended: false,
            suspended_at: None,
            banned: false,
            banned_at: None,
        }
    }

    /// Counts a failed attempt made at `now`.
    pub fn apply_failure(&mut self, now: DateTime<Utc>) {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_attempt_at = Some(now);
    }

    /// Clears the failure counter. Suspension and ban are untouched.
    pub fn apply_success(&mut self) {
        self.attempt_count = 0;
    }

    /// Suspends the principal; the start time only moves on a false→true transition.
    pub fn apply_suspend(&mut self, now: DateTime<Utc>) {
        if !self.suspended {
            self.suspended = true;
            self.suspended_at = Some(now);
        }
    }

    /// Lifts a suspension.
    pub fn apply_unsuspend(&mut self) {
        self.suspended = false;
        self.suspended_at = None;
    }

    /// Bans the principal; the start time only moves on a false→true transition.
    pub fn apply_ban(&mut self, now: DateTime<Utc>) {
        if !self.banned {
            self.banned = true;
            self.banned_at = Some(now);
        }
    }

    /// Lifts a ban.
    pub fn apply_unban(&mut self) {
        self.banned = false;
        self.banned_at = None;
    }

    /// Returns whether the record is suspended or banned.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        self.suspended || self.banned
    }

    /// End of the current suspension under a time-bounded policy.
    ///
    /// `None` means the suspension is indefinite (or there is none).
    #[must_use]
    pub fn suspended_until(&self, duration: Option<Duration>) -> Option<DateTime<Utc>> {
        if !self.suspended {
            return None;
        }

        match (self.suspended_at, duration) {
            (Some(started_at), Some(duration)) => started_at.checked_add_signed(duration),
            _ => None,
        }
    }

    /// Returns whether a time-bounded suspension has run out at `now`.
    #[must_use]
    pub fn suspension_expired(&self, now: DateTime<Utc>, duration: Option<Duration>) -> bool {
        self.suspended_until(duration)
            .is_some_and(|until| now >= until)
    }

    /// End of the throttle delay owed for the current failure count.
    #[must_use]
    pub fn throttled_until(&self, delay: Duration) -> Option<DateTime<Utc>> {
        if delay <= Duration::zero() {
            return None;
        }

        self.last_attempt_at
            .and_then(|last_attempt_at| last_attempt_at.checked_add_signed(delay))
    }

    /// Classifies the record at `now` under `policy`.
    #[must_use]
    pub fn access_state(&self, now: DateTime<Utc>, policy: &GuardPolicy) -> AccessState {
        if self.banned {
            return AccessState::Banned;
        }

        if self.suspended && !self.suspension_expired(now, policy.suspension.duration()) {
            return AccessState::Suspended;
        }

        let delay = policy.backoff.delay_for(self.attempt_count);
        if self
            .throttled_until(delay)
            .is_some_and(|until| now < until)
        {
            return AccessState::Throttled;
        }

        AccessState::Clear
    }
}

/// Lifecycle state of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
    /// No restriction applies.
    Clear,
    /// A backoff delay is still pending.
    Throttled,
    /// Locked out until an administrator or the suspension expiry lifts it.
    Suspended,
    /// Locked out until an administrator unbans. Absorbing under automated logic.
    Banned,
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    use super::{AccessState, ThrottleRecord};
    use crate::{GuardPolicy, Principal};

    fn record() -> ThrottleRecord {
        ThrottleRecord::new(Principal::Ip(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9))))
    }

    fn at(seconds: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0)
            .single()
            .unwrap_or_default()
    }

    #[test]
    fn success_resets_count_but_keeps_restrictions() {
        let mut record = record();
        record.apply_failure(at(0));
        record.apply_failure(at(1));
        record.apply_suspend(at(2));
        record.apply_ban(at(3));

        record.apply_success();

        assert_eq!(record.attempt_count, 0);
        assert!(record.suspended);
        assert!(record.banned);
    }

    #[test]
    fn repeated_suspend_keeps_original_start() {
        let mut record = record();
        record.apply_suspend(at(10));
        record.apply_suspend(at(20));
        assert_eq!(record.suspended_at, Some(at(10)));

        record.apply_unsuspend();
        assert!(!record.suspended);
        assert_eq!(record.suspended_at, None);

        record.apply_suspend(at(30));
        assert_eq!(record.suspended_at, Some(at(30)));
    }

    #[test]
    fn repeated_ban_keeps_original_start() {
        let mut record = record();
        record.apply_ban(at(5));
        record.apply_ban(at(6));
        assert_eq!(record.banned_at, Some(at(5)));

        record.apply_unban();
        assert_eq!(record.banned_at, None);
        assert!(!record.banned);
    }

    #[test]
    fn banned_wins_over_suspended_state() {
        let mut record = record();
        record.apply_suspend(at(0));
        record.apply_ban(at(1));
        assert_eq!(
            record.access_state(at(2), &GuardPolicy::default()),
            AccessState::Banned
        );
    }

    #[test]
    fn time_bounded_suspension_expires() {
        let mut record = record();
        record.apply_suspend(at(0));
        let policy = GuardPolicy::default();

        assert_eq!(record.access_state(at(60), &policy), AccessState::Suspended);
        assert!(record.suspension_expired(at(24 * 3600), Some(Duration::hours(24))));
        assert_eq!(
            record.access_state(at(24 * 3600), &policy),
            AccessState::Clear
        );
        assert_eq!(record.suspended_until(None), None);
    }

    #[test]
    fn throttled_state_ends_after_backoff_delay() {
        let mut record = record();
        for second in 0..4 {
            record.apply_failure(at(second));
        }
        let policy = GuardPolicy::default();

        assert_eq!(record.access_state(at(4), &policy), AccessState::Throttled);
        assert_eq!(record.access_state(at(5), &policy), AccessState::Clear);
    }

    proptest! {
        #[test]
        fn attempt_count_tracks_consecutive_failures(failures in 0_u32..300) {
            let mut record = record();
            for step in 0..failures {
                record.apply_failure(at(i64::from(step)));
            }
            prop_assert_eq!(record.attempt_count, failures);
        }
    }
}
