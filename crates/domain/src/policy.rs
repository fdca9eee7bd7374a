//! Tunable throttling and suspension policy.

use chrono::Duration;
use warden_core::{AppError, AppResult};

/// Exponents above this stop doubling the delay; the cap takes over long before.
const MAX_BACKOFF_EXPONENT: u32 = 32;

/// Exponential backoff applied to consecutive failed attempts.
///
/// The first `free_attempts - 1` failures carry no delay. From the
/// `free_attempts`-th failure on, the delay is `base * 2^(n - free_attempts)`
/// capped at `cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    free_attempts: u32,
    base: Duration,
    cap: Duration,
}

impl BackoffPolicy {
    /// Creates a validated backoff policy.
    pub fn new(free_attempts: u32, base: Duration, cap: Duration) -> AppResult<Self> {
        if base < Duration::zero() {
            return Err(AppError::Validation(
                "throttle backoff base must not be negative".to_owned(),
            ));
        }

        if cap < base {
            return Err(AppError::Validation(
                "throttle backoff cap must be at least the base delay".to_owned(),
            ));
        }

        Ok(Self {
            free_attempts,
            base,
            cap,
        })
    }

    /// Number of failures tolerated before delays start.
    #[must_use]
    pub fn free_attempts(&self) -> u32 {
        self.free_attempts
    }

    /// Delay applied at the first throttled failure.
    #[must_use]
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Upper bound for any computed delay.
    #[must_use]
    pub fn cap(&self) -> Duration {
        self.cap
    }

    /// Returns the delay owed after `attempt_count` consecutive failures.
    #[must_use]
    pub fn delay_for(&self, attempt_count: u32) -> Duration {
        if attempt_count == 0 || attempt_count < self.free_attempts {
            return Duration::zero();
        }

        let exponent = (attempt_count - self.free_attempts).min(MAX_BACKOFF_EXPONENT);
        let base_ms = self.base.num_milliseconds();
        let delay_ms = base_ms.saturating_mul(1_i64 << exponent);

        Duration::milliseconds(delay_ms.min(self.cap.num_milliseconds()))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            free_attempts: 3,
            base: Duration::seconds(1),
            cap: Duration::seconds(1024),
        }
    }
}

/// Automatic suspension settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspensionPolicy {
    threshold: Option<u32>,
    duration: Option<Duration>,
}

impl SuspensionPolicy {
    /// Creates a suspension policy.
    ///
    /// `threshold` of `None` disables automatic suspension; `duration` of
    /// `None` keeps suspensions in place until lifted administratively.
    pub fn new(threshold: Option<u32>, duration: Option<Duration>) -> AppResult<Self> {
        if threshold == Some(0) {
            return Err(AppError::Validation(
                "suspension threshold must be at least one attempt".to_owned(),
            ));
        }

        if duration.is_some_and(|value| value <= Duration::zero()) {
            return Err(AppError::Validation(
                "suspension duration must be positive".to_owned(),
            ));
        }

        Ok(Self {
            threshold,
            duration,
        })
    }

    /// Failure count at which a principal is suspended automatically.
    #[must_use]
    pub fn threshold(&self) -> Option<u32> {
        self.threshold
    }

    /// Lifetime of a suspension, or `None` when indefinite.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Returns whether `attempt_count` has reached the automatic suspension threshold.
    #[must_use]
    pub fn is_crossed_by(&self, attempt_count: u32) -> bool {
        self.threshold
            .is_some_and(|threshold| attempt_count >= threshold)
    }
}

impl Default for SuspensionPolicy {
    fn default() -> Self {
        Self {
            threshold: Some(10),
            duration: Some(Duration::hours(24)),
        }
    }
}

/// Complete guard policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardPolicy {
    /// Backoff for repeated failures.
    pub backoff: BackoffPolicy,
    /// Automatic and time-bounded suspension settings.
    pub suspension: SuspensionPolicy,
    /// Retry hint returned when the store is unreachable and the guard fails closed.
    pub store_failure_retry: Duration,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            suspension: SuspensionPolicy::default(),
            store_failure_retry: Duration::seconds(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;

    use super::{BackoffPolicy, SuspensionPolicy};

    #[test]
    fn free_attempts_carry_no_delay() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::zero());
        assert_eq!(policy.delay_for(1), Duration::zero());
        assert_eq!(policy.delay_for(2), Duration::zero());
        assert_eq!(policy.delay_for(3), Duration::seconds(1));
        assert_eq!(policy.delay_for(4), Duration::seconds(2));
        assert_eq!(policy.delay_for(6), Duration::seconds(8));
    }

    #[test]
    fn delay_saturates_at_cap() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(13), Duration::seconds(1024));
        assert_eq!(policy.delay_for(40), Duration::seconds(1024));
        assert_eq!(policy.delay_for(u32::MAX), Duration::seconds(1024));
    }

    #[test]
    fn cap_below_base_is_rejected() {
        let policy = BackoffPolicy::new(3, Duration::seconds(10), Duration::seconds(5));
        assert!(policy.is_err());
    }

    #[test]
    fn zero_suspension_threshold_is_rejected() {
        assert!(SuspensionPolicy::new(Some(0), None).is_err());
        assert!(SuspensionPolicy::new(Some(5), Some(Duration::zero())).is_err());
        assert!(SuspensionPolicy::new(None, None).is_ok());
    }

    #[test]
    fn suspension_threshold_is_inclusive() {
        let policy = SuspensionPolicy::new(Some(5), None);
        assert!(matches!(policy, Ok(value) if !value.is_crossed_by(4) && value.is_crossed_by(5)));
    }

    proptest! {
        #[test]
        fn backoff_is_monotonic(
            free_attempts in 0_u32..8,
            base_ms in 0_i64..5_000,
            extra_cap_ms in 0_i64..10_000_000,
            first in 0_u32..200,
            gap in 0_u32..200,
        ) {
            let policy = BackoffPolicy::new(
                free_attempts,
                Duration::milliseconds(base_ms),
                Duration::milliseconds(base_ms + extra_cap_ms),
            );
            prop_assert!(policy.is_ok());
            if let Ok(policy) = policy {
                let lower = policy.delay_for(first);
                let higher = policy.delay_for(first + gap);
                prop_assert!(lower <= higher);
                prop_assert!(higher <= policy.cap());
            }
        }
    }
}
