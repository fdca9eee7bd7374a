//! Ordered, pluggable gates evaluated before credential verification.
//!
//! A chain never mutates state: it reads a [`ThrottleRecord`] and yields a
//! [`GuardDecision`]. Failure bookkeeping happens separately once the
//! caller knows whether the credentials were valid.

use chrono::{DateTime, Duration, Utc};

use crate::{BackoffPolicy, GuardDecision, GuardPolicy, ThrottleRecord};

/// Result of a single checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointVerdict {
    /// Defer to the next checkpoint.
    Continue,
    /// Stop the chain with this decision.
    Decide(GuardDecision),
}

/// A single gate in the chain.
pub trait Checkpoint: Send + Sync {
    /// Stable identifier used in logs.
    fn name(&self) -> &'static str;

    /// Inspects the record at `now`.
    fn evaluate(&self, record: &ThrottleRecord, now: DateTime<Utc>) -> CheckpointVerdict;
}

/// Rejects banned principals.
#[derive(Debug, Clone, Copy, Default)]
pub struct BanCheckpoint;

impl Checkpoint for BanCheckpoint {
    fn name(&self) -> &'static str {
        "ban"
    }

    fn evaluate(&self, record: &ThrottleRecord, _now: DateTime<Utc>) -> CheckpointVerdict {
        if record.banned {
            return CheckpointVerdict::Decide(GuardDecision::Banned {
                principal: record.principal,
            });
        }

        CheckpointVerdict::Continue
    }
}

/// Rejects suspended principals until the suspension is lifted or expires.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuspensionCheckpoint {
    duration: Option<Duration>,
}

impl SuspensionCheckpoint {
    /// Creates the checkpoint; `None` treats every suspension as indefinite.
    #[must_use]
    pub fn new(duration: Option<Duration>) -> Self {
        Self { duration }
    }
}

impl Checkpoint for SuspensionCheckpoint {
    fn name(&self) -> &'static str {
        "suspension"
    }

    fn evaluate(&self, record: &ThrottleRecord, now: DateTime<Utc>) -> CheckpointVerdict {
        if !record.suspended || record.suspension_expired(now, self.duration) {
            return CheckpointVerdict::Continue;
        }

        CheckpointVerdict::Decide(GuardDecision::Suspended {
            principal: record.principal,
            until: record.suspended_until(self.duration),
        })
    }
}

/// Delays principals whose backoff since the last failure has not elapsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThrottleCheckpoint {
    backoff: BackoffPolicy,
}

impl ThrottleCheckpoint {
    /// Creates the checkpoint with the given backoff.
    #[must_use]
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self { backoff }
    }
}

impl Checkpoint for ThrottleCheckpoint {
    fn name(&self) -> &'static str {
        "throttle"
    }

    fn evaluate(&self, record: &ThrottleRecord, now: DateTime<Utc>) -> CheckpointVerdict {
        let delay = self.backoff.delay_for(record.attempt_count);
        match record.throttled_until(delay) {
            Some(until) if now < until => CheckpointVerdict::Decide(GuardDecision::Delay {
                principal: record.principal,
                retry_after: until - now,
            }),
            _ => CheckpointVerdict::Continue,
        }
    }
}

/// Ordered list of checkpoints.
pub struct CheckpointChain {
    checkpoints: Vec<Box<dyn Checkpoint>>,
}

impl CheckpointChain {
    /// Creates an empty chain; it allows everything until checkpoints are added.
    #[must_use]
    pub fn new() -> Self {
        Self {
            checkpoints: Vec::new(),
        }
    }

    /// Creates the standard ban → suspension → throttle chain.
    #[must_use]
    pub fn standard(policy: &GuardPolicy) -> Self {
        Self::new()
            .with(BanCheckpoint)
            .with(SuspensionCheckpoint::new(policy.suspension.duration()))
            .with(ThrottleCheckpoint::new(policy.backoff))
    }

    /// Appends a checkpoint, builder style.
    #[must_use]
    pub fn with(mut self, checkpoint: impl Checkpoint + 'static) -> Self {
        self.push(checkpoint);
        self
    }

    /// Appends a checkpoint after the existing ones.
    pub fn push(&mut self, checkpoint: impl Checkpoint + 'static) {
        self.checkpoints.push(Box::new(checkpoint));
    }

    /// Names of the checkpoints in evaluation order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.checkpoints
            .iter()
            .map(|checkpoint| checkpoint.name())
            .collect()
    }

    /// Runs the checkpoints in order and returns the first decision.
    #[must_use]
    pub fn evaluate(&self, record: &ThrottleRecord, now: DateTime<Utc>) -> GuardDecision {
        for checkpoint in &self.checkpoints {
            if let CheckpointVerdict::Decide(decision) = checkpoint.evaluate(record, now) {
                return decision;
            }
        }

        GuardDecision::Allow
    }
}

impl Default for CheckpointChain {
    fn default() -> Self {
        Self::standard(&GuardPolicy::default())
    }
}

impl std::fmt::Debug for CheckpointChain {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CheckpointChain")
            .field("checkpoints", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{Checkpoint, CheckpointChain, CheckpointVerdict};
    use crate::{
        BackoffPolicy, GuardDecision, GuardPolicy, Principal, SuspensionPolicy, ThrottleRecord,
        UserId,
    };

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0)
            .single()
            .unwrap_or_default()
    }

    fn user_record() -> ThrottleRecord {
        ThrottleRecord::new(Principal::User(UserId::new()))
    }

    struct CountingCheckpoint {
        calls: Arc<AtomicUsize>,
    }

    impl Checkpoint for CountingCheckpoint {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn evaluate(&self, _record: &ThrottleRecord, _now: DateTime<Utc>) -> CheckpointVerdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            CheckpointVerdict::Continue
        }
    }

    struct BlockedNetworkCheckpoint;

    impl Checkpoint for BlockedNetworkCheckpoint {
        fn name(&self) -> &'static str {
            "blocked_network"
        }

        fn evaluate(&self, record: &ThrottleRecord, _now: DateTime<Utc>) -> CheckpointVerdict {
            match record.principal {
                Principal::Ip(IpAddr::V4(address)) if address.octets()[0] == 198 => {
                    CheckpointVerdict::Decide(GuardDecision::Banned {
                        principal: record.principal,
                    })
                }
                _ => CheckpointVerdict::Continue,
            }
        }
    }

    #[test]
    fn standard_chain_order_is_ban_suspension_throttle() {
        let chain = CheckpointChain::standard(&GuardPolicy::default());
        assert_eq!(chain.names(), vec!["ban", "suspension", "throttle"]);
    }

    #[test]
    fn fresh_record_is_allowed() {
        let chain = CheckpointChain::default();
        assert_eq!(chain.evaluate(&user_record(), at(0)), GuardDecision::Allow);
    }

    #[test]
    fn single_failure_is_allowed() {
        let chain = CheckpointChain::default();
        let mut record = user_record();
        record.apply_failure(at(0));
        assert_eq!(record.attempt_count, 1);
        assert_eq!(chain.evaluate(&record, at(0)), GuardDecision::Allow);
    }

    #[test]
    fn banned_and_suspended_record_reports_banned() {
        let chain = CheckpointChain::default();
        let mut record = user_record();
        record.apply_suspend(at(0));
        record.apply_ban(at(1));

        assert_eq!(
            chain.evaluate(&record, at(2)),
            GuardDecision::Banned {
                principal: record.principal
            }
        );
    }

    #[test]
    fn ban_short_circuits_later_checkpoints() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = CheckpointChain::default().with(CountingCheckpoint {
            calls: calls.clone(),
        });
        let mut record = user_record();
        record.apply_ban(at(0));

        assert!(matches!(
            chain.evaluate(&record, at(1)),
            GuardDecision::Banned { .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        record.apply_unban();
        assert_eq!(chain.evaluate(&record, at(1)), GuardDecision::Allow);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn suspension_is_reported_before_throttling() {
        let chain = CheckpointChain::default();
        let mut record = user_record();
        for second in 0..6 {
            record.apply_failure(at(second));
        }
        record.apply_suspend(at(5));

        assert_eq!(
            chain.evaluate(&record, at(6)),
            GuardDecision::Suspended {
                principal: record.principal,
                until: Some(at(5) + Duration::hours(24)),
            }
        );
    }

    #[test]
    fn indefinite_suspension_has_no_end() {
        let policy = GuardPolicy {
            suspension: SuspensionPolicy::new(Some(5), None).unwrap_or_default(),
            ..GuardPolicy::default()
        };
        let chain = CheckpointChain::standard(&policy);
        let mut record = user_record();
        record.apply_suspend(at(0));

        assert_eq!(
            chain.evaluate(&record, at(365 * 24 * 3600)),
            GuardDecision::Suspended {
                principal: record.principal,
                until: None,
            }
        );
    }

    #[test]
    fn expired_suspension_continues_to_throttle() {
        let chain = CheckpointChain::default();
        let mut record = user_record();
        record.apply_suspend(at(0));

        assert_eq!(
            chain.evaluate(&record, at(24 * 3600 + 1)),
            GuardDecision::Allow
        );
    }

    #[test]
    fn throttle_reports_remaining_delay() {
        let chain = CheckpointChain::default();
        let mut record = user_record();
        for second in 0..5 {
            record.apply_failure(at(second));
        }

        // Five failures owe 4s after the last failure at t=4.
        assert_eq!(
            chain.evaluate(&record, at(5)),
            GuardDecision::Delay {
                principal: record.principal,
                retry_after: Duration::seconds(3),
            }
        );
        assert_eq!(chain.evaluate(&record, at(8)), GuardDecision::Allow);
    }

    #[test]
    fn custom_checkpoints_extend_the_chain() {
        let chain = CheckpointChain::standard(&GuardPolicy {
            backoff: BackoffPolicy::new(1, Duration::zero(), Duration::zero())
                .unwrap_or_default(),
            ..GuardPolicy::default()
        })
        .with(BlockedNetworkCheckpoint);
        let blocked = ThrottleRecord::new(Principal::Ip(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 4))));
        let open = ThrottleRecord::new(Principal::Ip(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 4))));

        assert!(matches!(
            chain.evaluate(&blocked, at(0)),
            GuardDecision::Banned { .. }
        ));
        assert_eq!(chain.evaluate(&open, at(0)), GuardDecision::Allow);
        assert_eq!(chain.names().last(), Some(&"blocked_network"));
    }

    #[test]
    fn empty_chain_allows_everything() {
        let chain = CheckpointChain::new();
        let mut record = user_record();
        record.apply_ban(at(0));
        assert_eq!(chain.evaluate(&record, at(0)), GuardDecision::Allow);
    }
}
