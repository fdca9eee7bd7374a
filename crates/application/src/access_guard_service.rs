//! Access guard application service.
//!
//! Runs the checkpoint chain before credential verification and keeps the
//! throttle store in step with verification outcomes. Credentials are never
//! compared here; the caller reports whether they matched.

mod admin;
mod attempt;


use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use warden_core::{AppError, AppResult};
use warden_domain::{
    AccessState, CheckpointChain, GuardDecision, GuardPolicy, Principal, ThrottleRecord, UserId,
};

use crate::{GuardEvent, GuardEventService, ThrottleRepository};

/// Largest page accepted by [`AccessGuardService::list_restricted`].
pub const MAX_RESTRICTED_PAGE: usize = 500;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Identities involved in one login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoginAttempt {
    /// Account the attempt targets, when the caller could resolve it.
    pub user_id: Option<UserId>,
    /// Client address the attempt came from.
    pub ip_address: Option<IpAddr>,
}

impl LoginAttempt {
    /// Creates an attempt from its resolved identities.
    #[must_use]
    pub fn new(user_id: Option<UserId>, ip_address: Option<IpAddr>) -> Self {
        Self {
            user_id,
            ip_address,
        }
    }

    /// Returns the principals tracked for this attempt, user first.
    pub fn principals(&self) -> AppResult<Vec<Principal>> {
        let principals: Vec<Principal> = self
            .user_id
            .map(Principal::User)
            .into_iter()
            .chain(self.ip_address.map(Principal::ip))
            .collect();

        if principals.is_empty() {
            return Err(AppError::Validation(
                "login attempt must identify a user or a client address".to_owned(),
            ));
        }

        Ok(principals)
    }
}

/// Result of credential verification as reported by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOutcome {
    /// Credentials matched.
    Verified,
    /// Credentials did not match.
    Rejected,
}

/// Snapshot of a principal for administrators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalStatus {
    /// Stored record (zero-valued when the principal has no history).
    pub record: ThrottleRecord,
    /// Classification of the record at read time.
    pub state: AccessState,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Application service guarding login attempts.
#[derive(Clone)]
pub struct AccessGuardService {
    repository: Arc<dyn ThrottleRepository>,
    chain: Arc<CheckpointChain>,
    policy: GuardPolicy,
    event_service: GuardEventService,
}

impl AccessGuardService {
    /// Creates a service running the standard ban → suspension → throttle chain.
    #[must_use]
    pub fn new(
        repository: Arc<dyn ThrottleRepository>,
        policy: GuardPolicy,
        event_service: GuardEventService,
    ) -> Self {
        Self::with_chain(
            repository,
            Arc::new(CheckpointChain::standard(&policy)),
            policy,
            event_service,
        )
    }

    /// Creates a service with a caller-assembled chain.
    #[must_use]
    pub fn with_chain(
        repository: Arc<dyn ThrottleRepository>,
        chain: Arc<CheckpointChain>,
        policy: GuardPolicy,
        event_service: GuardEventService,
    ) -> Self {
        Self {
            repository,
            chain,
            policy,
            event_service,
        }
    }

    /// Returns the active policy.
    #[must_use]
    pub fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    /// Verifies the throttle store is reachable.
    pub async fn store_health(&self) -> AppResult<()> {
        self.repository.ping().await
    }

    /// Lifts a time-bounded suspension that has run out at `now`.
    ///
    /// The principal returns to Clear, so the failure count is reset with
    /// it. Returns whether anything was lifted.
    async fn lift_expired_suspension(
        &self,
        record: &mut ThrottleRecord,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        if !record.suspension_expired(now, self.policy.suspension.duration()) {
            return Ok(false);
        }

        let principal = record.principal;
        self.repository.unsuspend(&principal).await?;
        self.repository.record_success(&principal).await?;
        record.apply_unsuspend();
        record.apply_success();

        info!(principal = %principal, "time-bounded suspension expired");
        self.event_service
            .record_event(GuardEvent::new(
                &principal,
                "suspension_expired",
                "lifted",
                None,
            ))
            .await?;

        Ok(true)
    }
}
