use async_trait::async_trait;

use warden_core::AppResult;
use warden_domain::{Principal, ThrottleRecord};

/// Repository port for per-principal throttle state.
///
/// Every mutation must be atomic for a single principal: two concurrent
/// failures against the same principal always yield two increments.
/// Implementations report an unreachable backend as
/// `AppError::StoreUnavailable` and never fall back to a permissive answer.
#[async_trait]
pub trait ThrottleRepository: Send + Sync {
    /// Returns the record for a principal, or a zero-valued record when none
    /// exists. Never writes.
    async fn get(&self, principal: &Principal) -> AppResult<ThrottleRecord>;

    /// Increments the failure counter and stamps the attempt time, creating
    /// the record on first use. Returns the updated record.
    async fn record_failure(&self, principal: &Principal) -> AppResult<ThrottleRecord>;

    /// Resets the failure counter. Leaves suspension and ban untouched.
    async fn record_success(&self, principal: &Principal) -> AppResult<()>;

    /// Marks the principal suspended. `suspended_at` only moves on the
    /// false→true transition.
    async fn suspend(&self, principal: &Principal) -> AppResult<()>;

    /// Lifts a suspension and clears `suspended_at`.
    async fn unsuspend(&self, principal: &Principal) -> AppResult<()>;

    /// Marks the principal banned. `banned_at` only moves on the
    /// false→true transition.
    async fn ban(&self, principal: &Principal) -> AppResult<()>;

    /// Lifts a ban and clears `banned_at`.
    async fn unban(&self, principal: &Principal) -> AppResult<()>;

    /// Lists records that are currently suspended or banned, most recently
    /// changed first.
    async fn list_restricted(&self, limit: usize) -> AppResult<Vec<ThrottleRecord>>;

    /// Verifies the backend is reachable.
    async fn ping(&self) -> AppResult<()>;
}
