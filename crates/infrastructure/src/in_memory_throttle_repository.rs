use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use warden_application::ThrottleRepository;
use warden_core::AppResult;
use warden_domain::{Principal, ThrottleRecord};

/// In-memory throttle store.
///
/// Each principal lives in its own map entry; mutations hold only that
/// entry's shard lock, so attempts against different principals never
/// contend on a global lock.
#[derive(Debug, Default)]
pub struct InMemoryThrottleRepository {
    records: DashMap<Principal, ThrottleRecord>,
}

impl InMemoryThrottleRepository {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mutate(
        &self,
        principal: &Principal,
        apply: impl FnOnce(&mut ThrottleRecord),
    ) -> ThrottleRecord {
        let mut entry = self
            .records
            .entry(*principal)
            .or_insert_with(|| ThrottleRecord::new(*principal));
        apply(entry.value_mut());
        entry.value().clone()
    }

    fn mutate_existing(&self, principal: &Principal, apply: impl FnOnce(&mut ThrottleRecord)) {
        if let Some(mut entry) = self.records.get_mut(principal) {
            apply(entry.value_mut());
        }
    }
}

#[async_trait]
impl ThrottleRepository for InMemoryThrottleRepository {
    async fn get(&self, principal: &Principal) -> AppResult<ThrottleRecord> {
        Ok(self
            .records
            .get(principal)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| ThrottleRecord::new(*principal)))
    }

    async fn record_failure(&self, principal: &Principal) -> AppResult<ThrottleRecord> {
        let now = Utc::now();
        Ok(self.mutate(principal, |record| record.apply_failure(now)))
    }

    async fn record_success(&self, principal: &Principal) -> AppResult<()> {
        self.mutate_existing(principal, ThrottleRecord::apply_success);
        Ok(())
    }

    async fn suspend(&self, principal: &Principal) -> AppResult<()> {
        let now = Utc::now();
        self.mutate(principal, |record| record.apply_suspend(now));
        Ok(())
    }

    async fn unsuspend(&self, principal: &Principal) -> AppResult<()> {
        self.mutate_existing(principal, ThrottleRecord::apply_unsuspend);
        Ok(())
    }

    async fn ban(&self, principal: &Principal) -> AppResult<()> {
        let now = Utc::now();
        self.mutate(principal, |record| record.apply_ban(now));
        Ok(())
    }

    async fn unban(&self, principal: &Principal) -> AppResult<()> {
        self.mutate_existing(principal, ThrottleRecord::apply_unban);
        Ok(())
    }

    async fn list_restricted(&self, limit: usize) -> AppResult<Vec<ThrottleRecord>> {
        let mut records: Vec<ThrottleRecord> = self
            .records
            .iter()
            .filter(|entry| entry.value().is_restricted())
            .map(|entry| entry.value().clone())
            .collect();

        records.sort_by_key(|record| std::cmp::Reverse(record.banned_at.max(record.suspended_at)));
        records.truncate(limit);

        Ok(records)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    use warden_application::ThrottleRepository;
    use warden_domain::{Principal, UserId};

    use super::InMemoryThrottleRepository;

    #[tokio::test]
    async fn get_does_not_create_records() {
        let repository = InMemoryThrottleRepository::new();
        let principal = Principal::User(UserId::new());

        let record = repository.get(&principal).await;
        assert!(matches!(record, Ok(record) if record.attempt_count == 0));
        assert!(repository.records.is_empty());

        assert!(repository.record_success(&principal).await.is_ok());
        assert!(repository.unsuspend(&principal).await.is_ok());
        assert!(repository.records.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failures_are_not_lost() {
        let repository = Arc::new(InMemoryThrottleRepository::new());
        let principal = Principal::ip(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 77)));

        let mut handles = Vec::new();
        for _ in 0..64 {
            let repository = repository.clone();
            handles.push(tokio::spawn(async move {
                repository.record_failure(&principal).await
            }));
        }
        for handle in handles {
            assert!(matches!(handle.await, Ok(Ok(_))));
        }

        let record = repository.get(&principal).await;
        assert!(matches!(record, Ok(record) if record.attempt_count == 64));
    }

    #[tokio::test]
    async fn ban_is_listed_until_lifted() {
        let repository = InMemoryThrottleRepository::new();
        let principal = Principal::User(UserId::new());
        let other = Principal::User(UserId::new());

        assert!(repository.ban(&principal).await.is_ok());
        assert!(repository.record_failure(&other).await.is_ok());

        let listed = repository.list_restricted(10).await.unwrap_or_default();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].principal, principal);

        assert!(repository.unban(&principal).await.is_ok());
        let listed = repository.list_restricted(10).await.unwrap_or_default();
        assert!(listed.is_empty());
    }
}
