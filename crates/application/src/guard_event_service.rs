use std::sync::Arc;

use async_trait::async_trait;

use warden_core::AppResult;
use warden_domain::Principal;

/// Guard event payload for security auditing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardEvent {
    /// Principal the event concerns, formatted as `kind:key`.
    pub principal: String,
    /// Stable event type identifier.
    pub event_type: String,
    /// Event outcome label.
    pub outcome: String,
    /// Administrator responsible for the event, if any.
    pub actor: Option<String>,
}

impl GuardEvent {
    /// Builds an event for a principal.
    #[must_use]
    pub fn new(
        principal: &Principal,
        event_type: impl Into<String>,
        outcome: impl Into<String>,
        actor: Option<&str>,
    ) -> Self {
        Self {
            principal: principal.to_string(),
            event_type: event_type.into(),
            outcome: outcome.into(),
            actor: actor.map(ToOwned::to_owned),
        }
    }
}

/// Repository port for guard event persistence.
#[async_trait]
pub trait GuardEventRepository: Send + Sync {
    /// Appends a guard event entry.
    async fn append_event(&self, event: GuardEvent) -> AppResult<()>;
}

/// Application service for guard event recording.
#[derive(Clone)]
pub struct GuardEventService {
    repository: Arc<dyn GuardEventRepository>,
}

impl GuardEventService {
    /// Creates a service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn GuardEventRepository>) -> Self {
        Self { repository }
    }

    /// Persists a guard event.
    pub async fn record_event(&self, event: GuardEvent) -> AppResult<()> {
        self.repository.append_event(event).await
    }
}
