//! Guard event sink that writes events to tracing output.

use async_trait::async_trait;
use tracing::info;
use warden_application::{GuardEvent, GuardEventRepository};
use warden_core::AppResult;

/// Event sink for deployments without a relational audit table.
#[derive(Clone)]
pub struct TracingGuardEventRepository;

impl TracingGuardEventRepository {
    /// Creates a new tracing event sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingGuardEventRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GuardEventRepository for TracingGuardEventRepository {
    async fn append_event(&self, event: GuardEvent) -> AppResult<()> {
        info!(
            target: "warden::audit",
            principal = event.principal.as_str(),
            event_type = event.event_type.as_str(),
            outcome = event.outcome.as_str(),
            actor = event.actor.as_deref().unwrap_or("-"),
            "guard event"
        );

        Ok(())
    }
}
