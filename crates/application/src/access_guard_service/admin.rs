use super::*;

impl AccessGuardService {
    /// Suspends a principal on behalf of an administrator.
    ///
    /// A stored suspension that already ran out is lifted first so the new
    /// one starts now.
    pub async fn suspend(&self, principal: &Principal, actor: &str) -> AppResult<ThrottleRecord> {
        require_actor(actor)?;
        let mut record = self.repository.get(principal).await?;
        self.lift_expired_suspension(&mut record, Utc::now()).await?;
        self.repository.suspend(principal).await?;
        self.audit_admin_action(principal, "admin_suspend", actor).await?;
        self.repository.get(principal).await
    }

    /// Lifts a suspension on behalf of an administrator and resets the
    /// failure count.
    pub async fn unsuspend(&self, principal: &Principal, actor: &str) -> AppResult<ThrottleRecord> {
        require_actor(actor)?;
        self.repository.unsuspend(principal).await?;
        self.repository.record_success(principal).await?;
        self.audit_admin_action(principal, "admin_unsuspend", actor).await?;
        self.repository.get(principal).await
    }

    /// Bans a principal. Only [`Self::unban`] lifts a ban.
    pub async fn ban(&self, principal: &Principal, actor: &str) -> AppResult<ThrottleRecord> {
        require_actor(actor)?;
        self.repository.ban(principal).await?;
        self.audit_admin_action(principal, "admin_ban", actor).await?;
        self.repository.get(principal).await
    }

    /// Lifts a ban on behalf of an administrator.
    pub async fn unban(&self, principal: &Principal, actor: &str) -> AppResult<ThrottleRecord> {
        require_actor(actor)?;
        self.repository.unban(principal).await?;
        self.audit_admin_action(principal, "admin_unban", actor).await?;
        self.repository.get(principal).await
    }

    /// Returns the stored record and its current state.
    pub async fn inspect(&self, principal: &Principal) -> AppResult<PrincipalStatus> {
        let record = self.repository.get(principal).await?;
        let state = record.access_state(Utc::now(), &self.policy);

        Ok(PrincipalStatus { record, state })
    }

    /// Lists suspended or banned principals.
    pub async fn list_restricted(&self, limit: usize) -> AppResult<Vec<PrincipalStatus>> {
        if limit == 0 || limit > MAX_RESTRICTED_PAGE {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_RESTRICTED_PAGE}"
            )));
        }

        let now = Utc::now();
        let records = self.repository.list_restricted(limit).await?;

        Ok(records
            .into_iter()
            .map(|record| {
                let state = record.access_state(now, &self.policy);
                PrincipalStatus { record, state }
            })
            .collect())
    }

    async fn audit_admin_action(
        &self,
        principal: &Principal,
        event_type: &str,
        actor: &str,
    ) -> AppResult<()> {
        info!(
            principal = %principal,
            actor = actor,
            event_type = event_type,
            "administrative guard action"
        );
        self.event_service
            .record_event(GuardEvent::new(principal, event_type, "applied", Some(actor)))
            .await
    }
}

fn require_actor(actor: &str) -> AppResult<()> {
    if actor.trim().is_empty() {
        return Err(AppError::Validation(
            "administrative actions must name an actor".to_owned(),
        ));
    }

    Ok(())
}
