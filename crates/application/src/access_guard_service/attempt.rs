use super::*;

impl AccessGuardService {
    /// Evaluates the checkpoint chain for every principal of the attempt.
    ///
    /// Returns the most severe decision across principals (ban, then
    /// suspension, then delay). The only write is lifting a time-bounded
    /// suspension that has run out. Blocked attempts are logged, not
    /// audited. Store outages propagate as `AppError::StoreUnavailable`;
    /// see [`Self::check_fail_closed`].
    pub async fn check(&self, attempt: &LoginAttempt) -> AppResult<GuardDecision> {
        let now = Utc::now();
        let mut decision = GuardDecision::Allow;

        for principal in attempt.principals()? {
            let mut record = self.repository.get(&principal).await?;
            if !record.banned {
                self.lift_expired_suspension(&mut record, now).await?;
            }

            let candidate = self.chain.evaluate(&record, now);
            if candidate.severity() > decision.severity() {
                decision = candidate;
            }

            if matches!(decision, GuardDecision::Banned { .. }) {
                break;
            }
        }

        if let Some(principal) = decision.principal() {
            debug!(
                principal = %principal,
                decision = decision.label(),
                "login attempt blocked"
            );
        }

        Ok(decision)
    }

    /// Like [`Self::check`], but an unreachable store yields a short
    /// `Delay` instead of an error. Never answers `Allow` without the store.
    pub async fn check_fail_closed(&self, attempt: &LoginAttempt) -> AppResult<GuardDecision> {
        let principals = attempt.principals()?;

        match self.check(attempt).await {
            Err(error) if error.is_store_unavailable() => {
                let Some(&principal) = principals.first() else {
                    return Err(error);
                };
                warn!(
                    principal = %principal,
                    error = %error,
                    "throttle store unavailable, failing closed"
                );
                Ok(GuardDecision::Delay {
                    principal,
                    retry_after: self.policy.store_failure_retry,
                })
            }
            result => result,
        }
    }

    /// Counts a rejected credential against every principal of the attempt.
    ///
    /// Suspends a principal automatically once its failure count reaches
    /// the configured threshold. A suspension that already ran out is
    /// lifted first, so this failure counts from a clean slate. Returns the
    /// updated records.
    pub async fn record_failure(&self, attempt: &LoginAttempt) -> AppResult<Vec<ThrottleRecord>> {
        let principals = attempt.principals()?;
        let mut records = Vec::with_capacity(principals.len());

        for principal in principals {
            let mut record = self.repository.record_failure(&principal).await?;
            if !record.banned && self.lift_expired_suspension(&mut record, Utc::now()).await? {
                record = self.repository.record_failure(&principal).await?;
            }
            self.event_service
                .record_event(GuardEvent::new(&principal, "login_attempt", "failure", None))
                .await?;

            if !record.is_restricted() && self.policy.suspension.is_crossed_by(record.attempt_count)
            {
                self.repository.suspend(&principal).await?;
                record = self.repository.get(&principal).await?;

                info!(
                    principal = %principal,
                    attempt_count = record.attempt_count,
                    "principal suspended after repeated failures"
                );
                self.event_service
                    .record_event(GuardEvent::new(
                        &principal,
                        "auto_suspend",
                        "applied",
                        None,
                    ))
                    .await?;
            }

            records.push(record);
        }

        Ok(records)
    }

    /// Resets the failure counters of every principal of the attempt.
    pub async fn record_success(&self, attempt: &LoginAttempt) -> AppResult<()> {
        for principal in attempt.principals()? {
            self.repository.record_success(&principal).await?;
            self.event_service
                .record_event(GuardEvent::new(&principal, "login_attempt", "success", None))
                .await?;
        }

        Ok(())
    }

    /// Records the caller's credential verification outcome.
    pub async fn record_outcome(
        &self,
        attempt: &LoginAttempt,
        outcome: CredentialOutcome,
    ) -> AppResult<()> {
        match outcome {
            CredentialOutcome::Verified => self.record_success(attempt).await,
            CredentialOutcome::Rejected => self.record_failure(attempt).await.map(|_| ()),
        }
    }
}
