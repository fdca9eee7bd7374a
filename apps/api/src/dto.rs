use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_application::{CredentialOutcome, PrincipalStatus};
use warden_domain::{AccessState, Principal};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Incoming payload asking whether a login attempt may proceed.
#[derive(Debug, Default, Deserialize)]
pub struct GuardCheckRequest {
    pub user_id: Option<Uuid>,
}

/// Credential verification result reported by the login flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialOutcomeRequest {
    Verified,
    Rejected,
}

impl From<CredentialOutcomeRequest> for CredentialOutcome {
    fn from(value: CredentialOutcomeRequest) -> Self {
        match value {
            CredentialOutcomeRequest::Verified => Self::Verified,
            CredentialOutcomeRequest::Rejected => Self::Rejected,
        }
    }
}

/// Incoming payload reporting a credential verification outcome.
#[derive(Debug, Deserialize)]
pub struct GuardOutcomeRequest {
    pub user_id: Option<Uuid>,
    pub outcome: CredentialOutcomeRequest,
}

/// Incoming payload for administrative principal actions.
#[derive(Debug, Deserialize)]
pub struct AdminActionRequest {
    pub actor: String,
}

/// Query parameters for the restricted principal listing.
#[derive(Debug, Default, Deserialize)]
pub struct RestrictedPrincipalsQuery {
    pub limit: Option<usize>,
}

/// API representation of a principal's throttle record.
#[derive(Debug, Serialize)]
pub struct PrincipalStatusResponse {
    pub principal: Principal,
    pub state: AccessState,
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub suspended: bool,
    pub suspended_at: Option<DateTime<Utc>>,
    pub banned: bool,
    pub banned_at: Option<DateTime<Utc>>,
}

impl From<PrincipalStatus> for PrincipalStatusResponse {
    fn from(value: PrincipalStatus) -> Self {
        let record = value.record;
        Self {
            principal: record.principal,
            state: value.state,
            attempt_count: record.attempt_count,
            last_attempt_at: record.last_attempt_at,
            suspended: record.suspended,
            suspended_at: record.suspended_at,
            banned: record.banned,
            banned_at: record.banned_at,
        }
    }
}
