use std::net::{IpAddr, SocketAddr};

use axum::Json;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use uuid::Uuid;

use warden_application::{LoginAttempt, PrincipalStatus};
use warden_domain::{GuardDecision, Principal, UserId};

use crate::client_ip::resolve_client_ip;
use crate::dto::{
    AdminActionRequest, GuardCheckRequest, GuardOutcomeRequest, HealthResponse,
    PrincipalStatusResponse, RestrictedPrincipalsQuery,
};
use crate::error::ApiResult;
use crate::state::AppState;

mod admin;
mod guard;
mod health;


pub use admin::{
    ban_principal_handler, inspect_principal_handler, list_restricted_principals_handler,
    suspend_principal_handler, unban_principal_handler, unsuspend_principal_handler,
};
pub use guard::{check_handler, outcome_handler};
pub use health::health_handler;
