//! Application services and ports.

#![forbid(unsafe_code)]

mod access_guard_service;
mod guard_event_service;
mod throttle_ports;

pub use access_guard_service::{
    AccessGuardService, CredentialOutcome, LoginAttempt, MAX_RESTRICTED_PAGE, PrincipalStatus,
};
pub use guard_event_service::{GuardEvent, GuardEventRepository, GuardEventService};
pub use throttle_ports::ThrottleRepository;
