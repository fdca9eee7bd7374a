//! Domain entities and invariants of the access guard.

#![forbid(unsafe_code)]

mod checkpoint;
mod decision;
mod policy;
mod principal;
mod throttle;

pub use checkpoint::{
    BanCheckpoint, Checkpoint, CheckpointChain, CheckpointVerdict, SuspensionCheckpoint,
    ThrottleCheckpoint,
};
pub use decision::GuardDecision;
pub use policy::{BackoffPolicy, GuardPolicy, SuspensionPolicy};
pub use principal::{Principal, PrincipalKind, UserId};
pub use throttle::{AccessState, ThrottleRecord};
