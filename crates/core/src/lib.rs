//! Shared primitives for all Rust crates in Warden.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Result type used across Warden crates.
pub type AppResult<T> = Result<T, AppError>;

/// Common application error categories.
///
/// Ban, suspension and throttling are never represented here; they are
/// decisions, not failures.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller is not allowed to perform an administrative action.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backing throttle store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether the error is an infrastructure outage of the throttle store.
    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn store_unavailable_is_detected() {
        let error = AppError::StoreUnavailable("connection refused".to_owned());
        assert!(error.is_store_unavailable());
        assert!(!AppError::Internal("boom".to_owned()).is_store_unavailable());
    }

    #[test]
    fn errors_render_with_category_prefix() {
        let error = AppError::StoreUnavailable("pool timed out".to_owned());
        assert_eq!(error.to_string(), "store unavailable: pool timed out");
    }
}
