//! Typed error hierarchy for the dashboard.
//!
//! `DashboardError` carries the domain failures the HTTP layer needs to tell
//! apart (missing records, permission problems, bad lifecycle moves). The
//! storage layer returns `anyhow::Result`, so these values usually travel
//! wrapped in `anyhow::Error` and are recovered with `downcast_ref` at the
//! API boundary.

use thiserror::Error;

/// Domain errors raised by the store and the request handlers.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("Cannot move {kind} {id} from {from} to {to}")]
    InvalidTransition {
        kind: &'static str,
        id: i64,
        from: String,
        to: String,
    },

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DashboardError {
    pub fn not_found(kind: &'static str, id: i64) -> Self {
        Self::NotFound { kind, id }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}
