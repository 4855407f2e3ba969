//! Unified error handling for editing sessions.

use tally_engine::{CommitError, TransportError, ValidationErrorSet};

/// Session error type.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("validation failed for {} item(s)", .0.len())]
    Invalid(ValidationErrorSet),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error("delete failed: {0}")]
    Delete(TransportError),

    #[error("Engine error: {0}")]
    Engine(#[from] tally_engine::Error),

    #[error("session is closed")]
    Closed,

    #[error("a remote call is still in flight")]
    Busy,
}

impl SessionError {
    /// Field errors, when the session was blocked by validation.
    pub fn validation_errors(&self) -> Option<&ValidationErrorSet> {
        match self {
            SessionError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
