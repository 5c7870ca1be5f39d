//! Typed error hierarchy for the review arena.
//!
//! `ArenaError` is what every public arena operation returns. Its variants
//! tell the caller which of three things happened:
//! - fix your input (`Validation`)
//! - try again (`Persistence`)
//! - this session will not accept the request (`Conflict`, `ExecutionFailure`)
//!
//! Store and executor internals use `anyhow` with context; the service
//! boundary converts into these variants.

use thiserror::Error;

use crate::arena::models::SessionState;

/// Stable, serializable label for an [`ArenaError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    ExecutionFailure,
    Persistence,
    NotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::ExecutionFailure => "execution_failure",
            Self::Persistence => "persistence",
            Self::NotFound => "not_found",
        }
    }
}

/// Errors from arena session, vote and ranking operations.
#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("Invalid schema configuration: {0}")]
    Validation(String),

    #[error("Session {session_id} is {state}: {message}")]
    Conflict {
        session_id: i64,
        state: SessionState,
        message: String,
    },

    #[error("Review execution failed for session {session_id}: {reason}")]
    ExecutionFailure { session_id: i64, reason: String },

    #[error("Persistence error: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("Session {id} not found")]
    SessionNotFound { id: i64 },

    #[error("No session owns review job {handle}")]
    UnknownJob { handle: String },
}

impl ArenaError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(session_id: i64, state: SessionState, message: impl Into<String>) -> Self {
        Self::Conflict {
            session_id,
            state,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::ExecutionFailure { .. } => ErrorKind::ExecutionFailure,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::SessionNotFound { .. } | Self::UnknownJob { .. } => ErrorKind::NotFound,
        }
    }

    /// Whether repeating the same request may succeed.
    ///
    /// Only persistence failures qualify: a retried vote that already
    /// committed comes back as `Conflict`, never as a second application.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

impl From<anyhow::Error> for ArenaError {
    fn from(err: anyhow::Error) -> Self {
        Self::Persistence(err)
    }
}
