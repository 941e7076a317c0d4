//! Crate-level error types for command dispatch and handler execution.

use serde::{Deserialize, Serialize};

/// Classification of a command failure, carried both in the
/// `CommandFailed` event and in the rejected dispatch future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The backend collaborator refused or could not complete a call.
    Backend,
    /// The command's payload is inconsistent with current state.
    Validation,
    /// The command was cancelled (session teardown or exclusive-class
    /// supersession) before it reached a terminal event.
    Cancelled,
    /// A handler panicked or hit an unexpected internal condition.
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            FailureKind::Backend => "backend",
            FailureKind::Validation => "validation",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal",
        };
        f.write_str(kind)
    }
}

/// Error resolved into a dispatch future when a command does not reach its
/// success event.
///
/// Exactly one of success event or `DispatchError` settles each dispatch;
/// the session's correlation table enforces the at-most-once guarantee.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// The command never started: its payload failed synchronous
    /// validation, or the command is declared but unsupported.
    #[error("command rejected: {reason}")]
    Rejected { reason: String },

    /// The command started but its handler failed.
    #[error("command failed ({kind}): {message}")]
    Failed { kind: FailureKind, message: String },

    /// The command was cancelled before completion.
    #[error("command cancelled")]
    Cancelled,

    /// The session was torn down; no further commands are accepted.
    #[error("dashboard session is closed")]
    SessionClosed,
}

/// Error produced inside a command handler, classified by the dispatcher
/// into a `CommandFailed` event.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A backend call failed.
    #[error(transparent)]
    Backend(#[from] crate::backend::BackendError),

    /// The command is inconsistent with current state (bad index, unknown
    /// widget, missing stash, permission denied).
    #[error("{0}")]
    Validation(String),

    /// The handler observed a cancellation signal at a checkpoint.
    #[error("cancelled")]
    Cancelled,

    /// A nested dispatch failed; the outer command fails with the nested
    /// command's classification.
    #[error("nested command failed: {0}")]
    Nested(#[source] Box<DispatchError>),

    /// Unexpected internal condition.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Shorthand for state-inconsistency failures.
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        HandlerError::Validation(message.into())
    }

    /// The failure classification carried into the `CommandFailed` event.
    pub(crate) fn kind(&self) -> FailureKind {
        match self {
            HandlerError::Backend(_) => FailureKind::Backend,
            HandlerError::Validation(_) => FailureKind::Validation,
            HandlerError::Cancelled => FailureKind::Cancelled,
            HandlerError::Nested(inner) => match inner.as_ref() {
                DispatchError::Rejected { .. } => FailureKind::Validation,
                DispatchError::Failed { kind, .. } => *kind,
                DispatchError::Cancelled | DispatchError::SessionClosed => FailureKind::Cancelled,
            },
            HandlerError::Internal(_) => FailureKind::Internal,
        }
    }
}

impl From<DispatchError> for HandlerError {
    fn from(err: DispatchError) -> Self {
        HandlerError::Nested(Box::new(err))
    }
}

/// Reason a command was rejected before any handler ran.
///
/// Rejection is synchronous: no `CommandStarted` event, no state mutation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RejectionReason {
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("index {index} is not a valid relative index")]
    MalformedIndex { index: i32 },

    #[error("attribute filter cannot be its own parent")]
    SelfParent,

    #[error("command is not supported by this engine: {name}")]
    Unsupported { name: &'static str },
}
