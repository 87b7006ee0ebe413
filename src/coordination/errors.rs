//! Coordination error types
//!
//! Unmet preconditions are never errors here: they become deferrals.
//! These errors cover the guards the engine consults internally
//! (lifecycle transitions, identity parsing). The engine turns a failed
//! transition guard into a rejected outcome; it never propagates it.

use std::fmt;

/// Coordination error type
#[derive(Debug, Clone)]
pub struct CoordinationError {
    /// Error kind
    pub kind: CoordinationErrorKind,
    /// Error message
    pub message: String,
}

/// Coordination error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinationErrorKind {
    /// Lifecycle event arrived out of order for its relation instance
    ForbiddenTransition,

    /// Event names a relation instance that was never created
    UnknownRelation,

    /// Relation or node identity could not be parsed
    InvalidIdentity,
}

impl CoordinationError {
    /// Create a new coordination error.
    pub fn new(kind: CoordinationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a forbidden transition error.
    pub fn forbidden_transition(from: &str, to: &str) -> Self {
        Self::new(
            CoordinationErrorKind::ForbiddenTransition,
            format!("forbidden transition: {} → {}", from, to),
        )
    }

    /// Create an unknown relation error.
    pub fn unknown_relation(relation: impl fmt::Display) -> Self {
        Self::new(
            CoordinationErrorKind::UnknownRelation,
            format!("relation {} was never created", relation),
        )
    }

    /// Create an invalid identity error.
    pub fn invalid_identity(message: impl Into<String>) -> Self {
        Self::new(CoordinationErrorKind::InvalidIdentity, message)
    }
}

impl fmt::Display for CoordinationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoordinationError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for CoordinationError {}

/// Result type for coordination guards
pub type CoordinationResult<T> = Result<T, CoordinationError>;
