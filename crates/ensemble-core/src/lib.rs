//! Core types and error definitions for the Ensemble coordinator.
//!
//! This crate provides the foundational types shared across all Ensemble crates:
//! the unified error enum and the message a participant emits while a task is
//! being distributed.
//!
//! # Main types
//!
//! - [`EnsembleError`] — Unified error enum for all Ensemble subsystems.
//! - [`EnsembleResult`] — Convenience alias for `Result<T, EnsembleError>`.
//! - [`AgentMessage`] — An intermediate message produced by a participant.

/// Intermediate participant messages.
pub mod message;

pub use message::AgentMessage;

// --- Error types ---

/// Top-level error type for the Ensemble workspace.
///
/// Only [`EnsembleError::Config`] is meant to terminate the process; every
/// other variant is converted to data before it reaches an interactive caller.
#[derive(Debug, thiserror::Error)]
pub enum EnsembleError {
    /// Required settings are absent or malformed at startup.
    #[error("Config error: {0}")]
    Config(String),

    /// A participant with the same identity is already registered.
    #[error("Duplicate participant: {0}")]
    DuplicateParticipant(String),

    /// Attempted removal of a shared, pre-existing participant.
    #[error("Participant '{0}' is protected and cannot be removed")]
    ProtectedParticipant(String),

    /// No participant is registered under the given identity.
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    /// A timed operation exceeded its deadline.
    #[error("Timed out after {seconds}s: {label}")]
    Timeout {
        /// Human-readable label of the operation that timed out.
        label: String,
        /// The deadline that was exceeded, in seconds.
        seconds: u64,
    },

    /// The operation observed a cancellation request and stopped.
    #[error("Operation cancelled")]
    Cancelled,

    /// Unexpected fault inside the task coordinator.
    #[error("Coordinator error: {0}")]
    Coordinator(String),

    /// A provider-side failure outside the structured fault channel, such as
    /// a participant that could not be deregistered from its hosting service.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The distribution engine failed to dispatch or converge.
    #[error("Engine error: {0}")]
    Engine(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnsembleError {
    /// Whether this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, EnsembleError::Timeout { .. })
    }
}

/// A convenience `Result` alias using [`EnsembleError`].
pub type EnsembleResult<T> = Result<T, EnsembleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = EnsembleError::Timeout {
            label: "dispatch".to_string(),
            seconds: 60,
        };
        assert_eq!(err.to_string(), "Timed out after 60s: dispatch");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_protected_display() {
        let err = EnsembleError::ProtectedParticipant("SearchAgent".to_string());
        assert_eq!(
            err.to_string(),
            "Participant 'SearchAgent' is protected and cannot be removed"
        );
        assert!(!err.is_timeout());
    }
}
