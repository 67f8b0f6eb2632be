//! Error types for lifecycle domain validation and parsing.

use super::{BranchId, SequenceNumber};
use crate::registry::domain::StateName;
use thiserror::Error;

/// Errors returned while constructing lifecycle domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleDomainError {
    /// A required token is empty after trimming.
    #[error("{kind} must not be empty")]
    Empty {
        /// Which value was empty.
        kind: &'static str,
    },

    /// A token contains whitespace or control characters.
    #[error("{kind} '{value}' must not contain whitespace")]
    ContainsWhitespace {
        /// Which value was rejected.
        kind: &'static str,
        /// The rejected raw value.
        value: String,
    },
}

/// Error returned while parsing a transition mode.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown transition mode: {0}")]
pub struct ParseModeError(pub String);

/// Violations of the connected-walk property of a lifecycle log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalkError {
    /// An entry does not start where the previous entry of its scope ended.
    #[error("entry {sequence} starts at {found}, expected {expected}")]
    Disconnected {
        /// Offending entry.
        sequence: SequenceNumber,
        /// State the scope was in.
        expected: StateName,
        /// State the entry claims to start from.
        found: StateName,
    },

    /// An entry moves between states that the template does not order
    /// forwards.
    #[error("entry {sequence} leaves the template with {from} -> {to}")]
    OutOfTemplate {
        /// Offending entry.
        sequence: SequenceNumber,
        /// Claimed from-state.
        from: StateName,
        /// Claimed to-state.
        to: StateName,
    },

    /// A merge names a branch whose records do not end where the merge
    /// claims.
    #[error("merge {sequence} of branch {branch} does not match the branch state")]
    MergeMismatch {
        /// Offending merge entry.
        sequence: SequenceNumber,
        /// Merged branch.
        branch: BranchId,
    },

    /// The recorded task state differs from where the log's main walk ends.
    #[error("task state {recorded} does not match the log, which ends at {derived}")]
    StateMismatch {
        /// State stored on the task.
        recorded: StateName,
        /// State the main walk ends in.
        derived: StateName,
    },
}
