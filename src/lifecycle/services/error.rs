//! Service-level error taxonomy.

use crate::lifecycle::domain::{LifecycleDomainError, ScopeKey, TaskId, WalkError};
use crate::lifecycle::format::FormatError;
use crate::lifecycle::ports::{ArchiveError, ScopeHead, StoreError};
use crate::lifecycle::sequencer::SequencingError;
use crate::registry::domain::{AuthorizationError, GateId, RegistryError};
use thiserror::Error;

/// A concurrent mutation of the same task lost the race.
///
/// Retrying is the caller's responsibility.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConflictError {
    /// Another mutation holds the scope's write section.
    #[error("task {task}: {scope} write section is busy")]
    Busy {
        /// Contended task.
        task: TaskId,
        /// Contended scope.
        scope: ScopeKey,
    },

    /// Another writer advanced the scope after the caller observed it.
    #[error("task {task}: expected head {expected}, found {actual}")]
    StaleHead {
        /// Contended task.
        task: TaskId,
        /// Head the caller observed.
        expected: ScopeHead,
        /// Head actually stored.
        actual: ScopeHead,
    },
}

/// Compaction aborted; the original log is intact.
#[derive(Debug, Clone, Error)]
pub enum CompactionError {
    /// The archive segment could not be sealed or written.
    #[error("compaction aborted, archive write failed: {0}")]
    ArchiveWrite(ArchiveError),

    /// The log swap failed after the archive was written.
    #[error("compaction aborted, log swap failed: {0}")]
    Swap(StoreError),
}

/// Errors returned by lifecycle services.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The persona lacks the capability for the gate.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// The gate violates the template order.
    #[error(transparent)]
    Sequencing(#[from] SequencingError),

    /// A concurrent mutation won the race.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Compaction failed and was rolled back.
    #[error(transparent)]
    Compaction(#[from] CompactionError),

    /// The validator rejected the record outright.
    #[error("transition for gate {gate} rejected: {reason}")]
    Rejected {
        /// Requested gate.
        gate: GateId,
        /// Violated rule.
        reason: String,
    },

    /// The task does not exist.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Registry lookup or configuration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A domain value was invalid.
    #[error(transparent)]
    Domain(#[from] LifecycleDomainError),

    /// An imported log does not form a valid walk.
    #[error(transparent)]
    Walk(#[from] WalkError),

    /// The text representation could not be parsed.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Reading an archive segment back failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The unblock-step template failed to render.
    #[error("unblock template failed: {0}")]
    UnblockTemplate(#[from] minijinja::Error),

    /// A snapshot could not be serialised.
    #[error("snapshot serialisation failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The store failed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(task) => Self::TaskNotFound(task),
            StoreError::StaleHead {
                task,
                expected,
                actual,
            } => Self::Conflict(ConflictError::StaleHead {
                task,
                expected,
                actual,
            }),
            other => Self::Store(other),
        }
    }
}

/// Result type for lifecycle service operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
