//! Store port for tasks and their lifecycle logs.

use crate::lifecycle::domain::{
    CompactionSummary, LogEntry, ScopeKey, SequenceNumber, Task, TaskId,
};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for lifecycle store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Scope head a writer observed before appending.
///
/// `head` is the sequence number of the scope's last entry, or `None` when
/// the scope has no entries yet (a fresh task or a new branch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeHead {
    /// Scope the append targets.
    pub scope: ScopeKey,
    /// Head observed by the writer.
    pub head: Option<SequenceNumber>,
}

impl ScopeHead {
    /// Creates a scope head.
    #[must_use]
    pub const fn new(scope: ScopeKey, head: Option<SequenceNumber>) -> Self {
        Self { scope, head }
    }

    /// Reads the current head of `scope` from `task`.
    #[must_use]
    pub fn observe(task: &Task, scope: ScopeKey) -> Self {
        Self::new(scope, task.scope_head(scope))
    }
}

impl fmt::Display for ScopeHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.head {
            Some(head) => write!(f, "{}@{head}", self.scope),
            None => write!(f, "{}@empty", self.scope),
        }
    }
}

/// Task and log persistence contract.
///
/// Appends are all-or-nothing: the entry is stored and the task state
/// updated together, or neither happens.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    /// Stores a new task together with its log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateTask`] when the task id already exists.
    async fn create(&self, task: &Task) -> StoreResult<()>;

    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_by_id(&self, id: TaskId) -> StoreResult<Option<Task>>;

    /// Appends `entry` when the head of `expected.scope` still equals
    /// `expected.head`, assigning the next sequence number of the task.
    ///
    /// Returns the updated task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StaleHead`] when another writer advanced the
    /// scope, or [`StoreError::NotFound`] for an unknown task.
    async fn append(&self, id: TaskId, expected: ScopeHead, entry: LogEntry) -> StoreResult<Task>;

    /// Replaces the entries in `archived` with `summary` when the main head
    /// still equals `expected` and every archived entry is still present.
    ///
    /// Returns the updated task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StaleHead`] or [`StoreError::SpanMismatch`] when
    /// the log changed underneath the caller.
    async fn replace_span(
        &self,
        id: TaskId,
        expected: ScopeHead,
        archived: &BTreeSet<SequenceNumber>,
        summary: CompactionSummary,
    ) -> StoreResult<Task>;
}

/// Errors returned by lifecycle store implementations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Another writer advanced the scope since it was observed.
    #[error("task {task}: expected head {expected}, found {actual}")]
    StaleHead {
        /// Task being written.
        task: TaskId,
        /// Head the writer observed.
        expected: ScopeHead,
        /// Head actually stored.
        actual: ScopeHead,
    },

    /// Entries scheduled for archival are no longer in the log.
    #[error("task {0}: archived span no longer matches the log")]
    SpanMismatch(TaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
