//! In-memory lifecycle store.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use crate::lifecycle::{
    domain::{CompactionSummary, LogEntry, SequenceNumber, Task, TaskId},
    ports::{LifecycleStore, ScopeHead, StoreError, StoreResult},
};

/// Thread-safe in-memory lifecycle store.
///
/// Readers clone whole tasks, so they observe either the state before or
/// after a write, never a partial entry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLifecycleStore {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl InMemoryLifecycleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.read().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Returns `true` if no tasks are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(err: impl std::fmt::Display) -> StoreError {
    StoreError::persistence(std::io::Error::other(err.to_string()))
}

fn check_head(task: &Task, expected: ScopeHead) -> StoreResult<()> {
    let actual = ScopeHead::observe(task, expected.scope);
    if actual != expected {
        return Err(StoreError::StaleHead {
            task: task.id(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[async_trait]
impl LifecycleStore for InMemoryLifecycleStore {
    async fn create(&self, task: &Task) -> StoreResult<()> {
        let mut tasks = self.tasks.write().map_err(poisoned)?;
        if tasks.contains_key(&task.id()) {
            return Err(StoreError::DuplicateTask(task.id()));
        }
        tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> StoreResult<Option<Task>> {
        let tasks = self.tasks.read().map_err(poisoned)?;
        Ok(tasks.get(&id).cloned())
    }

    async fn append(&self, id: TaskId, expected: ScopeHead, entry: LogEntry) -> StoreResult<Task> {
        let mut tasks = self.tasks.write().map_err(poisoned)?;
        let task = tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        check_head(task, expected)?;
        let sequence = task.log().last_sequence().next();
        task.record(entry.with_sequence(sequence));
        Ok(task.clone())
    }

    async fn replace_span(
        &self,
        id: TaskId,
        expected: ScopeHead,
        archived: &BTreeSet<SequenceNumber>,
        summary: CompactionSummary,
    ) -> StoreResult<Task> {
        let mut tasks = self.tasks.write().map_err(poisoned)?;
        let task = tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        check_head(task, expected)?;
        if !task.compact(archived, summary) {
            return Err(StoreError::SpanMismatch(id));
        }
        Ok(task.clone())
    }
}
