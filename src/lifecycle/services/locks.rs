//! Per-task, per-scope exclusive write sections.

use super::error::ConflictError;
use crate::lifecycle::domain::{ScopeKey, TaskId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as SectionMutex, OwnedMutexGuard};

type SectionMap = HashMap<(TaskId, ScopeKey), Arc<SectionMutex<()>>>;

/// Registry of write sections shared by every service that mutates logs.
///
/// The main sequence of a task (appends, merges, compaction) is one section;
/// each branch is its own section, so branches advance in parallel. Tasks
/// never contend with each other.
#[derive(Debug, Clone, Default)]
pub struct WriteLocks {
    sections: Arc<Mutex<SectionMap>>,
}

/// Exclusive hold on one write section, released on drop.
#[derive(Debug)]
pub struct WriteGuard {
    task: TaskId,
    scope: ScopeKey,
    _section: OwnedMutexGuard<()>,
}

impl WriteGuard {
    /// Returns the task the section belongs to.
    #[must_use]
    pub const fn task(&self) -> TaskId {
        self.task
    }

    /// Returns the held scope.
    #[must_use]
    pub const fn scope(&self) -> ScopeKey {
        self.scope
    }
}

impl WriteLocks {
    /// Creates an empty lock registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn section(&self, task: TaskId, scope: ScopeKey) -> Arc<SectionMutex<()>> {
        let mut sections = self
            .sections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        sections.retain(|_, section| Arc::strong_count(section) > 1);
        Arc::clone(sections.entry((task, scope)).or_default())
    }

    /// Enters the section without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictError::Busy`] when another mutation holds it.
    pub fn try_enter(&self, task: TaskId, scope: ScopeKey) -> Result<WriteGuard, ConflictError> {
        let section = self
            .section(task, scope)
            .try_lock_owned()
            .map_err(|_| ConflictError::Busy { task, scope })?;
        Ok(WriteGuard {
            task,
            scope,
            _section: section,
        })
    }

    /// Waits until the section is free and enters it.
    pub async fn enter(&self, task: TaskId, scope: ScopeKey) -> WriteGuard {
        let section = self.section(task, scope).lock_owned().await;
        WriteGuard {
            task,
            scope,
            _section: section,
        }
    }
}
