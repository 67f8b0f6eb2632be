//! Task aggregate root.

use super::{
    CompactionSummary, DomainTag, LifecycleLog, LogEntry, OwnerId, ScopeKey, SequenceNumber,
    TaskId,
};
use crate::registry::domain::{StateName, WorkflowName};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque product brief captured at intake.
///
/// The engine stores the text verbatim and never interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductBrief(String);

impl ProductBrief {
    /// Wraps brief text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Returns the brief text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductBrief {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameter object for creating a task at intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskParams {
    /// Workflow template the task follows.
    pub workflow: WorkflowName,
    /// Initial state of that workflow.
    pub initial_state: StateName,
    /// Domain tag.
    pub domain: DomainTag,
    /// Task owner.
    pub owner: OwnerId,
    /// Product brief payload.
    pub brief: ProductBrief,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted workflow name.
    pub workflow: WorkflowName,
    /// Persisted domain tag.
    pub domain: DomainTag,
    /// Persisted main-sequence state.
    pub state: StateName,
    /// Persisted owner.
    pub owner: OwnerId,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Persisted product brief.
    pub brief: ProductBrief,
    /// Persisted lifecycle log.
    pub log: LifecycleLog,
}

/// Task aggregate root. The task owns its lifecycle log exclusively, and
/// only log appends move its current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    workflow: WorkflowName,
    domain: DomainTag,
    state: StateName,
    owner: OwnerId,
    updated_at: DateTime<Utc>,
    brief: ProductBrief,
    log: LifecycleLog,
}

impl Task {
    /// Creates a task in its workflow's initial state with an empty log.
    #[must_use]
    pub fn new(params: NewTaskParams, clock: &impl Clock) -> Self {
        Self {
            id: TaskId::new(),
            workflow: params.workflow,
            domain: params.domain,
            state: params.initial_state,
            owner: params.owner,
            updated_at: clock.utc(),
            brief: params.brief,
            log: LifecycleLog::new(),
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            workflow: data.workflow,
            domain: data.domain,
            state: data.state,
            owner: data.owner,
            updated_at: data.updated_at,
            brief: data.brief,
            log: data.log,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the workflow the task follows.
    #[must_use]
    pub const fn workflow(&self) -> &WorkflowName {
        &self.workflow
    }

    /// Returns the domain tag.
    #[must_use]
    pub const fn domain(&self) -> &DomainTag {
        &self.domain
    }

    /// Returns the main-sequence state.
    #[must_use]
    pub const fn state(&self) -> &StateName {
        &self.state
    }

    /// Returns the owner.
    #[must_use]
    pub const fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Returns the timestamp of the latest log append.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the product brief.
    #[must_use]
    pub const fn brief(&self) -> &ProductBrief {
        &self.brief
    }

    /// Returns the lifecycle log.
    #[must_use]
    pub const fn log(&self) -> &LifecycleLog {
        &self.log
    }

    /// Returns the head of `scope`: the sequence number of its last entry.
    #[must_use]
    pub fn scope_head(&self, scope: ScopeKey) -> Option<SequenceNumber> {
        self.log.scope_head(scope)
    }

    /// Appends a sequenced entry. Main-sequence transitions and merges move
    /// the task state; blocks and branch transitions leave it unchanged.
    pub(crate) fn record(&mut self, entry: LogEntry) {
        if let LogEntry::Transition(record) = &entry
            && record.scope.key() == ScopeKey::Main
        {
            self.state = record.to_state.clone();
        }
        self.updated_at = entry.recorded_at();
        self.log.push(entry);
    }

    /// Swaps an archived span for its summary. Returns `false` and leaves
    /// the task untouched when the span no longer matches the log.
    pub(crate) fn compact(
        &mut self,
        archived: &BTreeSet<SequenceNumber>,
        summary: CompactionSummary,
    ) -> bool {
        self.log.replace_span(archived, summary)
    }
}
