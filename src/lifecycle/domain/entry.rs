//! Log entries, record scopes, and query filters.

use super::{BlockedRecord, BranchId, CompactionSummary, SequenceNumber, TransitionRecord};
use crate::registry::domain::{GateId, PersonaId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an entry sits relative to the main sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "branch", rename_all = "snake_case")]
pub enum RecordScope {
    /// Part of the main sequence.
    Main,
    /// Part of a branch sub-sequence; the first such entry forks the branch.
    Branch(BranchId),
    /// Merge of a branch back into the main sequence.
    Merge(BranchId),
}

impl RecordScope {
    /// Returns the write scope that serializes appends of this entry.
    #[must_use]
    pub const fn key(self) -> ScopeKey {
        match self {
            Self::Main | Self::Merge(_) => ScopeKey::Main,
            Self::Branch(branch) => ScopeKey::Branch(branch),
        }
    }

    /// Returns the branch the entry belongs to or merges.
    #[must_use]
    pub const fn branch_id(self) -> Option<BranchId> {
        match self {
            Self::Main => None,
            Self::Branch(branch) | Self::Merge(branch) => Some(branch),
        }
    }
}

/// Unit of single-writer discipline within a task: the main sequence, or
/// one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKey {
    /// The main sequence, including merges and compaction.
    Main,
    /// One branch sub-sequence.
    Branch(BranchId),
}

impl std::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::Branch(branch) => write!(f, "branch {branch}"),
        }
    }
}

/// One immutable entry of a lifecycle log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum LogEntry {
    /// An accepted transition.
    Transition(TransitionRecord),
    /// A BLOCKED outcome anchored to the state it was raised in.
    Blocked(BlockedRecord),
    /// Summary standing in for an archived span.
    Compacted(CompactionSummary),
}

impl LogEntry {
    /// Returns the entry's log position.
    #[must_use]
    pub const fn sequence(&self) -> SequenceNumber {
        match self {
            Self::Transition(record) => record.sequence,
            Self::Blocked(record) => record.sequence,
            Self::Compacted(summary) => summary.sequence,
        }
    }

    /// Returns the entry with its log position set.
    #[must_use]
    pub fn with_sequence(mut self, sequence: SequenceNumber) -> Self {
        match &mut self {
            Self::Transition(record) => record.sequence = sequence,
            Self::Blocked(record) => record.sequence = sequence,
            Self::Compacted(summary) => summary.sequence = sequence,
        }
        self
    }

    /// Returns when the entry was recorded.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            Self::Transition(record) => record.recorded_at,
            Self::Blocked(record) => record.recorded_at,
            Self::Compacted(summary) => summary.compacted_at,
        }
    }

    /// Returns when the newest activity behind the entry was recorded: the
    /// entry's own time, or for a summary the time of the newest archived
    /// entry.
    #[must_use]
    pub const fn activity_at(&self) -> DateTime<Utc> {
        match self {
            Self::Compacted(summary) => summary.archive.through,
            Self::Transition(_) | Self::Blocked(_) => self.recorded_at(),
        }
    }

    /// Returns the gate, or `None` for compaction summaries.
    #[must_use]
    pub const fn gate(&self) -> Option<&GateId> {
        match self {
            Self::Transition(record) => Some(&record.gate),
            Self::Blocked(record) => Some(&record.gate),
            Self::Compacted(_) => None,
        }
    }

    /// Returns the persona, or `None` for compaction summaries.
    #[must_use]
    pub const fn persona(&self) -> Option<&PersonaId> {
        match self {
            Self::Transition(record) => Some(&record.persona),
            Self::Blocked(record) => Some(&record.persona),
            Self::Compacted(_) => None,
        }
    }

    /// Returns the entry's scope. Summaries belong to the main sequence.
    #[must_use]
    pub const fn scope(&self) -> RecordScope {
        match self {
            Self::Transition(record) => record.scope,
            Self::Blocked(record) => record.scope,
            Self::Compacted(_) => RecordScope::Main,
        }
    }

    /// Returns the accepted transition, if this entry is one.
    #[must_use]
    pub const fn as_transition(&self) -> Option<&TransitionRecord> {
        match self {
            Self::Transition(record) => Some(record),
            _ => None,
        }
    }

    /// Returns the BLOCKED record, if this entry is one.
    #[must_use]
    pub const fn as_blocked(&self) -> Option<&BlockedRecord> {
        match self {
            Self::Blocked(record) => Some(record),
            _ => None,
        }
    }

    /// Returns the compaction summary, if this entry is one.
    #[must_use]
    pub const fn as_compacted(&self) -> Option<&CompactionSummary> {
        match self {
            Self::Compacted(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Branch selector for log queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BranchFilter {
    /// Entries of every scope.
    #[default]
    Any,
    /// Main-sequence entries, merges, and summaries.
    Main,
    /// Entries forking, continuing, or merging one branch.
    Branch(BranchId),
}

/// Query filter over a lifecycle log. Unset criteria match everything.
///
/// # Examples
///
/// ```
/// use stagegate::lifecycle::domain::LogFilter;
/// use stagegate::registry::domain::GateId;
///
/// let gate = GateId::new("product.discovery").expect("valid gate id");
/// let filter = LogFilter::new().for_gate(gate.clone());
/// assert_eq!(filter.gate, Some(gate));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Only entries for this gate.
    pub gate: Option<GateId>,
    /// Only entries by this persona.
    pub persona: Option<PersonaId>,
    /// Only entries recorded at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only entries recorded strictly before this instant.
    pub until: Option<DateTime<Utc>>,
    /// Branch selector.
    pub branch: BranchFilter,
}

impl LogFilter {
    /// Creates a filter matching every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the filter to one gate.
    #[must_use]
    pub fn for_gate(mut self, gate: GateId) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Restricts the filter to one persona.
    #[must_use]
    pub fn by_persona(mut self, persona: PersonaId) -> Self {
        self.persona = Some(persona);
        self
    }

    /// Restricts the filter to `[since, until)`.
    #[must_use]
    pub const fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    /// Restricts the filter to a branch selector.
    #[must_use]
    pub const fn in_branch(mut self, branch: BranchFilter) -> Self {
        self.branch = branch;
        self
    }

    /// Returns `true` when `entry` satisfies every criterion.
    #[must_use]
    pub fn matches(&self, entry: &LogEntry) -> bool {
        let gate_matches = self
            .gate
            .as_ref()
            .is_none_or(|gate| entry.gate() == Some(gate));
        let persona_matches = self
            .persona
            .as_ref()
            .is_none_or(|persona| entry.persona() == Some(persona));
        let recorded_at = entry.recorded_at();
        let since_matches = self.since.is_none_or(|since| recorded_at >= since);
        let until_matches = self.until.is_none_or(|until| recorded_at < until);
        let branch_matches = match self.branch {
            BranchFilter::Any => true,
            BranchFilter::Main => entry.scope().key() == ScopeKey::Main,
            BranchFilter::Branch(branch) => entry.scope().branch_id() == Some(branch),
        };
        gate_matches && persona_matches && since_matches && until_matches && branch_matches
    }
}
