//! The append-only, strictly ordered lifecycle log of one task.

use super::{
    BlockedRecord, BranchId, CompactionSummary, LogEntry, LogFilter, RecordScope, ScopeKey,
    SequenceNumber, WalkError,
};
use crate::registry::domain::{GateId, StateName, WorkflowTemplate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Derived view of one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchStatus {
    /// Branch identifier.
    pub branch: BranchId,
    /// Main-sequence state the branch forked from.
    pub fork_state: StateName,
    /// State reached by the branch's last accepted transition.
    pub state: StateName,
    /// Number of accepted transitions inside the branch.
    pub transitions: usize,
    /// Whether a merge transition has folded the branch back.
    pub merged: bool,
}

/// Ordered entries of a task's log, sorted by sequence number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleLog {
    entries: Vec<LogEntry>,
}

impl LifecycleLog {
    /// Creates an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rebuilds a log from persisted entries, ordering them by sequence.
    #[must_use]
    pub fn from_entries(mut entries: Vec<LogEntry>) -> Self {
        entries.sort_by_key(LogEntry::sequence);
        Self { entries }
    }

    /// Returns all entries in append order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the log has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the highest assigned sequence number, or
    /// [`SequenceNumber::UNASSIGNED`] for an empty log.
    #[must_use]
    pub fn last_sequence(&self) -> SequenceNumber {
        self.entries
            .last()
            .map_or(SequenceNumber::UNASSIGNED, LogEntry::sequence)
    }

    /// Returns the sequence number of the last entry written in `scope`.
    #[must_use]
    pub fn scope_head(&self, scope: ScopeKey) -> Option<SequenceNumber> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.scope().key() == scope)
            .map(LogEntry::sequence)
    }

    /// Returns the entries matching `filter`, in original append order.
    #[must_use]
    pub fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    /// Returns the derived status of `branch`, or `None` when no entry of
    /// the branch is present.
    #[must_use]
    pub fn branch_status(&self, branch: BranchId) -> Option<BranchStatus> {
        self.branches()
            .into_iter()
            .find(|status| status.branch == branch)
    }

    /// Returns the status of every branch in order of first appearance.
    #[must_use]
    pub fn branches(&self) -> Vec<BranchStatus> {
        let mut order = Vec::new();
        let mut statuses: BTreeMap<BranchId, BranchStatus> = BTreeMap::new();
        for entry in &self.entries {
            match (entry.scope(), entry) {
                (RecordScope::Branch(branch), LogEntry::Transition(record)) => {
                    let status = statuses.entry(branch).or_insert_with(|| {
                        order.push(branch);
                        BranchStatus {
                            branch,
                            fork_state: record.from_state.clone(),
                            state: record.from_state.clone(),
                            transitions: 0,
                            merged: false,
                        }
                    });
                    status.state = record.to_state.clone();
                    status.transitions = status.transitions.saturating_add(1);
                }
                (RecordScope::Branch(branch), LogEntry::Blocked(record)) => {
                    statuses.entry(branch).or_insert_with(|| {
                        order.push(branch);
                        BranchStatus {
                            branch,
                            fork_state: record.anchor_state.clone(),
                            state: record.anchor_state.clone(),
                            transitions: 0,
                            merged: false,
                        }
                    });
                }
                (RecordScope::Merge(branch), LogEntry::Transition(_)) => {
                    if let Some(status) = statuses.get_mut(&branch) {
                        status.merged = true;
                    }
                }
                _ => {}
            }
        }
        order
            .into_iter()
            .filter_map(|branch| statuses.remove(&branch))
            .collect()
    }

    /// Returns the sequence number of the merge transition of `branch`.
    #[must_use]
    pub fn merge_of(&self, branch: BranchId) -> Option<SequenceNumber> {
        self.entries
            .iter()
            .filter_map(LogEntry::as_transition)
            .find(|record| record.scope == RecordScope::Merge(branch))
            .map(|record| record.sequence)
    }

    /// Returns BLOCKED records that no later transition has resolved.
    #[must_use]
    pub fn unresolved_blocks(&self) -> Vec<&BlockedRecord> {
        self.entries
            .iter()
            .filter_map(LogEntry::as_blocked)
            .filter(|block| {
                !self
                    .entries
                    .iter()
                    .filter_map(LogEntry::as_transition)
                    .any(|record| block.is_resolved_by(record))
            })
            .collect()
    }

    /// Returns unresolved blocks that can still be resolved: anchored to
    /// `main_state` for the main sequence, or to the current state of an
    /// open branch.
    #[must_use]
    pub fn actionable_blocks(&self, main_state: &StateName) -> Vec<&BlockedRecord> {
        let statuses = self.branches();
        self.unresolved_blocks()
            .into_iter()
            .filter(|block| match block.scope {
                RecordScope::Main | RecordScope::Merge(_) => &block.anchor_state == main_state,
                RecordScope::Branch(branch) => statuses.iter().any(|status| {
                    status.branch == branch && !status.merged && status.state == block.anchor_state
                }),
            })
            .collect()
    }

    /// Returns the newest unresolved block for `gate` in `scope` anchored to
    /// `state`.
    #[must_use]
    pub fn pending_block_for(
        &self,
        gate: &GateId,
        scope: RecordScope,
        state: &StateName,
    ) -> Option<SequenceNumber> {
        self.unresolved_blocks()
            .into_iter()
            .rev()
            .find(|block| {
                &block.gate == gate && block.scope == scope && &block.anchor_state == state
            })
            .map(|block| block.sequence)
    }

    /// Returns the branch of the newest unresolved fork attempt for `gate`
    /// from `main_state`: a branch that holds only BLOCKED records.
    #[must_use]
    pub fn pending_fork_for(&self, gate: &GateId, main_state: &StateName) -> Option<BranchId> {
        let statuses = self.branches();
        self.unresolved_blocks()
            .into_iter()
            .rev()
            .filter(|block| &block.gate == gate && &block.anchor_state == main_state)
            .find_map(|block| {
                let branch = block.scope.branch_id()?;
                statuses
                    .iter()
                    .any(|status| {
                        status.branch == branch
                            && status.transitions == 0
                            && &status.fork_state == main_state
                    })
                    .then_some(branch)
            })
    }

    /// Checks that main-sequence and branch entries each form a connected,
    /// forward walk over `template`, and returns the main-sequence state the
    /// walk ends in.
    ///
    /// A compaction summary stands at the start of the span it replaced, so
    /// entries kept inside that span (open branches, actionable blocks) are
    /// checked against the state the summary reached.
    ///
    /// # Errors
    ///
    /// Returns [`WalkError`] describing the first violation.
    pub fn verify_walk(&self, template: &WorkflowTemplate) -> Result<StateName, WalkError> {
        let mut main_state = template.initial_state().clone();
        let mut branch_states: BTreeMap<BranchId, StateName> = BTreeMap::new();
        let mut ordered: Vec<&LogEntry> = self.entries.iter().collect();
        ordered.sort_by_key(|entry| match entry {
            LogEntry::Compacted(summary) => summary.archive.first,
            _ => entry.sequence(),
        });

        for entry in ordered {
            match entry {
                LogEntry::Transition(record) => {
                    let current = match record.scope {
                        RecordScope::Main | RecordScope::Merge(_) => &mut main_state,
                        RecordScope::Branch(branch) => branch_states
                            .entry(branch)
                            .or_insert_with(|| record.from_state.clone()),
                    };
                    step(
                        current,
                        record.sequence,
                        &record.from_state,
                        &record.to_state,
                        template,
                    )?;
                    if let RecordScope::Merge(branch) = record.scope {
                        let matches_branch = branch_states
                            .get(&branch)
                            .is_none_or(|branch_state| branch_state == &record.to_state);
                        if !matches_branch {
                            return Err(WalkError::MergeMismatch {
                                sequence: record.sequence,
                                branch,
                            });
                        }
                    }
                }
                LogEntry::Blocked(block) => {
                    let current = match block.scope {
                        RecordScope::Main | RecordScope::Merge(_) => &main_state,
                        RecordScope::Branch(branch) => branch_states
                            .entry(branch)
                            .or_insert_with(|| block.anchor_state.clone()),
                    };
                    if current != &block.anchor_state {
                        return Err(WalkError::Disconnected {
                            sequence: block.sequence,
                            expected: current.clone(),
                            found: block.anchor_state.clone(),
                        });
                    }
                }
                LogEntry::Compacted(summary) => {
                    verify_summary(&mut main_state, summary, template)?;
                }
            }
        }
        Ok(main_state)
    }

    /// Appends an entry whose sequence number has already been assigned.
    pub(crate) fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Replaces the entries in `archived` with `summary`.
    ///
    /// Returns `false` and leaves the log untouched when any archived
    /// sequence number is no longer present.
    pub(crate) fn replace_span(
        &mut self,
        archived: &BTreeSet<SequenceNumber>,
        summary: CompactionSummary,
    ) -> bool {
        let present = self
            .entries
            .iter()
            .filter(|entry| archived.contains(&entry.sequence()))
            .count();
        if present != archived.len() {
            return false;
        }
        self.entries
            .retain(|entry| !archived.contains(&entry.sequence()));
        let position = self
            .entries
            .partition_point(|entry| entry.sequence() < summary.sequence);
        self.entries
            .insert(position, LogEntry::Compacted(summary));
        true
    }
}

fn step(
    current: &mut StateName,
    sequence: SequenceNumber,
    from: &StateName,
    to: &StateName,
    template: &WorkflowTemplate,
) -> Result<(), WalkError> {
    if current != from {
        return Err(WalkError::Disconnected {
            sequence,
            expected: current.clone(),
            found: from.clone(),
        });
    }
    if !template.is_forward(from, to) {
        return Err(WalkError::OutOfTemplate {
            sequence,
            from: from.clone(),
            to: to.clone(),
        });
    }
    to.clone_into(current);
    Ok(())
}

fn verify_summary(
    main_state: &mut StateName,
    summary: &CompactionSummary,
    template: &WorkflowTemplate,
) -> Result<(), WalkError> {
    if summary.from_state == summary.final_state {
        if *main_state != summary.from_state {
            return Err(WalkError::Disconnected {
                sequence: summary.sequence,
                expected: main_state.clone(),
                found: summary.from_state.clone(),
            });
        }
        return Ok(());
    }
    step(
        main_state,
        summary.sequence,
        &summary.from_state,
        &summary.final_state,
        template,
    )
}
