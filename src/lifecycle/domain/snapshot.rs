//! Context snapshots: derived, read-only views over a task's log.

use super::{
    ArchivePointer, BranchId, DomainTag, FollowUp, Gap, LogEntry, OwnerId, RecordScope,
    RiskEntry, SequenceNumber, Task, TaskId,
};
use crate::registry::domain::{GateId, StateName, WorkflowName, WorkflowTemplate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A BLOCKED record that is still actionable: unresolved and anchored to
/// the current state of its scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBlock {
    /// Log position of the BLOCKED record.
    pub sequence: SequenceNumber,
    /// Gate that was requested.
    pub gate: GateId,
    /// Scope the request targeted.
    pub scope: RecordScope,
    /// State the block is anchored to.
    pub anchor_state: StateName,
    /// Keys still to supply.
    pub missing_inputs: Vec<String>,
    /// Steps that unblock the request.
    pub unblock_steps: Vec<String>,
}

/// Snapshot view of one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchView {
    /// Branch identifier.
    pub branch: BranchId,
    /// Main-sequence state the branch forked from.
    pub fork_state: StateName,
    /// Current branch state.
    pub state: StateName,
    /// Accepted transitions inside the branch.
    pub transitions: usize,
    /// Whether the branch has been merged.
    pub merged: bool,
    /// Next gate inside the branch, if it is open and not at the end of
    /// the workflow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_expected: Option<GateId>,
}

/// Point-in-time summary of a task for handoff.
///
/// Snapshots are never stored authoritatively. Deriving one twice from the
/// same task yields equal values and byte-identical canonical JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Task the snapshot describes.
    pub task_id: TaskId,
    /// Workflow the task follows.
    pub workflow: WorkflowName,
    /// Domain tag.
    pub domain: DomainTag,
    /// Task owner.
    pub owner: OwnerId,
    /// Current main-sequence state.
    pub state: StateName,
    /// Next gate in the main sequence; `None` at the terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_expected: Option<GateId>,
    /// Highest sequence number in the log.
    pub last_sequence: SequenceNumber,
    /// Timestamp of the latest log append.
    pub as_of: DateTime<Utc>,
    /// Deduplicated union of open risks, in log order.
    pub open_risks: Vec<RiskEntry>,
    /// Deduplicated union of follow-ups, in log order.
    pub open_follow_ups: Vec<FollowUp>,
    /// Deduplicated union of recorded gaps, in log order.
    pub gaps: Vec<Gap>,
    /// Actionable BLOCKED records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_blocks: Vec<PendingBlock>,
    /// Branches in order of first appearance.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<BranchView>,
    /// Pointers to archived spans, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub archives: Vec<ArchivePointer>,
}

impl ContextSnapshot {
    /// Derives a snapshot of `task` against its workflow template.
    #[must_use]
    pub fn derive(task: &Task, template: &WorkflowTemplate) -> Self {
        let log = task.log();
        let mut open_risks = Vec::new();
        let mut open_follow_ups = Vec::new();
        let mut gaps = Vec::new();
        let mut archives = Vec::new();

        for entry in log.entries() {
            match entry {
                LogEntry::Transition(record) => {
                    extend_unique(&mut open_risks, record.open_risks());
                    extend_unique(&mut open_follow_ups, &record.follow_ups);
                    extend_unique(&mut gaps, &record.gaps);
                }
                LogEntry::Compacted(summary) => {
                    extend_unique(&mut open_risks, &summary.open_risks);
                    extend_unique(&mut open_follow_ups, &summary.open_follow_ups);
                    extend_unique(&mut gaps, &summary.gaps);
                    archives.push(summary.archive.clone());
                }
                LogEntry::Blocked(_) => {}
            }
        }

        let pending_blocks = log
            .actionable_blocks(task.state())
            .into_iter()
            .map(|block| PendingBlock {
                sequence: block.sequence,
                gate: block.gate.clone(),
                scope: block.scope,
                anchor_state: block.anchor_state.clone(),
                missing_inputs: block.missing_inputs.clone(),
                unblock_steps: block.unblock_steps.clone(),
            })
            .collect();

        let branches = log
            .branches()
            .into_iter()
            .map(|status| {
                let next_expected = if status.merged {
                    None
                } else {
                    template
                        .gate_from(&status.state)
                        .map(|gate| gate.name().clone())
                };
                BranchView {
                    branch: status.branch,
                    fork_state: status.fork_state,
                    state: status.state,
                    transitions: status.transitions,
                    merged: status.merged,
                    next_expected,
                }
            })
            .collect();

        Self {
            task_id: task.id(),
            workflow: task.workflow().clone(),
            domain: task.domain().clone(),
            owner: task.owner().clone(),
            state: task.state().clone(),
            next_expected: template
                .gate_from(task.state())
                .map(|gate| gate.name().clone()),
            last_sequence: log.last_sequence(),
            as_of: task.updated_at(),
            open_risks,
            open_follow_ups,
            gaps,
            pending_blocks,
            branches,
            archives,
        }
    }

    /// Serialises the snapshot as compact JSON with a fixed field order.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if serialisation fails.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn extend_unique<'a, T>(target: &mut Vec<T>, items: impl IntoIterator<Item = &'a T>)
where
    T: Clone + PartialEq + 'a,
{
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}
