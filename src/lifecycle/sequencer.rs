//! Gate ordering over a workflow template.
//!
//! The sequencer decides whether a requested gate may run next and where the
//! resulting entry belongs: the main sequence, a new or existing branch, or
//! a merge back into the main sequence. It never touches the log.

use crate::lifecycle::domain::{BranchId, RecordScope, ScopeKey, Task, TransitionMode};
use crate::registry::domain::{GateDefinition, GateId, StateName, WorkflowName, WorkflowTemplate};
use thiserror::Error;

/// Ordering violations. Each is fatal to the request and leaves the task
/// unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SequencingError {
    /// The requested gate is not the one the order allows.
    #[error("gate {requested} is out of order; expected {expected}")]
    OutOfOrder {
        /// Requested gate.
        requested: GateId,
        /// Gate the order expects next.
        expected: GateId,
    },

    /// The scope already sits at the workflow's terminal state.
    #[error("workflow is complete at {state}; no gate may follow")]
    WorkflowComplete {
        /// Terminal state reached.
        state: StateName,
    },

    /// The gate is not part of the task's workflow.
    #[error("gate {gate} is not part of workflow {workflow}")]
    UnknownGate {
        /// Requested gate.
        gate: GateId,
        /// Task workflow.
        workflow: WorkflowName,
    },

    /// The merge gate was requested outside branch mode or without a branch.
    #[error("merge gate {gate} requires branch mode and a branch id")]
    MergeRequiresBranch {
        /// Requested merge gate.
        gate: GateId,
    },

    /// A branch id was supplied under strict or tolerant mode.
    #[error("branch {branch} can only be addressed in branch mode")]
    BranchRequiresBranchMode {
        /// Supplied branch.
        branch: BranchId,
    },

    /// No entry of the branch exists in the log.
    #[error("branch {0} does not exist")]
    UnknownBranch(BranchId),

    /// The branch has already been merged.
    #[error("branch {0} is already merged")]
    BranchClosed(BranchId),

    /// The main sequence moved on after the branch forked.
    #[error("branch {branch} forked from {fork_state} but the main sequence is at {main_state}")]
    BranchBaseMoved {
        /// Branch to merge.
        branch: BranchId,
        /// State the branch forked from.
        fork_state: StateName,
        /// Current main-sequence state.
        main_state: StateName,
    },

    /// The branch's terminal state is not a declared joinable state.
    #[error("branch {branch} ends at {state}, which is not joinable")]
    NotJoinable {
        /// Branch to merge.
        branch: BranchId,
        /// Branch terminal state.
        state: StateName,
    },

    /// The branch has no accepted transitions to fold back.
    #[error("branch {0} has no accepted transitions to merge")]
    EmptyBranch(BranchId),
}

/// Where a planned transition will be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedScope {
    /// The main sequence.
    Main,
    /// A new branch forking from the current main state.
    Fork,
    /// An existing open branch, or the branch of a blocked fork being
    /// resubmitted.
    Branch(BranchId),
    /// Merge of a branch into the main sequence.
    Merge(BranchId),
}

impl PlannedScope {
    /// Resolves the record scope, using `fresh` for a fork.
    #[must_use]
    pub const fn resolve(self, fresh: BranchId) -> RecordScope {
        match self {
            Self::Main => RecordScope::Main,
            Self::Fork => RecordScope::Branch(fresh),
            Self::Branch(branch) => RecordScope::Branch(branch),
            Self::Merge(branch) => RecordScope::Merge(branch),
        }
    }

    /// Returns the write scope the append must hold.
    #[must_use]
    pub const fn key(self, fresh: BranchId) -> ScopeKey {
        self.resolve(fresh).key()
    }
}

/// Outcome of a successful ordering check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceDecision {
    /// Where the entry belongs.
    pub scope: PlannedScope,
    /// State the transition starts from.
    pub from_state: StateName,
    /// State the transition reaches if accepted.
    pub to_state: StateName,
    /// Gates skipped over under tolerant mode, in template order.
    pub skipped: Vec<GateId>,
    /// Input keys the requested gate declares as required.
    pub required_inputs: Vec<String>,
}

/// Gate sequencer for one workflow template.
#[derive(Debug, Clone, Copy)]
pub struct GateSequencer<'a> {
    template: &'a WorkflowTemplate,
}

impl<'a> GateSequencer<'a> {
    /// Creates a sequencer over `template`.
    #[must_use]
    pub const fn new(template: &'a WorkflowTemplate) -> Self {
        Self { template }
    }

    /// Returns the next gate of the main sequence, or `None` at the
    /// terminal state.
    #[must_use]
    pub fn next_expected(&self, task: &Task) -> Option<&'a GateDefinition> {
        self.template.gate_from(task.state())
    }

    /// Returns the next gate inside `branch`.
    ///
    /// # Errors
    ///
    /// Returns [`SequencingError::UnknownBranch`] or
    /// [`SequencingError::BranchClosed`] when the branch cannot advance.
    pub fn next_expected_in(
        &self,
        task: &Task,
        branch: BranchId,
    ) -> Result<Option<&'a GateDefinition>, SequencingError> {
        let status = task
            .log()
            .branch_status(branch)
            .ok_or(SequencingError::UnknownBranch(branch))?;
        if status.merged {
            return Err(SequencingError::BranchClosed(branch));
        }
        Ok(self.template.gate_from(&status.state))
    }

    /// Returns `true` when `gate` may run next on the main sequence (or fork
    /// a branch) under `mode`.
    #[must_use]
    pub fn is_valid(&self, task: &Task, gate: &GateId, mode: TransitionMode) -> bool {
        self.plan(task, gate, mode, None).is_ok()
    }

    /// Checks ordering for a requested gate and plans where it lands.
    ///
    /// # Errors
    ///
    /// Returns [`SequencingError`] naming the violated ordering rule.
    pub fn plan(
        &self,
        task: &Task,
        gate: &GateId,
        mode: TransitionMode,
        branch: Option<BranchId>,
    ) -> Result<SequenceDecision, SequencingError> {
        if self.template.is_merge_gate(gate) {
            return match (mode, branch) {
                (TransitionMode::Branch, Some(branch_id)) => self.plan_merge(task, branch_id),
                _ => Err(SequencingError::MergeRequiresBranch { gate: gate.clone() }),
            };
        }
        let requested = self
            .template
            .gate(gate)
            .ok_or_else(|| SequencingError::UnknownGate {
                gate: gate.clone(),
                workflow: self.template.name().clone(),
            })?;

        match (mode, branch) {
            (TransitionMode::Strict | TransitionMode::Tolerant, Some(branch_id)) => {
                Err(SequencingError::BranchRequiresBranchMode { branch: branch_id })
            }
            (TransitionMode::Strict, None) => {
                self.plan_exact(requested, task.state(), PlannedScope::Main)
            }
            (TransitionMode::Tolerant, None) => self.plan_tolerant(requested, task.state()),
            (TransitionMode::Branch, None) => {
                let scope = task
                    .log()
                    .pending_fork_for(gate, task.state())
                    .map_or(PlannedScope::Fork, PlannedScope::Branch);
                self.plan_exact(requested, task.state(), scope)
            }
            (TransitionMode::Branch, Some(branch_id)) => {
                let status = task
                    .log()
                    .branch_status(branch_id)
                    .ok_or(SequencingError::UnknownBranch(branch_id))?;
                if status.merged {
                    return Err(SequencingError::BranchClosed(branch_id));
                }
                self.plan_exact(requested, &status.state, PlannedScope::Branch(branch_id))
            }
        }
    }

    fn expected_from(&self, state: &StateName) -> Result<&'a GateDefinition, SequencingError> {
        self.template
            .gate_from(state)
            .ok_or_else(|| SequencingError::WorkflowComplete {
                state: state.clone(),
            })
    }

    fn plan_exact(
        &self,
        requested: &GateDefinition,
        current: &StateName,
        scope: PlannedScope,
    ) -> Result<SequenceDecision, SequencingError> {
        let expected = self.expected_from(current)?;
        if expected.name() != requested.name() {
            return Err(SequencingError::OutOfOrder {
                requested: requested.name().clone(),
                expected: expected.name().clone(),
            });
        }
        Ok(SequenceDecision {
            scope,
            from_state: current.clone(),
            to_state: requested.to_state().clone(),
            skipped: Vec::new(),
            required_inputs: requested.required_inputs().to_vec(),
        })
    }

    fn plan_tolerant(
        &self,
        requested: &GateDefinition,
        current: &StateName,
    ) -> Result<SequenceDecision, SequencingError> {
        let expected = self.expected_from(current)?;
        if requested.position() < expected.position() {
            return Err(SequencingError::OutOfOrder {
                requested: requested.name().clone(),
                expected: expected.name().clone(),
            });
        }
        let skipped = self
            .template
            .gates()
            .iter()
            .skip(expected.position())
            .take(requested.position().saturating_sub(expected.position()))
            .map(|gate| gate.name().clone())
            .collect();
        Ok(SequenceDecision {
            scope: PlannedScope::Main,
            from_state: current.clone(),
            to_state: requested.to_state().clone(),
            skipped,
            required_inputs: requested.required_inputs().to_vec(),
        })
    }

    fn plan_merge(
        &self,
        task: &Task,
        branch: BranchId,
    ) -> Result<SequenceDecision, SequencingError> {
        let status = task
            .log()
            .branch_status(branch)
            .ok_or(SequencingError::UnknownBranch(branch))?;
        if status.merged {
            return Err(SequencingError::BranchClosed(branch));
        }
        if status.transitions == 0 {
            return Err(SequencingError::EmptyBranch(branch));
        }
        if &status.fork_state != task.state() {
            return Err(SequencingError::BranchBaseMoved {
                branch,
                fork_state: status.fork_state,
                main_state: task.state().clone(),
            });
        }
        if !self.template.is_joinable(&status.state) {
            return Err(SequencingError::NotJoinable {
                branch,
                state: status.state,
            });
        }
        Ok(SequenceDecision {
            scope: PlannedScope::Merge(branch),
            from_state: task.state().clone(),
            to_state: status.state,
            skipped: Vec::new(),
            required_inputs: self.template.merge_gate().required_inputs().to_vec(),
        })
    }
}
