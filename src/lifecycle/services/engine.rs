//! Lifecycle engine: intake, the execute write path, queries, and the text
//! import/export surface.

use super::blocked::{BlockedHandler, BlockedRequest};
use super::error::{ConflictError, LifecycleError, LifecycleResult};
use super::locks::{WriteGuard, WriteLocks};
use crate::lifecycle::domain::{
    BlockedRecord, BranchId, DomainTag, Evidence, FollowUp, Gap, LogEntry, LogFilter,
    NewTaskParams, OutputBlock, OwnerId, ProductBrief, RiskEntry, ScopeKey, SequenceNumber, Task,
    TaskId, TransitionMode, TransitionRecord, WalkError,
};
use crate::lifecycle::format;
use crate::lifecycle::ports::{LifecycleStore, ScopeHead};
use crate::lifecycle::sequencer::{GateSequencer, SequenceDecision};
use crate::lifecycle::validation::{TransitionValidator, ValidationOutcome};
use crate::registry::RegistryHandle;
use crate::registry::domain::{GateId, PersonaId, WorkflowName};
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Request payload for task intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    domain: String,
    owner: String,
    brief: String,
    workflow: Option<String>,
}

impl CreateTaskRequest {
    /// Creates a request for the registry's default workflow.
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        owner: impl Into<String>,
        brief: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            owner: owner.into(),
            brief: brief.into(),
            workflow: None,
        }
    }

    /// Selects a workflow other than the default.
    #[must_use]
    pub fn with_workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = Some(workflow.into());
        self
    }
}

/// A persona's request to execute a gate on a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteRequest {
    task: TaskId,
    gate: GateId,
    persona: PersonaId,
    mode: TransitionMode,
    branch: Option<BranchId>,
    why: Vec<String>,
    output: OutputBlock,
    follow_ups: Vec<FollowUp>,
    expected_head: Option<PinnedHead>,
}

/// Head a caller observed for the scope a request writes into; `None` pins
/// an empty scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PinnedHead(Option<SequenceNumber>);

impl ExecuteRequest {
    /// Creates a request with an empty payload.
    #[must_use]
    pub fn new(task: TaskId, gate: GateId, persona: PersonaId, mode: TransitionMode) -> Self {
        Self {
            task,
            gate,
            persona,
            mode,
            branch: None,
            why: Vec::new(),
            output: OutputBlock::default(),
            follow_ups: Vec::new(),
            expected_head: None,
        }
    }

    /// Targets an existing branch (branch mode only).
    #[must_use]
    pub const fn in_branch(mut self, branch: BranchId) -> Self {
        self.branch = Some(branch);
        self
    }

    /// Appends a WHY rationale bullet.
    #[must_use]
    pub fn with_why(mut self, reason: impl Into<String>) -> Self {
        self.why.push(reason.into());
        self
    }

    /// Sets the OUTPUT summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.output.summary = summary.into();
        self
    }

    /// Adds a named input reference.
    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.output.inputs.insert(key.into(), value.into());
        self
    }

    /// Replaces all named input references.
    #[must_use]
    pub fn with_inputs(mut self, inputs: BTreeMap<String, String>) -> Self {
        self.output.inputs = inputs;
        self
    }

    /// Sets the evidence tuple.
    #[must_use]
    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.output.evidence = evidence;
        self
    }

    /// Appends a risk entry.
    #[must_use]
    pub fn with_risk(mut self, risk: RiskEntry) -> Self {
        self.output.risks.push(risk);
        self
    }

    /// Appends a follow-up item.
    #[must_use]
    pub fn with_follow_up(mut self, follow_up: FollowUp) -> Self {
        self.follow_ups.push(follow_up);
        self
    }

    /// Pins the scope head the caller observed; a different head when the
    /// request is planned or appended is a conflict.
    ///
    /// The pinned scope is the branch named by [`Self::in_branch`] for
    /// branch continuations and the main sequence otherwise (forks and
    /// merges read the main head). `None` pins a scope with no entries.
    #[must_use]
    pub const fn with_expected_head(mut self, head: Option<SequenceNumber>) -> Self {
        self.expected_head = Some(PinnedHead(head));
        self
    }

    /// Returns the target task.
    #[must_use]
    pub const fn task(&self) -> TaskId {
        self.task
    }

    /// Returns the requested gate.
    #[must_use]
    pub const fn gate(&self) -> &GateId {
        &self.gate
    }
}

/// Result of a successful execute call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// The transition was accepted and appended.
    Transitioned {
        /// Task after the append.
        task: Task,
        /// Appended record.
        record: TransitionRecord,
    },
    /// Validation failed; a BLOCKED record was appended and the state is
    /// unchanged.
    Blocked {
        /// Task after the append.
        task: Task,
        /// Appended BLOCKED record.
        record: BlockedRecord,
    },
}

impl ExecuteOutcome {
    /// Returns the task after the append.
    #[must_use]
    pub const fn task(&self) -> &Task {
        match self {
            Self::Transitioned { task, .. } | Self::Blocked { task, .. } => task,
        }
    }

    /// Returns `true` for a BLOCKED outcome.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    /// Renders the appended entry in the text log format: a transition
    /// block or a BLOCKED marker block.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Transitioned { record, .. } => format::render_transition(record),
            Self::Blocked { record, .. } => format::render_blocked(record),
        }
    }
}

/// Orchestrates authorization, sequencing, validation, and appends.
pub struct LifecycleEngine<S, C>
where
    S: LifecycleStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    registry: Arc<RegistryHandle>,
    clock: Arc<C>,
    locks: WriteLocks,
    validator: TransitionValidator,
}

impl<S, C> Clone for LifecycleEngine<S, C>
where
    S: LifecycleStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            clock: Arc::clone(&self.clock),
            locks: self.locks.clone(),
            validator: self.validator,
        }
    }
}

impl<S, C> LifecycleEngine<S, C>
where
    S: LifecycleStore,
    C: Clock + Send + Sync,
{
    /// Creates an engine with its own write sections.
    #[must_use]
    pub fn new(store: Arc<S>, registry: Arc<RegistryHandle>, clock: Arc<C>) -> Self {
        Self {
            store,
            registry,
            clock,
            locks: WriteLocks::new(),
            validator: TransitionValidator::new(),
        }
    }

    /// Shares write sections with other services (such as compaction).
    #[must_use]
    pub fn with_locks(mut self, locks: WriteLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Returns the write sections used by this engine.
    #[must_use]
    pub const fn locks(&self) -> &WriteLocks {
        &self.locks
    }

    /// Creates a task at its workflow's initial state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the domain tag or owner is invalid,
    /// the glossary does not allow the domain, the workflow is unknown, or
    /// the store rejects the task.
    #[instrument(skip(self, request), fields(domain = %request.domain))]
    pub async fn create_task(&self, request: CreateTaskRequest) -> LifecycleResult<Task> {
        let registry = self.registry.current();
        let domain = DomainTag::new(request.domain)?;
        registry
            .glossary()
            .validate_domain(domain.as_str(), registry.version())?;
        let workflow_name = match request.workflow {
            Some(name) => WorkflowName::new(name)?,
            None => registry.default_workflow().clone(),
        };
        let template = registry.workflow(&workflow_name)?;
        let params = NewTaskParams {
            workflow: workflow_name.clone(),
            initial_state: template.initial_state().clone(),
            domain,
            owner: OwnerId::new(request.owner)?,
            brief: ProductBrief::new(request.brief),
        };
        let task = Task::new(params, &*self.clock);
        self.store.create(&task).await?;
        info!(task = %task.id(), workflow = %workflow_name, "task created");
        Ok(task)
    }

    /// Executes a gate for a persona.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Authorization`], [`LifecycleError::Sequencing`],
    /// [`LifecycleError::Rejected`], or [`LifecycleError::Conflict`] for the
    /// fatal outcomes; BLOCKED is returned as [`ExecuteOutcome::Blocked`].
    #[instrument(
        skip(self, request),
        fields(
            task = %request.task,
            gate = %request.gate,
            persona = %request.persona,
            mode = %request.mode
        )
    )]
    pub async fn execute(&self, request: ExecuteRequest) -> LifecycleResult<ExecuteOutcome> {
        let registry = self.registry.current();
        if let Err(err) = registry.authorize(&request.persona, &request.gate) {
            warn!(error = %err, "transition unauthorized");
            return Err(err.into());
        }

        let mut task = self.load(request.task).await?;
        let template = registry.workflow(task.workflow())?;
        let sequencer = GateSequencer::new(template);
        let is_merge = template.is_merge_gate(&request.gate);
        let pinned = pinned_scope(is_merge, &request);
        check_pin(&task, pinned, request.expected_head)?;
        let fresh = BranchId::new();

        let (decision, _guards) = match (is_merge, request.branch) {
            (true, Some(branch)) if request.mode == TransitionMode::Branch => {
                let guards = self.enter_merge(task.id(), branch).await;
                task = self.load(request.task).await?;
                check_pin(&task, pinned, request.expected_head)?;
                (plan_transition(&sequencer, &task, &request)?, guards)
            }
            _ => {
                let decision = plan_transition(&sequencer, &task, &request)?;
                let key = decision.scope.key(fresh);
                let guard = self
                    .locks
                    .try_enter(task.id(), key)
                    .inspect_err(|err| warn!(error = %err, "write section busy"))?;
                let current = self.load(request.task).await?;
                check_pin(&current, pinned, request.expected_head)?;
                check_unchanged(&task, &current, key)?;
                if request.branch.is_none() && key != ScopeKey::Main {
                    check_unchanged(&task, &current, ScopeKey::Main)?;
                }
                (decision, vec![guard])
            }
        };

        let scope = decision.scope.resolve(fresh);
        let observed = ScopeHead::observe(&task, scope.key());

        let recorded_at = self.clock.utc();
        let mut record = TransitionRecord {
            sequence: SequenceNumber::UNASSIGNED,
            gate: request.gate,
            persona: request.persona,
            mode: request.mode,
            scope,
            from_state: decision.from_state,
            to_state: decision.to_state,
            why: request.why,
            output: request.output,
            follow_ups: request.follow_ups,
            gaps: decision.skipped.into_iter().map(Gap::SkippedGate).collect(),
            resolves: None,
            recorded_at,
        };

        match self.validator.validate(&record, &decision.required_inputs) {
            ValidationOutcome::Rejected { reason } => {
                warn!(%reason, "transition rejected");
                Err(LifecycleError::Rejected {
                    gate: record.gate,
                    reason,
                })
            }
            ValidationOutcome::Blocked { missing_inputs } => {
                let handler = BlockedHandler::new(registry.unblock_template());
                let blocked = handler.block(
                    BlockedRequest {
                        gate: record.gate,
                        persona: record.persona,
                        mode: record.mode,
                        scope,
                        anchor_state: record.from_state,
                        missing_inputs,
                    },
                    recorded_at,
                )?;
                let updated = self
                    .store
                    .append(task.id(), observed, LogEntry::Blocked(blocked.clone()))
                    .await?;
                let appended = BlockedRecord {
                    sequence: updated.log().last_sequence(),
                    ..blocked
                };
                warn!(
                    sequence = %appended.sequence,
                    missing = ?appended.missing_inputs,
                    "transition blocked"
                );
                Ok(ExecuteOutcome::Blocked {
                    task: updated,
                    record: appended,
                })
            }
            ValidationOutcome::Accepted { gaps } => {
                record.resolves = BlockedHandler::resolution_for(
                    &task,
                    &record.gate,
                    scope,
                    &record.from_state,
                );
                downgrade_gaps(&mut record, gaps)?;
                let updated = self
                    .store
                    .append(task.id(), observed, LogEntry::Transition(record.clone()))
                    .await?;
                record.sequence = updated.log().last_sequence();
                info!(
                    sequence = %record.sequence,
                    from = %record.from_state,
                    to = %record.to_state,
                    scope = ?record.scope,
                    "transition accepted"
                );
                Ok(ExecuteOutcome::Transitioned {
                    task: updated,
                    record,
                })
            }
        }
    }

    async fn enter_merge(&self, task: TaskId, branch: BranchId) -> Vec<WriteGuard> {
        let main = self.locks.enter(task, ScopeKey::Main).await;
        let branch_section = self.locks.enter(task, ScopeKey::Branch(branch)).await;
        vec![main, branch_section]
    }

    async fn load(&self, id: TaskId) -> LifecycleResult<Task> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(LifecycleError::TaskNotFound(id))
    }

    /// Returns a task.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::TaskNotFound`] for an unknown task.
    pub async fn task(&self, id: TaskId) -> LifecycleResult<Task> {
        self.load(id).await
    }

    /// Returns log entries matching `filter` in append order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::TaskNotFound`] for an unknown task.
    pub async fn query(&self, id: TaskId, filter: &LogFilter) -> LifecycleResult<Vec<LogEntry>> {
        Ok(self.load(id).await?.log().query(filter))
    }

    /// Returns the next gate of the task's main sequence, or `None` when
    /// the workflow is complete.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] for an unknown task or workflow.
    pub async fn next_expected(&self, id: TaskId) -> LifecycleResult<Option<GateId>> {
        let task = self.load(id).await?;
        let registry = self.registry.current();
        let template = registry.workflow(task.workflow())?;
        Ok(GateSequencer::new(template)
            .next_expected(&task)
            .map(|gate| gate.name().clone()))
    }

    /// Renders a task and its log in the text representation.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::TaskNotFound`] for an unknown task.
    pub async fn export(&self, id: TaskId) -> LifecycleResult<String> {
        Ok(format::render_task(&self.load(id).await?))
    }

    /// Parses a task from the text representation, checks its log against
    /// the workflow, and stores it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Format`] for malformed text,
    /// [`LifecycleError::Walk`] when the log is inconsistent with the
    /// workflow or the recorded state, or a store error for duplicates.
    #[instrument(skip(self, text))]
    pub async fn import(&self, text: &str) -> LifecycleResult<Task> {
        let task = Task::from_persisted(format::parse_task(text)?);
        let registry = self.registry.current();
        let template = registry.workflow(task.workflow())?;
        let derived = task.log().verify_walk(template)?;
        if &derived != task.state() {
            return Err(WalkError::StateMismatch {
                recorded: task.state().clone(),
                derived,
            }
            .into());
        }
        self.store.create(&task).await?;
        info!(task = %task.id(), entries = task.log().len(), "task imported");
        Ok(task)
    }
}

fn plan_transition(
    sequencer: &GateSequencer<'_>,
    task: &Task,
    request: &ExecuteRequest,
) -> LifecycleResult<SequenceDecision> {
    sequencer
        .plan(task, &request.gate, request.mode, request.branch)
        .inspect_err(|err| warn!(error = %err, "transition out of sequence"))
        .map_err(LifecycleError::from)
}

/// Scope whose head a pinned request is checked against.
const fn pinned_scope(is_merge: bool, request: &ExecuteRequest) -> ScopeKey {
    match request.branch {
        Some(branch) if !is_merge => ScopeKey::Branch(branch),
        _ => ScopeKey::Main,
    }
}

fn check_pin(task: &Task, scope: ScopeKey, pin: Option<PinnedHead>) -> Result<(), ConflictError> {
    let Some(PinnedHead(head)) = pin else {
        return Ok(());
    };
    let expected = ScopeHead::new(scope, head);
    let actual = ScopeHead::observe(task, scope);
    if expected == actual {
        return Ok(());
    }
    let err = ConflictError::StaleHead {
        task: task.id(),
        expected,
        actual,
    };
    warn!(error = %err, "stale scope head");
    Err(err)
}

/// Fails when `scope` advanced between planning on `planned` and entering
/// the write section.
fn check_unchanged(planned: &Task, current: &Task, scope: ScopeKey) -> Result<(), ConflictError> {
    let expected = ScopeHead::observe(planned, scope);
    let actual = ScopeHead::observe(current, scope);
    if expected == actual {
        return Ok(());
    }
    let err = ConflictError::StaleHead {
        task: current.id(),
        expected,
        actual,
    };
    warn!(error = %err, "scope advanced while planning");
    Err(err)
}

fn downgrade_gaps(record: &mut TransitionRecord, gaps: Vec<Gap>) -> LifecycleResult<()> {
    if gaps.is_empty() {
        return Ok(());
    }
    let owner = OwnerId::new(record.persona.as_str())?;
    let due = record.recorded_at.date_naive();
    for gap in gaps {
        if let Gap::MissingInput(key) = &gap {
            record.follow_ups.push(FollowUp::new(
                format!("supply missing input {key}"),
                owner.clone(),
                due,
            ));
        }
        record.gaps.push(gap);
    }
    Ok(())
}
