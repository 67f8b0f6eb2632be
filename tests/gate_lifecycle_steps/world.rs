//! Shared world state for gate lifecycle BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use stagegate::lifecycle::{
    adapters::memory::{InMemoryArchiveStore, InMemoryLifecycleStore},
    domain::{Evidence, OwnerId, RiskEntry, Task, TransitionMode},
    services::{
        ArchivedSpan, ContextSnapshotManager, ExecuteOutcome, ExecuteRequest, LifecycleEngine,
        LifecycleError,
    },
};
use stagegate::registry::{
    Registry, RegistryHandle,
    domain::{GateId, PersonaId},
};

/// Engine type used by the BDD world.
pub type TestEngine = LifecycleEngine<InMemoryLifecycleStore, DefaultClock>;

/// Snapshot manager type used by the BDD world.
pub type TestManager =
    ContextSnapshotManager<InMemoryLifecycleStore, InMemoryArchiveStore, DefaultClock>;

/// Scenario world for gate lifecycle behaviour tests.
pub struct GateLifecycleWorld {
    pub registry: Arc<RegistryHandle>,
    pub engine: TestEngine,
    pub manager: TestManager,
    pub task: Option<Task>,
    pub pending_request: Option<ExecuteRequest>,
    pub last_result: Option<Result<ExecuteOutcome, LifecycleError>>,
    pub last_compaction: Option<ArchivedSpan>,
}

impl GateLifecycleWorld {
    /// Creates a world backed by the bundled registry and in-memory stores.
    ///
    /// # Panics
    ///
    /// Panics when the bundled registry fails to load.
    #[must_use]
    pub fn new() -> Self {
        let registry = Arc::new(RegistryHandle::new(
            Registry::bundled().expect("bundled registry loads"),
        ));
        let store = Arc::new(InMemoryLifecycleStore::new());
        let clock = Arc::new(DefaultClock);
        let engine = LifecycleEngine::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&clock),
        );
        let manager = ContextSnapshotManager::new(
            store,
            Arc::new(InMemoryArchiveStore::new()),
            Arc::clone(&registry),
            clock,
            engine.locks().clone(),
        );

        Self {
            registry,
            engine,
            manager,
            task: None,
            pending_request: None,
            last_result: None,
            last_compaction: None,
        }
    }

    /// Returns the task under test.
    pub fn task(&self) -> Result<&Task, eyre::Report> {
        self.task
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing task in scenario world"))
    }

    /// Builds a structurally complete request for `gate` on the current
    /// task, supplying every input the bundled workflow requires.
    pub fn complete_request(
        &self,
        gate: &str,
        persona: &str,
        mode: TransitionMode,
    ) -> Result<ExecuteRequest, eyre::Report> {
        let task = self.task()?;
        let registry = self.registry.current();
        let template = registry.workflow(task.workflow())?;
        let gate_id = GateId::new(gate)?;
        let required = template
            .required_inputs_for(&gate_id)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        let mut request = ExecuteRequest::new(task.id(), gate_id, PersonaId::new(persona)?, mode)
            .with_why(format!("{gate} is the next checkpoint"))
            .with_summary(format!("{gate} signed off"))
            .with_evidence(Evidence::new("review", "approved", format!("docs/{gate}.md")))
            .with_risk(
                RiskEntry::new(format!("{gate} slips"))
                    .with_owner(OwnerId::new("alice")?)
                    .with_mitigation("raise at stand-up"),
            );
        for key in required {
            let value = format!("docs/{key}.md");
            request = request.with_input(key, value);
        }
        Ok(request)
    }

    /// Executes `request` and records the resulting task.
    pub fn execute_accepted(&mut self, request: ExecuteRequest) -> Result<Task, eyre::Report> {
        let outcome = run_async(self.engine.execute(request))?;
        let ExecuteOutcome::Transitioned { task, .. } = outcome else {
            return Err(eyre::eyre!("expected an accepted transition, got {outcome:?}"));
        };
        self.task = Some(task.clone());
        Ok(task)
    }
}

impl Default for GateLifecycleWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> GateLifecycleWorld {
    GateLifecycleWorld::default()
}

/// Persona of the bundled registry allowed to run `gate`.
#[must_use]
pub fn persona_for(gate: &str) -> &'static str {
    match gate {
        "product.discovery" | "product.prd" | "release.deliver" => "product-ops",
        "qa.plan" | "qa.contract" | "qa.e2e" => "qa",
        _ => "tech-lead",
    }
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
