//! Shared fixtures and helpers for in-memory integration tests.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use stagegate::lifecycle::{
    adapters::memory::InMemoryLifecycleStore,
    domain::{Evidence, OwnerId, RiskEntry, Task, TaskId, TransitionMode},
    ports::ArchiveStore,
    services::{
        ContextSnapshotManager, CreateTaskRequest, ExecuteOutcome, ExecuteRequest,
        LifecycleEngine,
    },
};
use stagegate::registry::{
    Registry, RegistryHandle,
    domain::{GateId, PersonaId},
};

/// Engine type used across integration tests.
pub type TestEngine = LifecycleEngine<InMemoryLifecycleStore, DefaultClock>;

/// Gates of the bundled delivery workflow in template order.
pub const DELIVERY: [&str; 9] = [
    "product.discovery",
    "product.prd",
    "tech.plan",
    "code.implement",
    "code.review",
    "qa.plan",
    "qa.contract",
    "qa.e2e",
    "release.deliver",
];

/// Provides a handle on the bundled registry.
#[fixture]
pub fn registry() -> Arc<RegistryHandle> {
    Arc::new(RegistryHandle::new(
        Registry::bundled().expect("bundled registry loads"),
    ))
}

/// Provides an engine over a fresh in-memory store.
#[fixture]
pub fn engine(registry: Arc<RegistryHandle>) -> TestEngine {
    engine_over(Arc::new(InMemoryLifecycleStore::new()), registry)
}

/// Builds an engine over an existing store.
pub fn engine_over(
    store: Arc<InMemoryLifecycleStore>,
    registry: Arc<RegistryHandle>,
) -> TestEngine {
    LifecycleEngine::new(store, registry, Arc::new(DefaultClock))
}

/// Builds a snapshot manager sharing `engine`'s store handle and locks.
pub fn manager_for<A: ArchiveStore>(
    engine: &TestEngine,
    store: Arc<InMemoryLifecycleStore>,
    archive: Arc<A>,
    registry: Arc<RegistryHandle>,
) -> ContextSnapshotManager<InMemoryLifecycleStore, A, DefaultClock> {
    ContextSnapshotManager::new(
        store,
        archive,
        registry,
        Arc::new(DefaultClock),
        engine.locks().clone(),
    )
}

/// Persona of the bundled registry allowed to run `gate`.
pub fn persona_for(gate: &str) -> &'static str {
    match gate {
        "product.discovery" | "product.prd" | "release.deliver" => "product-ops",
        "qa.plan" | "qa.contract" | "qa.e2e" => "qa",
        _ => "tech-lead",
    }
}

/// Builds a structurally complete request for `gate`.
pub fn complete_request(
    registry: &RegistryHandle,
    task: TaskId,
    gate: &str,
    mode: TransitionMode,
) -> ExecuteRequest {
    let current = registry.current();
    let template = current
        .workflow(current.default_workflow())
        .expect("default workflow exists");
    let gate_id = GateId::new(gate).expect("valid gate");
    let required = template
        .required_inputs_for(&gate_id)
        .map(<[String]>::to_vec)
        .unwrap_or_default();
    let mut request = ExecuteRequest::new(
        task,
        gate_id,
        PersonaId::new(persona_for(gate)).expect("valid persona"),
        mode,
    )
    .with_why(format!("{gate} unblocks the next stage"))
    .with_summary(format!("{gate} complete"))
    .with_evidence(Evidence::new("review", "pass", format!("docs/{gate}.md")))
    .with_risk(
        RiskEntry::new(format!("{gate} needs a second reviewer"))
            .with_owner(OwnerId::new("bob").expect("valid owner"))
            .with_mitigation("pair on the review"),
    );
    for key in required {
        let value = format!("docs/{key}.md");
        request = request.with_input(key, value);
    }
    request
}

/// Creates a payments task on the default workflow.
pub async fn new_task(engine: &TestEngine) -> Task {
    engine
        .create_task(CreateTaskRequest::new(
            "payments",
            "bob",
            "Chargeback dispute intake.",
        ))
        .await
        .expect("task creation should succeed")
}

/// Runs every delivery gate up to and including `last` in strict mode.
pub async fn run_through(
    engine: &TestEngine,
    registry: &RegistryHandle,
    task: TaskId,
    last: &str,
) -> Task {
    let mut current = None;
    for gate in DELIVERY {
        let outcome = engine
            .execute(complete_request(registry, task, gate, TransitionMode::Strict))
            .await
            .expect("strict transition should succeed");
        let ExecuteOutcome::Transitioned { task: updated, .. } = outcome else {
            panic!("{gate} should be accepted");
        };
        current = Some(updated);
        if gate == last {
            break;
        }
    }
    current.expect("at least one gate ran")
}
