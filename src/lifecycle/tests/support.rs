//! Shared fixtures for lifecycle unit tests.

use crate::lifecycle::adapters::memory::{InMemoryArchiveStore, InMemoryLifecycleStore};
use crate::lifecycle::domain::{Evidence, OwnerId, RiskEntry, Task, TaskId, TransitionMode};
use crate::lifecycle::services::{
    ContextSnapshotManager, CreateTaskRequest, ExecuteOutcome, ExecuteRequest, LifecycleEngine,
};
use crate::registry::domain::{GateId, PersonaId};
use crate::registry::{Registry, RegistryHandle};
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use rstest::fixture;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Clock that moves one second forward on every reading.
#[derive(Debug)]
pub struct SteppingClock {
    start: DateTime<Utc>,
    ticks: AtomicI64,
}

impl SteppingClock {
    pub fn new() -> Self {
        Self {
            start: Utc
                .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
                .single()
                .expect("valid start instant"),
            ticks: AtomicI64::new(0),
        }
    }

    /// Returns the instant the next reading will produce.
    pub fn peek(&self) -> DateTime<Utc> {
        self.start + Duration::seconds(self.ticks.load(Ordering::SeqCst))
    }
}

impl Clock for SteppingClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.start + Duration::seconds(tick)
    }
}

pub type TestEngine = LifecycleEngine<InMemoryLifecycleStore, SteppingClock>;
pub type TestManager =
    ContextSnapshotManager<InMemoryLifecycleStore, InMemoryArchiveStore, SteppingClock>;

pub struct Harness {
    pub engine: TestEngine,
    pub manager: TestManager,
    pub store: Arc<InMemoryLifecycleStore>,
    pub archive: Arc<InMemoryArchiveStore>,
    pub clock: Arc<SteppingClock>,
    pub registry: Arc<RegistryHandle>,
}

#[fixture]
pub fn harness() -> Harness {
    let store = Arc::new(InMemoryLifecycleStore::new());
    let archive = Arc::new(InMemoryArchiveStore::new());
    let clock = Arc::new(SteppingClock::new());
    let registry = Arc::new(RegistryHandle::new(
        Registry::bundled().expect("bundled registry is valid"),
    ));
    let engine = LifecycleEngine::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        Arc::clone(&clock),
    );
    let manager = ContextSnapshotManager::new(
        Arc::clone(&store),
        Arc::clone(&archive),
        Arc::clone(&registry),
        Arc::clone(&clock),
        engine.locks().clone(),
    );
    Harness {
        engine,
        manager,
        store,
        archive,
        clock,
        registry,
    }
}

pub fn gate(raw: &str) -> GateId {
    GateId::new(raw).expect("valid gate")
}

pub fn persona(raw: &str) -> PersonaId {
    PersonaId::new(raw).expect("valid persona")
}

pub fn owner(raw: &str) -> OwnerId {
    OwnerId::new(raw).expect("valid owner")
}

/// Persona of the bundled registry allowed to run `gate`.
pub fn persona_for(gate_name: &str) -> &'static str {
    match gate_name {
        "product.discovery" | "product.prd" | "release.deliver" => "product-ops",
        "qa.plan" | "qa.contract" | "qa.e2e" => "qa",
        _ => "tech-lead",
    }
}

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

/// Builds a structurally complete request for `gate_name`.
pub fn complete(
    harness: &Harness,
    task: TaskId,
    gate_name: &str,
    mode: TransitionMode,
) -> ExecuteRequest {
    let registry = harness.registry.current();
    let template = registry
        .workflow(registry.default_workflow())
        .expect("default workflow exists");
    let requested = gate(gate_name);
    let required = template
        .required_inputs_for(&requested)
        .map(<[String]>::to_vec)
        .unwrap_or_default();
    let mut request = ExecuteRequest::new(task, requested, persona(persona_for(gate_name)), mode)
        .with_why(format!("{gate_name} is next"))
        .with_summary(format!("{gate_name} done"))
        .with_evidence(Evidence::new("review", "pass", format!("docs/{gate_name}.md")))
        .with_risk(
            RiskEntry::new(format!("{gate_name} slips"))
                .with_owner(owner("alice"))
                .with_mitigation("weekly check-in"),
        );
    for key in required {
        let value = format!("docs/{key}.md");
        request = request.with_input(key, value);
    }
    request
}

pub async fn create_task(harness: &Harness) -> Task {
    harness
        .engine
        .create_task(CreateTaskRequest::new(
            "payments",
            "alice",
            "Refund flow for card payments.",
        ))
        .await
        .expect("task creation should succeed")
}

/// Runs every delivery gate up to and including `last` in strict mode.
pub async fn advance_through(harness: &Harness, task: TaskId, last: &str) -> Task {
    let mut current = None;
    for gate_name in DELIVERY {
        let outcome = harness
            .engine
            .execute(complete(harness, task, gate_name, TransitionMode::Strict))
            .await
            .expect("strict transition should succeed");
        assert!(!outcome.is_blocked(), "{gate_name} should not block");
        current = Some(outcome_task(outcome));
        if gate_name == last {
            break;
        }
    }
    current.expect("at least one gate ran")
}

pub fn outcome_task(outcome: ExecuteOutcome) -> Task {
    match outcome {
        ExecuteOutcome::Transitioned { task, .. } | ExecuteOutcome::Blocked { task, .. } => task,
    }
}
