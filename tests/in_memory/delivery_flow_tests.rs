//! End-to-end delivery through the public engine API.

use std::sync::Arc;

use crate::in_memory::helpers::{
    TestEngine, complete_request, engine, engine_over, new_task, registry, run_through,
};
use rstest::rstest;
use stagegate::lifecycle::{
    adapters::memory::{InMemoryArchiveStore, InMemoryLifecycleStore},
    domain::{Gap, LogEntry, LogFilter, RecordScope, TransitionMode},
    services::{ContextSnapshotManager, ExecuteOutcome, LifecycleError},
};
use stagegate::registry::{RegistryHandle, domain::GateId};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn strict_delivery_reaches_the_terminal_state(
    engine: TestEngine,
    registry: Arc<RegistryHandle>,
) {
    let created = new_task(&engine).await;

    let delivered = run_through(&engine, &registry, created.id(), "release.deliver").await;

    assert_eq!(delivered.state().as_str(), "DELIVERED");
    assert_eq!(delivered.log().len(), 9);
    let current = registry.current();
    let template = current
        .workflow(delivered.workflow())
        .expect("workflow exists");
    assert_eq!(
        delivered
            .log()
            .verify_walk(template)
            .expect("log is a connected walk")
            .as_str(),
        "DELIVERED"
    );
    assert_eq!(
        engine
            .next_expected(created.id())
            .await
            .expect("task exists"),
        None
    );

    let after = engine
        .execute(complete_request(
            &registry,
            created.id(),
            "release.deliver",
            TransitionMode::Strict,
        ))
        .await;
    assert!(matches!(after, Err(LifecycleError::Sequencing(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tolerant_skip_is_recorded_as_a_permanent_gap(
    engine: TestEngine,
    registry: Arc<RegistryHandle>,
) {
    let created = new_task(&engine).await;
    run_through(&engine, &registry, created.id(), "product.discovery").await;

    let outcome = engine
        .execute(complete_request(
            &registry,
            created.id(),
            "tech.plan",
            TransitionMode::Tolerant,
        ))
        .await
        .expect("tolerant skip is accepted");
    let ExecuteOutcome::Transitioned { task, record } = outcome else {
        panic!("tolerant skip should not block");
    };

    assert_eq!(task.state().as_str(), "PLANNED");
    assert_eq!(
        record.gaps,
        vec![Gap::SkippedGate(GateId::new("product.prd").expect("valid gate"))]
    );

    let skipped_again = engine
        .execute(complete_request(
            &registry,
            created.id(),
            "product.prd",
            TransitionMode::Tolerant,
        ))
        .await;
    assert!(
        matches!(skipped_again, Err(LifecycleError::Sequencing(_))),
        "a skipped gate cannot be closed later: {skipped_again:?}"
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn query_filters_records_by_gate(engine: TestEngine, registry: Arc<RegistryHandle>) {
    let created = new_task(&engine).await;
    run_through(&engine, &registry, created.id(), "code.review").await;

    let reviews = engine
        .query(
            created.id(),
            &LogFilter::new().for_gate(GateId::new("code.review").expect("valid gate")),
        )
        .await
        .expect("query succeeds");

    assert_eq!(reviews.len(), 1);
    let Some(LogEntry::Transition(record)) = reviews.first() else {
        panic!("expected a transition record, got {reviews:?}");
    };
    assert_eq!(record.persona.as_str(), "tech-lead");
    assert_eq!(record.scope, RecordScope::Main);
    assert_eq!(record.to_state.as_str(), "REVIEWED");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn exported_task_imports_into_another_deployment(
    engine: TestEngine,
    registry: Arc<RegistryHandle>,
) {
    let created = new_task(&engine).await;
    let original = run_through(&engine, &registry, created.id(), "qa.plan").await;
    let text = engine.export(created.id()).await.expect("export succeeds");

    let store = Arc::new(InMemoryLifecycleStore::new());
    let other = engine_over(Arc::clone(&store), Arc::clone(&registry));
    let imported = other.import(&text).await.expect("import succeeds");

    assert_eq!(imported, original);
    assert_eq!(other.export(created.id()).await.expect("re-export"), text);

    let manager = ContextSnapshotManager::new(
        store,
        Arc::new(InMemoryArchiveStore::new()),
        registry,
        Arc::new(mockable::DefaultClock),
        other.locks().clone(),
    );
    let snapshot = manager
        .snapshot(created.id())
        .await
        .expect("snapshot derives");
    assert_eq!(snapshot.state.as_str(), "QA_READY");
    assert_eq!(
        snapshot.next_expected.map(|gate| gate.as_str().to_owned()),
        Some("qa.contract".to_owned())
    );
    assert_eq!(snapshot.open_risks.len(), 6);
}
