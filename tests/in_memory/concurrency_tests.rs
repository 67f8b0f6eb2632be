//! Racing writers against one task and independent writers across tasks.

use std::sync::Arc;

use crate::in_memory::helpers::{
    TestEngine, complete_request, engine, new_task, registry, run_through,
};
use rstest::rstest;
use stagegate::lifecycle::{
    domain::{ScopeKey, SequenceNumber, TransitionMode},
    services::{ConflictError, LifecycleError},
};
use stagegate::registry::RegistryHandle;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn racing_appends_on_one_head_accept_exactly_one(
    engine: TestEngine,
    registry: Arc<RegistryHandle>,
) {
    let created = new_task(&engine).await;
    let planned = run_through(&engine, &registry, created.id(), "tech.plan").await;
    let head = planned.log().scope_head(ScopeKey::Main);
    let request = complete_request(
        &registry,
        created.id(),
        "code.implement",
        TransitionMode::Strict,
    )
    .with_expected_head(head);

    let first = tokio::spawn({
        let racer = engine.clone();
        let pinned = request.clone();
        async move { racer.execute(pinned).await }
    });
    let second = tokio::spawn({
        let racer = engine.clone();
        async move { racer.execute(request).await }
    });
    let results = [
        first.await.expect("first racer joins"),
        second.await.expect("second racer joins"),
    ];

    let accepted = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(accepted, 1, "exactly one racer wins: {results:?}");
    assert!(results.iter().any(|result| matches!(
        result,
        Err(LifecycleError::Conflict(
            ConflictError::Busy { .. } | ConflictError::StaleHead { .. }
        ))
    )));

    let stored = engine.task(created.id()).await.expect("task exists");
    assert_eq!(stored.state().as_str(), "BUILT");
    assert_eq!(stored.log().last_sequence(), SequenceNumber::new(4));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn independent_tasks_advance_in_parallel(
    engine: TestEngine,
    registry: Arc<RegistryHandle>,
) {
    let first = new_task(&engine).await;
    let second = new_task(&engine).await;

    let handles: Vec<_> = [first.id(), second.id()]
        .into_iter()
        .map(|id| {
            let racer = engine.clone();
            let request = complete_request(
                &registry,
                id,
                "product.discovery",
                TransitionMode::Strict,
            );
            tokio::spawn(async move { racer.execute(request).await })
        })
        .collect();
    for handle in handles {
        let outcome = handle
            .await
            .expect("writer joins")
            .expect("independent tasks never conflict");
        assert_eq!(outcome.task().state().as_str(), "DISCOVERY");
    }
}
