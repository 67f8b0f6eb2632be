//! Registry configuration versions as seen by the engine.

use std::sync::Arc;

use crate::in_memory::helpers::{engine_over, new_task, registry, run_through};
use rstest::rstest;
use stagegate::lifecycle::{
    adapters::memory::InMemoryLifecycleStore,
    domain::{Evidence, TransitionMode},
    services::{CreateTaskRequest, ExecuteRequest, LifecycleError},
};
use stagegate::registry::{
    Registry, RegistryHandle,
    domain::{GateId, PersonaId, RegistryError},
};

const BUNDLED: &str = include_str!("../../src/registry/default_registry.toml");

fn next_version() -> Registry {
    let document = BUNDLED
        .replacen(r#"version = "2026.10.0""#, r#"version = "2026.11.0""#, 1)
        .replacen(
            r#"capabilities = ["code.implement"]"#,
            r#"capabilities = ["code.implement", "code.review"]"#,
            1,
        )
        .replacen(
            r#"domains = ["payments", "onboarding", "platform", "growth"]"#,
            r#"domains = ["payments", "onboarding", "platform", "growth", "risk"]"#,
            1,
        );
    Registry::from_toml_str(&document).expect("amended registry loads")
}

fn review_by_engineer(task: stagegate::lifecycle::domain::TaskId) -> ExecuteRequest {
    ExecuteRequest::new(
        task,
        GateId::new("code.review").expect("valid gate"),
        PersonaId::new("engineer").expect("valid persona"),
        TransitionMode::Strict,
    )
    .with_why("peer review while the lead is away")
    .with_summary("approved with nits")
    .with_input("review", "reviews/42.md")
    .with_evidence(Evidence::new("review", "approved", "reviews/42.md"))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn requests_after_a_reload_see_the_new_capabilities(registry: Arc<RegistryHandle>) {
    let engine = engine_over(
        Arc::new(InMemoryLifecycleStore::new()),
        Arc::clone(&registry),
    );
    let created = new_task(&engine).await;
    run_through(&engine, &registry, created.id(), "code.implement").await;

    let before = engine.execute(review_by_engineer(created.id())).await;
    assert!(matches!(before, Err(LifecycleError::Authorization(_))));

    registry.reload(next_version()).expect("new version installs");
    assert_eq!(registry.current().version(), "2026.11.0");

    let after = engine
        .execute(review_by_engineer(created.id()))
        .await
        .expect("engineer may now review");
    assert_eq!(after.task().state().as_str(), "REVIEWED");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reload_widens_the_domain_glossary(registry: Arc<RegistryHandle>) {
    let engine = engine_over(
        Arc::new(InMemoryLifecycleStore::new()),
        Arc::clone(&registry),
    );
    let request = || CreateTaskRequest::new("risk", "carol", "Fraud score thresholds.");

    let rejected = engine.create_task(request()).await;
    assert!(rejected.is_err(), "risk is not a glossary domain yet");

    registry.reload(next_version()).expect("new version installs");
    let created = engine
        .create_task(request())
        .await
        .expect("risk is a glossary domain now");
    assert_eq!(created.domain().as_str(), "risk");
}

#[rstest]
fn reloading_the_active_version_is_refused(registry: Arc<RegistryHandle>) {
    let same = Registry::bundled().expect("bundled registry loads");

    let result = registry.reload(same);

    assert!(matches!(
        result,
        Err(RegistryError::VersionAlreadyLoaded(version)) if version == "2026.10.0"
    ));
    assert_eq!(registry.current().version(), "2026.10.0");
}
