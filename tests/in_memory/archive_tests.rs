//! Compaction into a directory-backed archive.

use std::sync::Arc;

use crate::in_memory::helpers::{
    complete_request, engine_over, manager_for, new_task, registry, run_through,
};
use camino::Utf8PathBuf;
use rstest::rstest;
use stagegate::lifecycle::{
    adapters::{fs::DirArchiveStore, memory::InMemoryLifecycleStore},
    domain::TransitionMode,
    services::CompactionCutoff,
};
use stagegate::registry::RegistryHandle;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn compacted_span_survives_in_the_archive_directory(registry: Arc<RegistryHandle>) {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(temp.path().join("segments")).expect("utf-8 path");
    let store = Arc::new(InMemoryLifecycleStore::new());
    let engine = engine_over(Arc::clone(&store), Arc::clone(&registry));
    let archive = Arc::new(DirArchiveStore::open(&root).expect("archive opens"));
    let manager = manager_for(
        &engine,
        Arc::clone(&store),
        archive,
        Arc::clone(&registry),
    );
    let created = new_task(&engine).await;
    run_through(&engine, &registry, created.id(), "code.review").await;

    let span = manager
        .compact(created.id(), CompactionCutoff::KeepLast(1))
        .await
        .expect("compaction succeeds")
        .expect("four records are archived");

    assert_eq!(span.entries.len(), 4);
    assert_eq!(span.summary.final_state.as_str(), "BUILT");
    assert!(
        root.join(format!("{}.json", span.summary.archive.segment))
            .exists()
    );

    let reopened = manager_for(
        &engine,
        Arc::clone(&store),
        Arc::new(DirArchiveStore::open(&root).expect("archive reopens")),
        Arc::clone(&registry),
    );
    let read_back = reopened
        .archived_entries(&span.summary.archive)
        .await
        .expect("segment reads back");
    assert_eq!(read_back, span.entries);

    let snapshot = reopened
        .snapshot(created.id())
        .await
        .expect("snapshot derives");
    assert_eq!(snapshot.state.as_str(), "REVIEWED");
    assert_eq!(snapshot.archives, vec![span.summary.archive.clone()]);
    assert_eq!(snapshot.open_risks.len(), 5);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_compaction_folds_the_first_summary(registry: Arc<RegistryHandle>) {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 path");
    let store = Arc::new(InMemoryLifecycleStore::new());
    let engine = engine_over(Arc::clone(&store), Arc::clone(&registry));
    let manager = manager_for(
        &engine,
        Arc::clone(&store),
        Arc::new(DirArchiveStore::open(&root).expect("archive opens")),
        Arc::clone(&registry),
    );
    let created = new_task(&engine).await;
    run_through(&engine, &registry, created.id(), "tech.plan").await;
    let first = manager
        .compact(created.id(), CompactionCutoff::KeepLast(1))
        .await
        .expect("first compaction succeeds")
        .expect("two records are archived");

    engine
        .execute(complete_request(
            &registry,
            created.id(),
            "code.implement",
            TransitionMode::Strict,
        ))
        .await
        .expect("code.implement is accepted");
    let second = manager
        .compact(created.id(), CompactionCutoff::KeepLast(1))
        .await
        .expect("second compaction succeeds")
        .expect("summary and records are archived");

    assert_eq!(second.summary.from_state.as_str(), "DRAFT");
    assert!(
        second
            .entries
            .iter()
            .any(|entry| entry.as_compacted() == Some(&first.summary))
    );
    let task = engine.task(created.id()).await.expect("task exists");
    assert_eq!(task.log().len(), 2);
    assert_eq!(task.state().as_str(), "BUILT");
}
