//! Lifecycle log queries, branch derivation, and walk verification.

use super::support::{
    Harness, advance_through, complete, create_task, gate, harness, outcome_task, persona,
};
use crate::lifecycle::domain::{
    BranchFilter, LifecycleLog, LogEntry, LogFilter, SequenceNumber, TransitionMode, WalkError,
};
use crate::registry::domain::StateName;
use rstest::rstest;

fn state(raw: &str) -> StateName {
    StateName::new(raw).expect("valid state")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sequence_numbers_are_dense_and_increasing(harness: Harness) {
    let created = create_task(&harness).await;
    let task = advance_through(&harness, created.id(), "code.implement").await;

    let sequences: Vec<u64> = task
        .log()
        .entries()
        .iter()
        .map(|entry| entry.sequence().value())
        .collect();

    assert_eq!(sequences, vec![1, 2, 3, 4]);
    assert_eq!(task.log().last_sequence(), SequenceNumber::new(4));
    assert_eq!(task.state(), &state("BUILT"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn query_filters_by_gate_persona_and_time(harness: Harness) {
    let created = create_task(&harness).await;
    let task = advance_through(&harness, created.id(), "code.implement").await;
    let log = task.log();

    let by_gate = log.query(&LogFilter::new().for_gate(gate("tech.plan")));
    assert_eq!(by_gate.len(), 1);
    assert_eq!(by_gate.first().map(LogEntry::sequence), Some(SequenceNumber::new(3)));

    let by_persona = log.query(&LogFilter::new().by_persona(persona("product-ops")));
    assert_eq!(by_persona.len(), 2);

    let second = log
        .entries()
        .get(1)
        .map(LogEntry::recorded_at)
        .expect("second entry exists");
    let fourth = log
        .entries()
        .get(3)
        .map(LogEntry::recorded_at)
        .expect("fourth entry exists");
    let window: Vec<u64> = log
        .query(&LogFilter::new().between(second, fourth))
        .iter()
        .map(|entry| entry.sequence().value())
        .collect();
    assert_eq!(window, vec![2, 3]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn branch_entries_are_separated_from_the_main_sequence(harness: Harness) {
    let created = create_task(&harness).await;
    let task = advance_through(&harness, created.id(), "tech.plan").await;
    let forked = harness
        .engine
        .execute(complete(
            &harness,
            task.id(),
            "code.implement",
            TransitionMode::Branch,
        ))
        .await
        .map(outcome_task)
        .expect("fork is accepted");

    let statuses = forked.log().branches();
    let status = statuses.first().expect("one branch");
    assert_eq!(status.fork_state, state("PLANNED"));
    assert_eq!(status.state, state("BUILT"));
    assert_eq!(status.transitions, 1);
    assert!(!status.merged);
    assert_eq!(forked.state(), &state("PLANNED"));

    let main = forked.log().query(&LogFilter::new().in_branch(BranchFilter::Main));
    let branch = forked
        .log()
        .query(&LogFilter::new().in_branch(BranchFilter::Branch(status.branch)));
    assert_eq!(main.len(), 3);
    assert_eq!(branch.len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn engine_built_logs_walk_to_the_task_state(harness: Harness) {
    let created = create_task(&harness).await;
    let task = advance_through(&harness, created.id(), "qa.plan").await;
    let registry = harness.registry.current();
    let template = registry.workflow(task.workflow()).expect("workflow exists");

    let derived = task.log().verify_walk(template).expect("log is connected");

    assert_eq!(&derived, task.state());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn disconnected_entry_breaks_the_walk(harness: Harness) {
    let created = create_task(&harness).await;
    let task = advance_through(&harness, created.id(), "tech.plan").await;
    let registry = harness.registry.current();
    let template = registry.workflow(task.workflow()).expect("workflow exists");

    let entries: Vec<LogEntry> = task
        .log()
        .entries()
        .iter()
        .cloned()
        .map(|entry| match entry {
            LogEntry::Transition(mut record) if record.sequence == SequenceNumber::new(3) => {
                record.from_state = state("DISCOVERY");
                LogEntry::Transition(record)
            }
            other => other,
        })
        .collect();
    let tampered = LifecycleLog::from_entries(entries);

    assert_eq!(
        tampered.verify_walk(template),
        Err(WalkError::Disconnected {
            sequence: SequenceNumber::new(3),
            expected: state("REQUIREMENTS_READY"),
            found: state("DISCOVERY"),
        })
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn backward_entry_leaves_the_template(harness: Harness) {
    let created = create_task(&harness).await;
    let task = advance_through(&harness, created.id(), "product.prd").await;
    let registry = harness.registry.current();
    let template = registry.workflow(task.workflow()).expect("workflow exists");

    let mut entries = task.log().entries().to_vec();
    if let Some(LogEntry::Transition(record)) = entries.last_mut() {
        record.to_state = state("DRAFT");
    }
    let tampered = LifecycleLog::from_entries(entries);

    assert!(matches!(
        tampered.verify_walk(template),
        Err(WalkError::OutOfTemplate { .. })
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn entries_are_reordered_by_sequence_on_rebuild(harness: Harness) {
    let created = create_task(&harness).await;
    let task = advance_through(&harness, created.id(), "tech.plan").await;

    let mut entries = task.log().entries().to_vec();
    entries.reverse();
    let rebuilt = LifecycleLog::from_entries(entries);

    assert_eq!(&rebuilt, task.log());
}
