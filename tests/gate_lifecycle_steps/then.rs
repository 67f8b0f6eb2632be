//! Then steps for gate lifecycle BDD scenarios.

use super::world::{GateLifecycleWorld, run_async};
use rstest_bdd_macros::then;
use stagegate::lifecycle::domain::{LogEntry, RiskEntry};
use stagegate::lifecycle::sequencer::SequencingError;
use stagegate::lifecycle::services::{ArchivedSpan, ExecuteOutcome, LifecycleError};

fn last_outcome(world: &GateLifecycleWorld) -> Result<&ExecuteOutcome, eyre::Report> {
    match world.last_result.as_ref() {
        Some(Ok(outcome)) => Ok(outcome),
        Some(Err(err)) => Err(eyre::eyre!("expected an outcome, got error: {err}")),
        None => Err(eyre::eyre!("missing execute result")),
    }
}

fn last_compaction(world: &GateLifecycleWorld) -> Result<&ArchivedSpan, eyre::Report> {
    world
        .last_compaction
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing compaction result"))
}

#[then("the transition is accepted")]
fn transition_accepted(world: &GateLifecycleWorld) -> Result<(), eyre::Report> {
    let outcome = last_outcome(world)?;
    let ExecuteOutcome::Transitioned { record, .. } = outcome else {
        return Err(eyre::eyre!("expected an accepted transition, got {outcome:?}"));
    };
    let stored = outcome
        .task()
        .log()
        .entries()
        .last()
        .and_then(LogEntry::as_transition)
        .ok_or_else(|| eyre::eyre!("log does not end with the accepted record"))?;
    if stored != record {
        return Err(eyre::eyre!("appended record differs from the returned one"));
    }
    Ok(())
}

#[then(r#"the task state is "{state}""#)]
fn task_state_is(world: &GateLifecycleWorld, state: String) -> Result<(), eyre::Report> {
    let task = world.task()?;
    if task.state().as_str() != state {
        return Err(eyre::eyre!("expected state {state}, found {}", task.state()));
    }
    Ok(())
}

#[then(r#"the request fails with a sequencing error expecting "{gate}""#)]
fn sequencing_error_expecting(
    world: &GateLifecycleWorld,
    gate: String,
) -> Result<(), eyre::Report> {
    let result = world
        .last_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing execute result"))?;
    let Err(LifecycleError::Sequencing(SequencingError::OutOfOrder { expected, .. })) = result
    else {
        return Err(eyre::eyre!("expected an out-of-order error, got {result:?}"));
    };
    if expected.as_str() != gate {
        return Err(eyre::eyre!("expected gate {gate} to be named, got {expected}"));
    }
    Ok(())
}

#[then(r#"the request is blocked on "{key}""#)]
fn request_blocked_on(world: &GateLifecycleWorld, key: String) -> Result<(), eyre::Report> {
    let outcome = last_outcome(world)?;
    let ExecuteOutcome::Blocked { record, .. } = outcome else {
        return Err(eyre::eyre!("expected a BLOCKED outcome, got {outcome:?}"));
    };
    if record.missing_inputs != [key.clone()] {
        return Err(eyre::eyre!(
            "expected missing inputs [{key}], got {:?}",
            record.missing_inputs
        ));
    }
    Ok(())
}

#[then(r#"the unblock steps read "{step}""#)]
fn unblock_steps_read(world: &GateLifecycleWorld, step: String) -> Result<(), eyre::Report> {
    let outcome = last_outcome(world)?;
    let ExecuteOutcome::Blocked { record, .. } = outcome else {
        return Err(eyre::eyre!("expected a BLOCKED outcome, got {outcome:?}"));
    };
    if record.unblock_steps != [step.clone()] {
        return Err(eyre::eyre!(
            "expected unblock steps [{step}], got {:?}",
            record.unblock_steps
        ));
    }
    Ok(())
}

#[then("the log holds {summaries:usize} summary followed by {records:usize} transition records")]
fn log_shape(
    world: &GateLifecycleWorld,
    summaries: usize,
    records: usize,
) -> Result<(), eyre::Report> {
    let entries = world.task()?.log().entries();
    let (head, tail) = entries
        .split_at_checked(summaries)
        .ok_or_else(|| eyre::eyre!("log has only {} entries", entries.len()))?;
    if !head.iter().all(|entry| entry.as_compacted().is_some()) {
        return Err(eyre::eyre!("log does not start with {summaries} summaries"));
    }
    if tail.len() != records || !tail.iter().all(|entry| entry.as_transition().is_some()) {
        return Err(eyre::eyre!(
            "expected {records} transition records after the summary, got {tail:?}"
        ));
    }
    Ok(())
}

#[then("the summary's open risks are the union of the {count:usize} archived records' risks")]
fn summary_risks_are_union(world: &GateLifecycleWorld, count: usize) -> Result<(), eyre::Report> {
    let span = last_compaction(world)?;
    let archived: Vec<_> = span
        .entries
        .iter()
        .filter_map(LogEntry::as_transition)
        .collect();
    if archived.len() != count {
        return Err(eyre::eyre!(
            "expected {count} archived records, got {}",
            archived.len()
        ));
    }

    let mut union: Vec<RiskEntry> = Vec::new();
    for risk in archived.iter().flat_map(|record| record.open_risks()) {
        if !union.contains(risk) {
            union.push(risk.clone());
        }
    }
    if union.len() != count || span.summary.open_risks != union {
        return Err(eyre::eyre!(
            "summary risks {:?} differ from archived union {union:?}",
            span.summary.open_risks
        ));
    }
    Ok(())
}

#[then("the archived records can be read back from the archive")]
fn archived_records_read_back(world: &GateLifecycleWorld) -> Result<(), eyre::Report> {
    let span = last_compaction(world)?;
    let entries = run_async(world.manager.archived_entries(&span.summary.archive))?;
    if entries != span.entries {
        return Err(eyre::eyre!("archive returned different entries"));
    }
    Ok(())
}
