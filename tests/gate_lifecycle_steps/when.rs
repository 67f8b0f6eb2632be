//! When steps for gate lifecycle BDD scenarios.

use super::world::{GateLifecycleWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;
use stagegate::lifecycle::services::CompactionCutoff;

#[when("the request is executed")]
fn execute_request(world: &mut GateLifecycleWorld) -> Result<(), eyre::Report> {
    let request = world
        .pending_request
        .take()
        .ok_or_else(|| eyre::eyre!("missing pending request in scenario world"))?;
    let result = run_async(world.engine.execute(request));
    if let Ok(ref outcome) = result {
        world.task = Some(outcome.task().clone());
    }
    world.last_result = Some(result);
    Ok(())
}

#[when("the log is compacted keeping the last {keep:usize} transitions")]
fn compact_keeping_last(world: &mut GateLifecycleWorld, keep: usize) -> Result<(), eyre::Report> {
    let id = world.task()?.id();
    let span = run_async(world.manager.compact(id, CompactionCutoff::KeepLast(keep)))
        .wrap_err("compact task log")?
        .ok_or_else(|| eyre::eyre!("compaction found nothing to archive"))?;
    let task = run_async(world.engine.task(id)).wrap_err("reload compacted task")?;
    world.task = Some(task);
    world.last_compaction = Some(span);
    Ok(())
}
