//! Given steps for gate lifecycle BDD scenarios.

use super::world::{GateLifecycleWorld, persona_for, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use stagegate::lifecycle::domain::{Evidence, TransitionMode};
use stagegate::lifecycle::services::{CreateTaskRequest, ExecuteRequest};
use stagegate::registry::domain::{GateId, PersonaId};

const MAIN_GATES: [&str; 9] = [
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

#[given(r#"a "{domain}" task in state "{state}""#)]
fn task_in_state(
    world: &mut GateLifecycleWorld,
    domain: String,
    state: String,
) -> Result<(), eyre::Report> {
    let task = run_async(world.engine.create_task(CreateTaskRequest::new(
        domain,
        "alice",
        "Refund flow for card payments.",
    )))
    .wrap_err("create task for scenario")?;
    if task.state().as_str() != state {
        return Err(eyre::eyre!(
            "new task starts in {}, scenario expects {state}",
            task.state()
        ));
    }
    world.task = Some(task);
    Ok(())
}

#[given(r#"the task has passed gate "{gate}""#)]
fn task_passed_gate(world: &mut GateLifecycleWorld, gate: String) -> Result<(), eyre::Report> {
    let request = world.complete_request(&gate, persona_for(&gate), TransitionMode::Strict)?;
    world
        .execute_accepted(request)
        .wrap_err_with(|| format!("pass gate {gate} in scenario setup"))?;
    Ok(())
}

#[given(r#"the task has passed every gate through "{last}""#)]
fn task_passed_gates_through(
    world: &mut GateLifecycleWorld,
    last: String,
) -> Result<(), eyre::Report> {
    for gate in MAIN_GATES {
        let request = world.complete_request(gate, persona_for(gate), TransitionMode::Strict)?;
        world
            .execute_accepted(request)
            .wrap_err_with(|| format!("pass gate {gate} in scenario setup"))?;
        if gate == last {
            return Ok(());
        }
    }
    Err(eyre::eyre!("gate {last} is not part of the delivery workflow"))
}

/// Three main gates, a two-gate branch and its merge, then the remaining
/// four main gates: ten accepted transitions in all.
#[given("the task has ten accepted transitions including a merged branch")]
fn task_has_ten_transitions(world: &mut GateLifecycleWorld) -> Result<(), eyre::Report> {
    for gate in ["product.discovery", "product.prd", "tech.plan"] {
        let request = world.complete_request(gate, persona_for(gate), TransitionMode::Strict)?;
        world.execute_accepted(request)?;
    }

    let fork = world.complete_request("code.implement", "engineer", TransitionMode::Branch)?;
    let forked = world.execute_accepted(fork)?;
    let branch = forked
        .log()
        .branches()
        .first()
        .map(|status| status.branch)
        .ok_or_else(|| eyre::eyre!("fork did not open a branch"))?;
    let review = world
        .complete_request("code.review", "tech-lead", TransitionMode::Branch)?
        .in_branch(branch);
    world.execute_accepted(review)?;
    let merge = world
        .complete_request("branch.merge", "tech-lead", TransitionMode::Branch)?
        .in_branch(branch);
    world.execute_accepted(merge)?;

    for gate in ["qa.plan", "qa.contract", "qa.e2e", "release.deliver"] {
        let request = world.complete_request(gate, persona_for(gate), TransitionMode::Strict)?;
        world.execute_accepted(request)?;
    }

    let transitions = world
        .task()?
        .log()
        .entries()
        .iter()
        .filter(|entry| entry.as_transition().is_some())
        .count();
    if transitions != 10 {
        return Err(eyre::eyre!("expected 10 transitions, found {transitions}"));
    }
    Ok(())
}

#[given(r#"a "{mode}" request by "{persona}" for gate "{gate}""#)]
fn pending_request(
    world: &mut GateLifecycleWorld,
    mode: String,
    persona: String,
    gate: String,
) -> Result<(), eyre::Report> {
    let task = world.task()?;
    let parsed_mode = TransitionMode::try_from(mode.as_str())
        .map_err(|err| eyre::eyre!("invalid mode in scenario: {err}"))?;
    world.pending_request = Some(
        ExecuteRequest::new(
            task.id(),
            GateId::new(gate.as_str())?,
            PersonaId::new(persona)?,
            parsed_mode,
        )
        .with_why(format!("{gate} requested by the scenario"))
        .with_summary(format!("{gate} output")),
    );
    Ok(())
}

#[given(r#"the request cites input "{key}" as "{value}""#)]
fn request_cites_input(
    world: &mut GateLifecycleWorld,
    key: String,
    value: String,
) -> Result<(), eyre::Report> {
    let request = world
        .pending_request
        .take()
        .ok_or_else(|| eyre::eyre!("missing pending request in scenario world"))?;
    world.pending_request = Some(request.with_input(key, value));
    Ok(())
}

#[given(r#"the request carries evidence "{kind}" "{result}" "{reference}""#)]
fn request_carries_evidence(
    world: &mut GateLifecycleWorld,
    kind: String,
    result: String,
    reference: String,
) -> Result<(), eyre::Report> {
    let request = world
        .pending_request
        .take()
        .ok_or_else(|| eyre::eyre!("missing pending request in scenario world"))?;
    world.pending_request = Some(request.with_evidence(Evidence::new(kind, result, reference)));
    Ok(())
}

#[given(r#"the request carries evidence "{kind}" "{result}" without a reference"#)]
fn request_carries_unreferenced_evidence(
    world: &mut GateLifecycleWorld,
    kind: String,
    result: String,
) -> Result<(), eyre::Report> {
    let request = world
        .pending_request
        .take()
        .ok_or_else(|| eyre::eyre!("missing pending request in scenario world"))?;
    world.pending_request = Some(request.with_evidence(Evidence::new(kind, result, "")));
    Ok(())
}
