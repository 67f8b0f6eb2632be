//! Workflow templates: a total order of gates over a linear state chain.

use super::{GateDefinition, GateId, MergeGateDefinition, RegistryError, StateName, WorkflowName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ordered gate template for one workflow type.
///
/// Gates form a single chain: the first gate starts at the initial state and
/// every following gate starts where its predecessor ends. Each state appears
/// at most once, so a state's position in the chain is well defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    name: WorkflowName,
    initial_state: StateName,
    gates: Vec<GateDefinition>,
    merge_gate: MergeGateDefinition,
    joinable_states: BTreeSet<StateName>,
}

impl WorkflowTemplate {
    /// Creates a validated workflow template.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the template has no gates, the chain is
    /// broken, a state repeats, a gate id repeats, the merge gate collides
    /// with a sequence gate, or a joinable state is not part of the chain.
    pub fn new(
        name: WorkflowName,
        initial_state: StateName,
        gates: Vec<GateDefinition>,
        merge_gate: MergeGateDefinition,
        joinable_states: BTreeSet<StateName>,
    ) -> Result<Self, RegistryError> {
        if gates.is_empty() {
            return Err(RegistryError::EmptyWorkflow(name));
        }

        let mut seen_states = BTreeSet::from([initial_state.clone()]);
        let mut seen_gates = BTreeSet::new();
        let mut expected_from = &initial_state;
        for gate in &gates {
            if gate.from_state() != expected_from {
                return Err(RegistryError::BrokenChain {
                    workflow: name,
                    gate: gate.name().clone(),
                    expected: expected_from.clone(),
                    found: gate.from_state().clone(),
                });
            }
            if !seen_states.insert(gate.to_state().clone()) {
                return Err(RegistryError::RepeatedState {
                    workflow: name,
                    state: gate.to_state().clone(),
                });
            }
            if !seen_gates.insert(gate.name().clone()) {
                return Err(RegistryError::DuplicateGate(gate.name().clone()));
            }
            expected_from = gate.to_state();
        }

        if seen_gates.contains(merge_gate.name()) {
            return Err(RegistryError::DuplicateGate(merge_gate.name().clone()));
        }
        if let Some(state) = joinable_states
            .iter()
            .find(|state| !seen_states.contains(*state))
        {
            return Err(RegistryError::UnknownJoinableState {
                workflow: name,
                state: state.clone(),
            });
        }

        let positioned = gates
            .into_iter()
            .enumerate()
            .map(|(position, gate)| {
                GateDefinition::new(
                    gate.name().clone(),
                    position,
                    gate.from_state().clone(),
                    gate.to_state().clone(),
                )
                .with_authorized_personas(gate.authorized_personas().iter().cloned())
                .with_required_inputs(gate.required_inputs().iter().cloned())
            })
            .collect();

        Ok(Self {
            name,
            initial_state,
            gates: positioned,
            merge_gate,
            joinable_states,
        })
    }

    /// Returns the workflow name.
    #[must_use]
    pub const fn name(&self) -> &WorkflowName {
        &self.name
    }

    /// Returns the state new tasks start in.
    #[must_use]
    pub const fn initial_state(&self) -> &StateName {
        &self.initial_state
    }

    /// Returns the gates in template order.
    #[must_use]
    pub fn gates(&self) -> &[GateDefinition] {
        &self.gates
    }

    /// Returns the designated merge gate.
    #[must_use]
    pub const fn merge_gate(&self) -> &MergeGateDefinition {
        &self.merge_gate
    }

    /// Returns the states a branch may be merged from.
    #[must_use]
    pub const fn joinable_states(&self) -> &BTreeSet<StateName> {
        &self.joinable_states
    }

    /// Returns every state in chain order, starting with the initial state.
    #[must_use]
    pub fn states(&self) -> Vec<&StateName> {
        std::iter::once(&self.initial_state)
            .chain(self.gates.iter().map(GateDefinition::to_state))
            .collect()
    }

    /// Returns the final state of the chain.
    #[must_use]
    pub fn terminal_state(&self) -> &StateName {
        self.gates
            .last()
            .map_or(&self.initial_state, GateDefinition::to_state)
    }

    /// Looks up a sequence gate by identifier.
    #[must_use]
    pub fn gate(&self, name: &GateId) -> Option<&GateDefinition> {
        self.gates.iter().find(|gate| gate.name() == name)
    }

    /// Returns the gate that leaves `state`, or `None` for the terminal state
    /// and for states outside the template.
    #[must_use]
    pub fn gate_from(&self, state: &StateName) -> Option<&GateDefinition> {
        self.gates.iter().find(|gate| gate.from_state() == state)
    }

    /// Returns the chain position of `state`.
    #[must_use]
    pub fn position_of_state(&self, state: &StateName) -> Option<usize> {
        self.states().iter().position(|candidate| *candidate == state)
    }

    /// Returns `true` when `state` belongs to the template.
    #[must_use]
    pub fn contains_state(&self, state: &StateName) -> bool {
        self.position_of_state(state).is_some()
    }

    /// Returns `true` when `gate` is the template's merge gate.
    #[must_use]
    pub fn is_merge_gate(&self, gate: &GateId) -> bool {
        self.merge_gate.name() == gate
    }

    /// Returns `true` when a branch sitting in `state` may be merged.
    #[must_use]
    pub fn is_joinable(&self, state: &StateName) -> bool {
        self.joinable_states.contains(state)
    }

    /// Returns the required input keys for a sequence or merge gate.
    #[must_use]
    pub fn required_inputs_for(&self, gate: &GateId) -> Option<&[String]> {
        if self.is_merge_gate(gate) {
            return Some(self.merge_gate.required_inputs());
        }
        self.gate(gate).map(GateDefinition::required_inputs)
    }

    /// Returns `true` when moving from `from` to `to` follows the chain
    /// forwards (adjacent or skipping ahead).
    #[must_use]
    pub fn is_forward(&self, from: &StateName, to: &StateName) -> bool {
        match (self.position_of_state(from), self.position_of_state(to)) {
            (Some(from_position), Some(to_position)) => to_position > from_position,
            _ => false,
        }
    }
}
