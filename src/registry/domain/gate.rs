//! Gate definitions for workflow templates.

use super::{GateId, PersonaId, StateName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A checkpoint in a workflow template's ordered gate sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDefinition {
    name: GateId,
    position: usize,
    from_state: StateName,
    to_state: StateName,
    authorized_personas: BTreeSet<PersonaId>,
    required_inputs: Vec<String>,
}

impl GateDefinition {
    /// Creates a gate at `position` moving a task from `from_state` to
    /// `to_state`.
    #[must_use]
    pub const fn new(
        name: GateId,
        position: usize,
        from_state: StateName,
        to_state: StateName,
    ) -> Self {
        Self {
            name,
            position,
            from_state,
            to_state,
            authorized_personas: BTreeSet::new(),
            required_inputs: Vec::new(),
        }
    }

    /// Sets the personas authorized to execute the gate.
    #[must_use]
    pub fn with_authorized_personas(
        mut self,
        personas: impl IntoIterator<Item = PersonaId>,
    ) -> Self {
        self.authorized_personas = personas.into_iter().collect();
        self
    }

    /// Sets the input keys a transition through this gate must supply.
    #[must_use]
    pub fn with_required_inputs(mut self, inputs: impl IntoIterator<Item = String>) -> Self {
        self.required_inputs = inputs.into_iter().collect();
        self
    }

    /// Returns the gate identifier.
    #[must_use]
    pub const fn name(&self) -> &GateId {
        &self.name
    }

    /// Returns the zero-based position in the template order.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the state the gate starts from.
    #[must_use]
    pub const fn from_state(&self) -> &StateName {
        &self.from_state
    }

    /// Returns the state the gate leads to.
    #[must_use]
    pub const fn to_state(&self) -> &StateName {
        &self.to_state
    }

    /// Returns the personas authorized to execute the gate.
    #[must_use]
    pub const fn authorized_personas(&self) -> &BTreeSet<PersonaId> {
        &self.authorized_personas
    }

    /// Returns the required input keys in declaration order.
    #[must_use]
    pub fn required_inputs(&self) -> &[String] {
        &self.required_inputs
    }
}

/// The designated gate that folds a branch back into the main sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeGateDefinition {
    name: GateId,
    authorized_personas: BTreeSet<PersonaId>,
    required_inputs: Vec<String>,
}

impl MergeGateDefinition {
    /// Creates a merge gate definition.
    #[must_use]
    pub const fn new(name: GateId) -> Self {
        Self {
            name,
            authorized_personas: BTreeSet::new(),
            required_inputs: Vec::new(),
        }
    }

    /// Sets the personas authorized to merge branches.
    #[must_use]
    pub fn with_authorized_personas(
        mut self,
        personas: impl IntoIterator<Item = PersonaId>,
    ) -> Self {
        self.authorized_personas = personas.into_iter().collect();
        self
    }

    /// Sets the input keys a merge must supply.
    #[must_use]
    pub fn with_required_inputs(mut self, inputs: impl IntoIterator<Item = String>) -> Self {
        self.required_inputs = inputs.into_iter().collect();
        self
    }

    /// Returns the merge gate identifier.
    #[must_use]
    pub const fn name(&self) -> &GateId {
        &self.name
    }

    /// Returns the personas authorized to merge branches.
    #[must_use]
    pub const fn authorized_personas(&self) -> &BTreeSet<PersonaId> {
        &self.authorized_personas
    }

    /// Returns the required input keys in declaration order.
    #[must_use]
    pub fn required_inputs(&self) -> &[String] {
        &self.required_inputs
    }
}
