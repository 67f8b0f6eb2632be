//! Persona capability definitions.

use super::{GateId, PersonaId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An actor role and the gates (skills) it may execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    id: PersonaId,
    description: Option<String>,
    capabilities: BTreeSet<GateId>,
}

impl Persona {
    /// Creates a persona with the given capability set.
    #[must_use]
    pub fn new(id: PersonaId, capabilities: impl IntoIterator<Item = GateId>) -> Self {
        Self {
            id,
            description: None,
            capabilities: capabilities.into_iter().collect(),
        }
    }

    /// Sets a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the persona identifier.
    #[must_use]
    pub const fn id(&self) -> &PersonaId {
        &self.id
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the capability set.
    #[must_use]
    pub const fn capabilities(&self) -> &BTreeSet<GateId> {
        &self.capabilities
    }

    /// Returns `true` when the persona may execute `gate`.
    #[must_use]
    pub fn can_execute(&self, gate: &GateId) -> bool {
        self.capabilities.contains(gate)
    }
}
