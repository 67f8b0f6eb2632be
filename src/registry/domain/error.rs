//! Error types for registry configuration and authorization.

use super::{GateId, PersonaId, StateName, WorkflowName};
use thiserror::Error;

/// Errors raised while loading, validating, or reloading registry
/// configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// An identifier is empty after trimming.
    #[error("{kind} must not be empty")]
    EmptyIdentifier {
        /// Which identifier kind was empty.
        kind: &'static str,
    },

    /// An identifier contains characters outside its allowed set.
    #[error("invalid {kind} '{value}'")]
    InvalidIdentifier {
        /// Which identifier kind was rejected.
        kind: &'static str,
        /// The rejected raw value.
        value: String,
    },

    /// The configuration version string is empty.
    #[error("configuration version must not be empty")]
    EmptyVersion,

    /// The configuration document could not be read.
    #[error("failed to read registry configuration: {0}")]
    Io(String),

    /// The configuration document is not valid TOML for the schema.
    #[error("failed to parse registry configuration: {0}")]
    Parse(String),

    /// A workflow declares no gates.
    #[error("workflow '{0}' declares no gates")]
    EmptyWorkflow(WorkflowName),

    /// A gate does not start where the previous gate ended.
    #[error("gate '{gate}' in workflow '{workflow}' starts at {found}, expected {expected}")]
    BrokenChain {
        /// Workflow being validated.
        workflow: WorkflowName,
        /// Gate breaking the chain.
        gate: GateId,
        /// State the gate should start from.
        expected: StateName,
        /// State the gate actually starts from.
        found: StateName,
    },

    /// A state is reached twice, which would make the gate order cyclic.
    #[error("state {state} appears more than once in workflow '{workflow}'")]
    RepeatedState {
        /// Workflow being validated.
        workflow: WorkflowName,
        /// Repeated state.
        state: StateName,
    },

    /// A gate identifier is declared more than once.
    #[error("gate '{0}' is declared more than once")]
    DuplicateGate(GateId),

    /// A joinable state is not one of the workflow's states.
    #[error("joinable state {state} is not part of workflow '{workflow}'")]
    UnknownJoinableState {
        /// Workflow being validated.
        workflow: WorkflowName,
        /// Offending state.
        state: StateName,
    },

    /// A workflow name is declared more than once.
    #[error("workflow '{0}' is declared more than once")]
    DuplicateWorkflow(WorkflowName),

    /// A persona identifier is declared more than once.
    #[error("persona '{0}' is declared more than once")]
    DuplicatePersona(PersonaId),

    /// A persona capability names a gate no workflow declares.
    #[error("persona '{persona}' references unknown gate '{gate}'")]
    UnknownCapability {
        /// Persona declaring the capability.
        persona: PersonaId,
        /// Unknown gate identifier.
        gate: GateId,
    },

    /// A workflow lookup failed.
    #[error("unknown workflow '{0}'")]
    UnknownWorkflow(WorkflowName),

    /// The unblock step template does not render.
    #[error("invalid unblock template: {0}")]
    InvalidUnblockTemplate(String),

    /// A domain tag is not part of the configured glossary.
    #[error("domain tag '{domain}' is not defined in glossary version {version}")]
    UnknownDomain {
        /// Rejected domain tag.
        domain: String,
        /// Configuration version consulted.
        version: String,
    },

    /// A reload attempted to install the version that is already active.
    #[error("configuration version {0} is already loaded")]
    VersionAlreadyLoaded(String),
}

/// Hard rejection returned when a persona may not execute a gate.
///
/// This is distinct from a BLOCKED outcome: the request is refused and the
/// task is left untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    /// The persona is not present in the registry.
    #[error("persona '{0}' is not registered")]
    UnknownPersona(PersonaId),

    /// The persona exists but the gate is outside its capability set.
    #[error("persona '{persona}' lacks capability for gate '{gate}'")]
    MissingCapability {
        /// Requesting persona.
        persona: PersonaId,
        /// Requested gate.
        gate: GateId,
    },
}
