//! Domain model for persona capabilities and workflow gate templates.

mod error;
mod gate;
mod glossary;
mod ids;
mod persona;
mod workflow;

pub use error::{AuthorizationError, RegistryError};
pub use gate::{GateDefinition, MergeGateDefinition};
pub use glossary::Glossary;
pub use ids::{GateId, PersonaId, StateName, WorkflowName};
pub use persona::Persona;
pub use workflow::WorkflowTemplate;
