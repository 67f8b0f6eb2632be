//! Versioned registry configuration document.
//!
//! The document is TOML. A bundled default describing the illustrative
//! delivery workflow ships with the crate; deployments load their own file
//! with [`RegistryConfig::load`].

use crate::registry::domain::RegistryError;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const BUNDLED_REGISTRY: &str = include_str!("default_registry.toml");

/// Unblock step template used when the document does not declare one.
pub const DEFAULT_UNBLOCK_TEMPLATE: &str = "supply {{ key }} and resubmit {{ gate }}";

fn default_unblock_template() -> String {
    DEFAULT_UNBLOCK_TEMPLATE.to_owned()
}

/// Root of the registry configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Configuration version. Reloads must supply a different version.
    pub version: String,
    /// Workflow used when a task is created without naming one.
    pub default_workflow: String,
    /// `minijinja` template for one unblock step; receives `key`, `gate`,
    /// and `state`.
    #[serde(default = "default_unblock_template")]
    pub unblock_template: String,
    /// Shared glossary and allowed domain tags.
    #[serde(default)]
    pub glossary: GlossaryConfig,
    /// Persona capability definitions.
    #[serde(default)]
    pub personas: Vec<PersonaConfig>,
    /// Workflow gate templates.
    #[serde(default)]
    pub workflows: Vec<WorkflowConfig>,
}

/// Glossary section of the configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlossaryConfig {
    /// Term definitions keyed by term.
    #[serde(default)]
    pub terms: BTreeMap<String, String>,
    /// Allowed task domain tags. Empty allows any tag.
    #[serde(default)]
    pub domains: Vec<String>,
}

/// One persona entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonaConfig {
    /// Persona identifier.
    pub id: String,
    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Gate (skill) identifiers the persona may execute.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// One workflow template entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Workflow name.
    pub name: String,
    /// State new tasks start in.
    pub initial_state: String,
    /// States from which a branch may be merged.
    #[serde(default)]
    pub joinable_states: Vec<String>,
    /// The designated merge gate.
    pub merge_gate: MergeGateConfig,
    /// Gates in template order.
    #[serde(default)]
    pub gates: Vec<GateConfig>,
}

/// Merge gate entry of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeGateConfig {
    /// Merge gate identifier.
    pub name: String,
    /// Input keys a merge must supply.
    #[serde(default)]
    pub required_inputs: Vec<String>,
}

/// Sequence gate entry of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// Gate identifier.
    pub name: String,
    /// State the gate starts from.
    pub from: String,
    /// State the gate leads to.
    pub to: String,
    /// Input keys a transition through the gate must supply.
    #[serde(default)]
    pub required_inputs: Vec<String>,
}

impl RegistryConfig {
    /// Parses a TOML configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Parse`] when the document is not valid TOML
    /// or does not match the schema.
    pub fn from_toml_str(document: &str) -> Result<Self, RegistryError> {
        toml::from_str(document).map_err(|err| RegistryError::Parse(err.to_string()))
    }

    /// Returns the bundled default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Parse`] if the bundled document is malformed.
    pub fn bundled() -> Result<Self, RegistryError> {
        Self::from_toml_str(BUNDLED_REGISTRY)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] when the file cannot be read, or
    /// [`RegistryError::Parse`] when its contents are invalid.
    pub fn load(path: &Utf8Path) -> Result<Self, RegistryError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| RegistryError::Io(format!("path '{path}' has no file name")))?;
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let dir = Dir::open_ambient_dir(parent, ambient_authority())
            .map_err(|err| RegistryError::Io(format!("{parent}: {err}")))?;
        let contents = dir
            .read_to_string(file_name)
            .map_err(|err| RegistryError::Io(format!("{path}: {err}")))?;
        Self::from_toml_str(&contents)
    }
}
