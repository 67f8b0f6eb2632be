//! Validated identifier types for personas, gates, states, and workflows.

use super::RegistryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Returns `true` when every character is lowercase ASCII alphanumeric or one
/// of `-`, `_`, `.`.
fn is_lower_identifier(value: &str) -> bool {
    value.chars().all(|character| {
        character.is_ascii_lowercase()
            || character.is_ascii_digit()
            || matches!(character, '-' | '_' | '.')
    })
}

/// Returns `true` when every character is uppercase ASCII alphanumeric or `_`.
fn is_upper_identifier(value: &str) -> bool {
    value.chars().all(|character| {
        character.is_ascii_uppercase() || character.is_ascii_digit() || character == '_'
    })
}

fn validated(
    kind: &'static str,
    raw: String,
    accepts: fn(&str) -> bool,
) -> Result<String, RegistryError> {
    let normalized = raw.trim();
    if normalized.is_empty() {
        return Err(RegistryError::EmptyIdentifier { kind });
    }
    if !accepts(normalized) {
        return Err(RegistryError::InvalidIdentifier { kind, value: raw });
    }
    Ok(normalized.to_owned())
}

/// Identifier of an actor role, such as `product-ops` or `qa`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonaId(String);

impl PersonaId {
    /// Creates a validated persona identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the value is empty or contains
    /// characters outside `[a-z0-9._-]`.
    pub fn new(value: impl Into<String>) -> Result<Self, RegistryError> {
        validated("persona id", value.into(), is_lower_identifier).map(Self)
    }

    /// Returns the identifier as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a gate (also the skill identifier executing it), such as
/// `product.discovery`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateId(String);

impl GateId {
    /// Creates a validated gate identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the value is empty or contains
    /// characters outside `[a-z0-9._-]`.
    pub fn new(value: impl Into<String>) -> Result<Self, RegistryError> {
        validated("gate id", value.into(), is_lower_identifier).map(Self)
    }

    /// Returns the identifier as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a task state in a workflow template, such as `REQUIREMENTS_READY`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateName(String);

impl StateName {
    /// Creates a validated state name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the value is empty or contains
    /// characters outside `[A-Z0-9_]`.
    pub fn new(value: impl Into<String>) -> Result<Self, RegistryError> {
        validated("state name", value.into(), is_upper_identifier).map(Self)
    }

    /// Returns the state name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a workflow template, such as `delivery`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowName(String);

impl WorkflowName {
    /// Creates a validated workflow name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the value is empty or contains
    /// characters outside `[a-z0-9._-]`.
    pub fn new(value: impl Into<String>) -> Result<Self, RegistryError> {
        validated("workflow name", value.into(), is_lower_identifier).map(Self)
    }

    /// Returns the workflow name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
