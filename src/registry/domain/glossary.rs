//! Read-only glossary consulted when terminology must be validated.

use super::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Shared vocabulary loaded with a registry configuration version.
///
/// The glossary is never mutated at runtime; a new configuration version
/// replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glossary {
    terms: BTreeMap<String, String>,
    domains: BTreeSet<String>,
}

impl Glossary {
    /// Creates a glossary from term definitions and allowed domain tags.
    #[must_use]
    pub fn new(
        terms: impl IntoIterator<Item = (String, String)>,
        domains: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            terms: terms
                .into_iter()
                .map(|(term, definition)| (term.trim().to_ascii_lowercase(), definition))
                .collect(),
            domains: domains
                .into_iter()
                .map(|domain| domain.trim().to_owned())
                .collect(),
        }
    }

    /// Returns the definition of `term`, matched case-insensitively.
    #[must_use]
    pub fn define(&self, term: &str) -> Option<&str> {
        self.terms
            .get(&term.trim().to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the allowed domain tags. An empty set allows any tag.
    #[must_use]
    pub const fn domains(&self) -> &BTreeSet<String> {
        &self.domains
    }

    /// Checks a domain tag against the allowed set.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownDomain`] when the glossary declares
    /// domains and `domain` is not one of them.
    pub fn validate_domain(&self, domain: &str, version: &str) -> Result<(), RegistryError> {
        if self.domains.is_empty() || self.domains.contains(domain) {
            return Ok(());
        }
        Err(RegistryError::UnknownDomain {
            domain: domain.to_owned(),
            version: version.to_owned(),
        })
    }
}
