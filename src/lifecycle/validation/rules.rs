//! Individual structural rules.
//!
//! Each rule is a pure function over one part of a transition record. Rules
//! that detect incomplete structure report the offending keys as
//! [`MissingInputs`], using `evidence.result`, `evidence.ref`,
//! `risks[i].owner` and `risks[i].mitigation` for the nested parts.

use crate::lifecycle::domain::{Evidence, FollowUp, RiskEntry};
use std::collections::BTreeMap;
use thiserror::Error;

/// Structural keys that are absent or empty, in detection order.
#[derive(Debug, Clone, Default, Error, PartialEq, Eq)]
#[error("missing inputs: {}", .0.join(", "))]
pub struct MissingInputs(pub Vec<String>);

impl MissingInputs {
    /// Returns `true` when nothing is missing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends the keys of `other`, keeping first-seen order.
    pub fn absorb(&mut self, other: Self) {
        for key in other.0 {
            if !self.0.contains(&key) {
                self.0.push(key);
            }
        }
    }
}

/// Malformed record content that no additional input can fix.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct RejectionReason(pub String);

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn into_result(missing: Vec<String>) -> Result<(), MissingInputs> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingInputs(missing))
    }
}

/// Checks that every required key is present with a non-empty value.
///
/// # Errors
///
/// Returns [`MissingInputs`] listing absent or empty keys in the gate's
/// declared order.
pub fn validate_required_inputs(
    inputs: &BTreeMap<String, String>,
    required: &[String],
) -> Result<(), MissingInputs> {
    let missing = required
        .iter()
        .filter(|key| inputs.get(*key).is_none_or(|value| is_blank(value)))
        .cloned()
        .collect();
    into_result(missing)
}

/// Checks that the evidence carries a result and a reference.
///
/// # Errors
///
/// Returns [`MissingInputs`] with `evidence.result` and/or `evidence.ref`.
pub fn validate_evidence(evidence: &Evidence) -> Result<(), MissingInputs> {
    let mut missing = Vec::new();
    if is_blank(&evidence.result) {
        missing.push("evidence.result".to_owned());
    }
    if is_blank(&evidence.reference) {
        missing.push("evidence.ref".to_owned());
    }
    into_result(missing)
}

/// Checks that every non-empty risk has an owner and a mitigation.
///
/// # Errors
///
/// Returns [`MissingInputs`] with `risks[i].owner` / `risks[i].mitigation`
/// keys for the offending entries.
pub fn validate_risks(risks: &[RiskEntry]) -> Result<(), MissingInputs> {
    let mut missing = Vec::new();
    for (index, risk) in risks.iter().enumerate() {
        if risk.is_empty() {
            continue;
        }
        if risk.owner.is_none() {
            missing.push(format!("risks[{index}].owner"));
        }
        if risk.mitigation.as_deref().is_none_or(is_blank) {
            missing.push(format!("risks[{index}].mitigation"));
        }
    }
    into_result(missing)
}

/// Checks that every follow-up names an action.
///
/// # Errors
///
/// Returns [`RejectionReason`] for the first follow-up without an action.
pub fn validate_follow_ups(follow_ups: &[FollowUp]) -> Result<(), RejectionReason> {
    match follow_ups.iter().position(|follow_up| is_blank(&follow_up.action)) {
        Some(index) => Err(RejectionReason(format!("follow-up {index} has no action"))),
        None => Ok(()),
    }
}
