//! Composite transition validator.

use super::rules::{self, MissingInputs};
use crate::lifecycle::domain::{Gap, TransitionMode, TransitionRecord};

/// Result of validating a transition record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The record may be appended. Under tolerant mode `gaps` lists the
    /// structural findings that were downgraded.
    Accepted {
        /// Downgraded findings, empty outside tolerant mode.
        gaps: Vec<Gap>,
    },
    /// The record is structurally incomplete and must be recorded as
    /// BLOCKED.
    Blocked {
        /// Missing keys, in detection order.
        missing_inputs: Vec<String>,
    },
    /// The record is malformed in a way more input cannot fix.
    Rejected {
        /// Rule that was violated.
        reason: String,
    },
}

/// Applies every structural rule to a record and maps findings through the
/// record's mode: strict and branch block, tolerant accepts with gaps.
///
/// # Examples
///
/// ```
/// use stagegate::lifecycle::validation::TransitionValidator;
///
/// let validator = TransitionValidator::new();
/// assert_eq!(validator, TransitionValidator::default());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionValidator;

impl TransitionValidator {
    /// Creates a validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates `record` against the gate's `required` input keys.
    #[must_use]
    pub fn validate(&self, record: &TransitionRecord, required: &[String]) -> ValidationOutcome {
        if let Err(reason) = rules::validate_follow_ups(&record.follow_ups) {
            return ValidationOutcome::Rejected { reason: reason.0 };
        }

        let missing = Self::collect_missing(record, required);
        if missing.is_empty() {
            return ValidationOutcome::Accepted { gaps: Vec::new() };
        }
        match record.mode {
            TransitionMode::Tolerant => ValidationOutcome::Accepted {
                gaps: missing.0.into_iter().map(Gap::MissingInput).collect(),
            },
            TransitionMode::Strict | TransitionMode::Branch => ValidationOutcome::Blocked {
                missing_inputs: missing.0,
            },
        }
    }

    fn collect_missing(record: &TransitionRecord, required: &[String]) -> MissingInputs {
        let mut missing = MissingInputs::default();
        let checks = [
            rules::validate_required_inputs(&record.output.inputs, required),
            rules::validate_evidence(&record.output.evidence),
            rules::validate_risks(&record.output.risks),
        ];
        for finding in checks.into_iter().filter_map(Result::err) {
            missing.absorb(finding);
        }
        missing
    }
}
