//! Structural validation of transition records.
//!
//! Rules check presence, never meaning: required input keys, the evidence
//! tuple, risk ownership, and follow-up actions. The
//! [`TransitionValidator`] combines them and applies the mode policy.

pub mod rules;
pub mod service;

pub use rules::{MissingInputs, RejectionReason};
pub use service::{TransitionValidator, ValidationOutcome};
