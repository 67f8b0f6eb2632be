//! Persisted text form of a task and its lifecycle log.
//!
//! The form is line-oriented and round-trips exactly: parsing a rendered
//! task yields data equal in every field to the original.
//!
//! ```text
//! # Task 2f0c7c1e-6a5d-4b8e-9a53-0c1c3e6d9a10
//! WORKFLOW: delivery
//! DOMAIN: payments
//! STATUS: DISCOVERY
//! OWNER: alice
//! LAST_UPDATED: 2026-03-01T09:30:00Z
//!
//! ## Product Brief
//! Refund flow for card payments.
//!
//! ## Lifecycle Log
//!
//! ### [1] TRANSITION product.discovery @ 2026-03-01T09:30:00Z
//! PERSONA: product-ops
//! SCOPE: main
//! MODE: strict
//! FROM_STATE: DRAFT
//! TO_STATE: DISCOVERY
//! WHY:
//! - users asked for refunds
//! OUTPUT:
//! - summary: interviews done
//! - inputs:
//!   - brief=docs/brief.md
//! - evidence: interviews|result=completed|ref=docs/interviews.md
//! - risks:
//!   - scope creep|owner=alice|mitigation=weekly review
//! FOLLOW-UP:
//! - schedule review - owner=alice - due=2026-03-08
//! ```
//!
//! A BLOCKED entry replaces the transition fields after `FROM_STATE` with a
//! `BLOCKED(missing_inputs=[..], unblock_steps=[..])` marker. A compaction
//! summary is a `COMPACTED` entry carrying an `ARCHIVE` pointer.

mod escape;
mod parse;
mod render;

use thiserror::Error;

pub use parse::parse_task;
pub use render::{render_blocked, render_entry, render_task, render_transition};

const BRIEF_HEADER: &str = "## Product Brief";
const LOG_HEADER: &str = "## Lifecycle Log";

const WORKFLOW: &str = "WORKFLOW";
const DOMAIN: &str = "DOMAIN";
const STATUS: &str = "STATUS";
const OWNER: &str = "OWNER";
const LAST_UPDATED: &str = "LAST_UPDATED";

const PERSONA: &str = "PERSONA";
const SCOPE: &str = "SCOPE";
const MODE: &str = "MODE";
const FROM_STATE: &str = "FROM_STATE";
const TO_STATE: &str = "TO_STATE";
const RESOLVES: &str = "RESOLVES";
const GAPS: &str = "GAPS";
const WHY: &str = "WHY";
const OUTPUT: &str = "OUTPUT";
const FOLLOW_UP: &str = "FOLLOW-UP";
const ARCHIVE: &str = "ARCHIVE";
const OPEN_RISKS: &str = "OPEN_RISKS";
const OPEN_FOLLOW_UP: &str = "OPEN_FOLLOW-UP";

/// Error returned when text does not follow the persisted task form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct FormatError {
    /// One-based line number where parsing stopped.
    pub line: usize,
    /// What was wrong with the line.
    pub reason: String,
}

impl FormatError {
    /// Creates a format error for `line`.
    #[must_use]
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}
