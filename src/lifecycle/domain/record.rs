//! Transition records and their OUTPUT payload.

use super::{OwnerId, ParseModeError, RecordScope, SequenceNumber};
use crate::registry::domain::{GateId, PersonaId, StateName};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How rigidly gate order is enforced for one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMode {
    /// Only the immediate next gate is valid; structural gaps block.
    Strict,
    /// Later gates are accepted; skipped gates and missing inputs are
    /// recorded as gaps.
    Tolerant,
    /// The transition forks, continues, or merges a branch.
    Branch,
}

impl TransitionMode {
    /// Returns the canonical text representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Tolerant => "tolerant",
            Self::Branch => "branch",
        }
    }
}

impl fmt::Display for TransitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TransitionMode {
    type Error = ParseModeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "tolerant" => Ok(Self::Tolerant),
            "branch" => Ok(Self::Branch),
            _ => Err(ParseModeError(value.to_owned())),
        }
    }
}

/// Evidence backing a transition: `(kind, result, ref)`.
///
/// `result` is an open string enum (`pass`, `fail`, `approved`,
/// `completed`, ...); only its presence is checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Kind of evidence, such as `interviews` or `tests`.
    pub kind: String,
    /// Outcome of the evidence.
    pub result: String,
    /// Reference to the evidence artefact, usually a path.
    pub reference: String,
}

impl Evidence {
    /// Creates an evidence tuple.
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        result: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            result: result.into(),
            reference: reference.into(),
        }
    }
}

/// One entry of a risk list.
///
/// An entry with an empty description is an explicit "no risk" marker; every
/// other entry must carry an owner and a mitigation to pass validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskEntry {
    /// Free-text risk description.
    pub description: String,
    /// Owner responsible for the risk.
    pub owner: Option<OwnerId>,
    /// Mitigation plan.
    pub mitigation: Option<String>,
}

impl RiskEntry {
    /// Creates a risk with a description and no owner or mitigation.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            owner: None,
            mitigation: None,
        }
    }

    /// Sets the owner.
    #[must_use]
    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Sets the mitigation.
    #[must_use]
    pub fn with_mitigation(mut self, mitigation: impl Into<String>) -> Self {
        self.mitigation = Some(mitigation.into());
        self
    }

    /// Returns `true` for the "no risk" marker.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.trim().is_empty()
    }
}

/// A follow-up action. The due date is advisory and never changes task
/// state by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUp {
    /// Action to take.
    pub action: String,
    /// Owner of the action.
    pub owner: OwnerId,
    /// Advisory due date.
    pub due: NaiveDate,
}

impl FollowUp {
    /// Creates a follow-up item.
    #[must_use]
    pub fn new(action: impl Into<String>, owner: OwnerId, due: NaiveDate) -> Self {
        Self {
            action: action.into(),
            owner,
            due,
        }
    }
}

/// A permanently logged gap attached to a tolerant-mode record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Gap {
    /// A gate the transition skipped over.
    SkippedGate(GateId),
    /// A structural input the transition proceeded without.
    MissingInput(String),
}

/// The OUTPUT block of a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBlock {
    /// Opaque summary text.
    pub summary: String,
    /// Named input references.
    pub inputs: BTreeMap<String, String>,
    /// Evidence tuple.
    pub evidence: Evidence,
    /// Risk list.
    pub risks: Vec<RiskEntry>,
}

/// An accepted, immutable transition of a task or branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Log position, assigned on append.
    pub sequence: SequenceNumber,
    /// Gate executed.
    pub gate: GateId,
    /// Persona that executed the gate.
    pub persona: PersonaId,
    /// Mode the transition was requested under.
    pub mode: TransitionMode,
    /// Main sequence, branch, or merge.
    pub scope: RecordScope,
    /// State before the transition.
    pub from_state: StateName,
    /// State after the transition.
    pub to_state: StateName,
    /// Ordered rationale bullets.
    pub why: Vec<String>,
    /// OUTPUT block.
    pub output: OutputBlock,
    /// Ordered follow-up items.
    pub follow_ups: Vec<FollowUp>,
    /// Gaps recorded under tolerant mode.
    pub gaps: Vec<Gap>,
    /// BLOCKED record this transition resolves, if any.
    pub resolves: Option<SequenceNumber>,
    /// When the transition was accepted.
    pub recorded_at: DateTime<Utc>,
}

impl TransitionRecord {
    /// Returns the non-empty risks of the OUTPUT block.
    pub fn open_risks(&self) -> impl Iterator<Item = &RiskEntry> {
        self.output.risks.iter().filter(|risk| !risk.is_empty())
    }
}
