//! BLOCKED records: the resumable "insufficient inputs" outcome.

use super::{RecordScope, SequenceNumber, TransitionMode, TransitionRecord};
use crate::registry::domain::{GateId, PersonaId, StateName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded BLOCKED outcome.
///
/// BLOCKED is not a task state: the record is anchored to the state the
/// request was made from, and the task (or branch) stays there. A later
/// transition for the same gate, in the same scope, from the anchor state
/// resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedRecord {
    /// Log position, assigned on append.
    pub sequence: SequenceNumber,
    /// Gate that was requested.
    pub gate: GateId,
    /// Persona that made the request.
    pub persona: PersonaId,
    /// Mode the request was made under.
    pub mode: TransitionMode,
    /// Scope the request targeted.
    pub scope: RecordScope,
    /// State the request was raised in.
    pub anchor_state: StateName,
    /// Structural keys that were missing, in detection order.
    pub missing_inputs: Vec<String>,
    /// Steps that unblock the request, one per missing key.
    pub unblock_steps: Vec<String>,
    /// When the block was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl BlockedRecord {
    /// Returns `true` when `record` resolves this block.
    #[must_use]
    pub fn is_resolved_by(&self, record: &TransitionRecord) -> bool {
        record.sequence > self.sequence
            && record.gate == self.gate
            && record.scope == self.scope
            && record.from_state == self.anchor_state
    }
}
