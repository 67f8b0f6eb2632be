//! BLOCKED outcome construction.

use crate::lifecycle::domain::{
    BlockedRecord, RecordScope, SequenceNumber, Task, TransitionMode,
};
use crate::registry::domain::{GateId, PersonaId, StateName};
use chrono::{DateTime, Utc};
use minijinja::{Environment, context};

/// Facts about a request that failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedRequest {
    /// Requested gate.
    pub gate: GateId,
    /// Requesting persona.
    pub persona: PersonaId,
    /// Requested mode.
    pub mode: TransitionMode,
    /// Scope the request targeted.
    pub scope: RecordScope,
    /// State the request was raised in.
    pub anchor_state: StateName,
    /// Missing structural keys.
    pub missing_inputs: Vec<String>,
}

/// Builds BLOCKED records and finds the blocks a transition resolves.
///
/// Unblock steps are rendered from the registry's template, one per missing
/// key, with `key`, `gate` and `state` in scope.
#[derive(Debug)]
pub struct BlockedHandler<'a> {
    template: &'a str,
    env: Environment<'static>,
}

impl<'a> BlockedHandler<'a> {
    /// Creates a handler rendering steps with `unblock_template`.
    #[must_use]
    pub fn new(unblock_template: &'a str) -> Self {
        Self {
            template: unblock_template,
            env: Environment::new(),
        }
    }

    /// Renders one unblock step per missing key.
    ///
    /// # Errors
    ///
    /// Returns [`minijinja::Error`] if the template fails to render.
    pub fn unblock_steps(
        &self,
        gate: &GateId,
        state: &StateName,
        missing_inputs: &[String],
    ) -> Result<Vec<String>, minijinja::Error> {
        missing_inputs
            .iter()
            .map(|key| {
                self.env.render_str(
                    self.template,
                    context! {
                        key => key,
                        gate => gate.as_str(),
                        state => state.as_str(),
                    },
                )
            })
            .collect()
    }

    /// Builds the BLOCKED record for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`minijinja::Error`] if the unblock steps fail to render.
    pub fn block(
        &self,
        request: BlockedRequest,
        recorded_at: DateTime<Utc>,
    ) -> Result<BlockedRecord, minijinja::Error> {
        let unblock_steps =
            self.unblock_steps(&request.gate, &request.anchor_state, &request.missing_inputs)?;
        Ok(BlockedRecord {
            sequence: SequenceNumber::UNASSIGNED,
            gate: request.gate,
            persona: request.persona,
            mode: request.mode,
            scope: request.scope,
            anchor_state: request.anchor_state,
            missing_inputs: request.missing_inputs,
            unblock_steps,
            recorded_at,
        })
    }

    /// Returns the pending block that a transition for `gate` in `scope`
    /// from `from_state` would resolve.
    #[must_use]
    pub fn resolution_for(
        task: &Task,
        gate: &GateId,
        scope: RecordScope,
        from_state: &StateName,
    ) -> Option<SequenceNumber> {
        task.log().pending_block_for(gate, scope, from_state)
    }
}
