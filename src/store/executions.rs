//! Executions slice: the latest analytical result (or error) per widget.

use std::collections::HashMap;

use crate::types::ExecutionOutcome;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionsState {
    pub results: HashMap<String, ExecutionOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionsAction {
    Upsert {
        widget_id: String,
        outcome: ExecutionOutcome,
    },
    Clear,
    Restore(ExecutionsState),
}

pub(crate) fn apply(state: &mut ExecutionsState, action: ExecutionsAction) {
    match action {
        ExecutionsAction::Upsert { widget_id, outcome } => {
            state.results.insert(widget_id, outcome);
        }
        ExecutionsAction::Clear => state.results.clear(),
        ExecutionsAction::Restore(prior) => *state = prior,
    }
}
