//! Execution result caching.

use crate::error::HandlerError;
use crate::event::DashboardEvent;
use crate::store::{ExecutionsAction, StateAction};
use crate::types::ExecutionOutcome;

use super::HandlerOps;

pub(crate) fn upsert_execution_result(
    ops: &HandlerOps,
    widget_id: String,
    outcome: ExecutionOutcome,
) -> Result<DashboardEvent, HandlerError> {
    ops.mutate(StateAction::Executions(ExecutionsAction::Upsert {
        widget_id: widget_id.clone(),
        outcome: outcome.clone(),
    }));
    Ok(DashboardEvent::ExecutionResultUpserted { widget_id, outcome })
}
