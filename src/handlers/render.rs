//! Async render coordination.
//!
//! Widgets that render asynchronously announce themselves with
//! `RequestAsyncRender`; when the last announced render resolves, the
//! engine additionally publishes `RenderResolved` so exports and embedders
//! know the dashboard is visually complete.

use crate::error::HandlerError;
use crate::event::DashboardEvent;
use crate::store::{StateAction, UiAction};

use super::HandlerOps;

pub(crate) fn request_async_render(
    ops: &HandlerOps,
    render_id: String,
) -> Result<DashboardEvent, HandlerError> {
    ops.mutate(StateAction::Ui(UiAction::RequestRender(render_id.clone())));
    Ok(DashboardEvent::AsyncRenderRequested { render_id })
}

pub(crate) fn resolve_async_render(
    ops: &HandlerOps,
    render_id: String,
) -> Result<DashboardEvent, HandlerError> {
    let pending = ops.read(|tree| tree.ui.pending_renders.contains(&render_id));
    if !pending {
        return Err(HandlerError::validation(format!(
            "no pending async render for {render_id}"
        )));
    }

    ops.mutate(StateAction::Ui(UiAction::ResolveRender(render_id.clone())));
    let all_resolved = ops.read(|tree| tree.ui.pending_renders.is_empty());
    if all_resolved {
        ops.publish(DashboardEvent::RenderResolved);
    }

    Ok(DashboardEvent::AsyncRenderResolved { render_id })
}
