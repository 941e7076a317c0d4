//! Transient UI slice: async render tracking and drillable item highlights.
//!
//! Nothing in this slice is ever persisted; `Save` ignores it entirely.

use std::collections::BTreeSet;

use crate::types::ObjRef;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
    /// Render ids announced via `RequestAsyncRender` and not yet resolved.
    pub pending_renders: BTreeSet<String>,
    /// Items the host currently highlights as drillable.
    pub drillable_items: Vec<ObjRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    RequestRender(String),
    ResolveRender(String),
    SetDrillableItems(Vec<ObjRef>),
    Restore(UiState),
}

pub(crate) fn apply(state: &mut UiState, action: UiAction) {
    match action {
        UiAction::RequestRender(render_id) => {
            state.pending_renders.insert(render_id);
        }
        UiAction::ResolveRender(render_id) => {
            state.pending_renders.remove(&render_id);
        }
        UiAction::SetDrillableItems(items) => state.drillable_items = items,
        UiAction::Restore(prior) => *state = prior,
    }
}
