//! Widget-level handlers: header changes and drill definition management.

use crate::error::HandlerError;
use crate::event::DashboardEvent;
use crate::store::layout::find_widget;
use crate::store::{LayoutAction, StateAction};
use crate::types::{DrillDefinition, ObjRef};

use super::HandlerOps;

fn ensure_widget_exists(ops: &HandlerOps, widget_id: &str) -> Result<(), HandlerError> {
    let exists = ops.read(|tree| find_widget(&tree.layout, widget_id).is_some());
    if exists {
        Ok(())
    } else {
        Err(HandlerError::validation(format!(
            "widget {widget_id} is not on the dashboard"
        )))
    }
}

pub(crate) fn change_widget_header(
    ops: &HandlerOps,
    widget_id: String,
    title: String,
) -> Result<DashboardEvent, HandlerError> {
    ensure_widget_exists(ops, &widget_id)?;
    ops.mutate_undoable(StateAction::Layout(LayoutAction::ChangeWidgetTitle {
        widget_id: widget_id.clone(),
        title: title.clone(),
    }));
    Ok(DashboardEvent::WidgetHeaderChanged { widget_id, title })
}

pub(crate) fn modify_drills_for_widget(
    ops: &HandlerOps,
    widget_id: String,
    drills: Vec<DrillDefinition>,
) -> Result<DashboardEvent, HandlerError> {
    ensure_widget_exists(ops, &widget_id)?;
    ops.mutate_undoable(StateAction::Layout(LayoutAction::UpsertWidgetDrills {
        widget_id: widget_id.clone(),
        drills: drills.clone(),
    }));
    Ok(DashboardEvent::WidgetDrillsModified { widget_id, drills })
}

pub(crate) fn remove_drills_for_widget(
    ops: &HandlerOps,
    widget_id: String,
    origins: Vec<ObjRef>,
) -> Result<DashboardEvent, HandlerError> {
    ensure_widget_exists(ops, &widget_id)?;
    let missing = ops.read(|tree| {
        find_widget(&tree.layout, &widget_id).and_then(|widget| {
            origins
                .iter()
                .find(|origin| widget.drills.iter().all(|d| &d.origin != *origin))
                .cloned()
        })
    });
    if let Some(origin) = missing {
        return Err(HandlerError::validation(format!(
            "widget {widget_id} has no drill from {origin}"
        )));
    }

    ops.mutate_undoable(StateAction::Layout(LayoutAction::RemoveWidgetDrills {
        widget_id: widget_id.clone(),
        origins: origins.clone(),
    }));
    Ok(DashboardEvent::WidgetDrillsRemoved { widget_id, origins })
}
