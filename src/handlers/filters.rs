//! Filter context handlers. All of these are undoable.

use std::collections::HashMap;

use crate::error::HandlerError;
use crate::event::DashboardEvent;
use crate::store::{FilterContextAction, StateAction};
use crate::types::{
    resolve_index, AttributeFilter, DateFilterSelection, FilterSelection, ObjRef, RelativeIndex,
};

use super::HandlerOps;

pub(crate) fn change_date_filter_selection(
    ops: &HandlerOps,
    selection: DateFilterSelection,
) -> Result<DashboardEvent, HandlerError> {
    ops.mutate_undoable(StateAction::FilterContext(
        FilterContextAction::SetDateSelection(selection.clone()),
    ));
    Ok(DashboardEvent::DateFilterSelectionChanged { selection })
}

pub(crate) fn add_attribute_filter(
    ops: &HandlerOps,
    display_form: ObjRef,
    index: RelativeIndex,
    parents: Vec<String>,
) -> Result<DashboardEvent, HandlerError> {
    let (duplicate, missing_parent, len) = ops.read(|tree| {
        let filters = &tree.filter_context.attribute_filters;
        let duplicate = filters.iter().any(|f| f.display_form == display_form);
        let missing_parent = parents
            .iter()
            .find(|parent| !filters.iter().any(|f| f.local_id == **parent))
            .cloned();
        (duplicate, missing_parent, filters.len())
    });
    if duplicate {
        return Err(HandlerError::validation(format!(
            "an attribute filter for {display_form} already exists"
        )));
    }
    if let Some(parent) = missing_parent {
        return Err(HandlerError::validation(format!(
            "parent filter {parent} does not exist"
        )));
    }
    let index = resolve_index(index, len, true)
        .ok_or_else(|| HandlerError::validation(format!("filter index {index} out of bounds")))?;

    let mut filter = AttributeFilter::new(display_form);
    filter.parents = parents;
    ops.mutate_undoable(StateAction::FilterContext(FilterContextAction::AddFilter {
        index,
        filter: filter.clone(),
    }));
    Ok(DashboardEvent::AttributeFilterAdded { filter, index })
}

pub(crate) fn remove_attribute_filters(
    ops: &HandlerOps,
    local_ids: Vec<String>,
) -> Result<DashboardEvent, HandlerError> {
    let unknown = ops.read(|tree| {
        local_ids
            .iter()
            .find(|id| tree.filter_context.position_of(id).is_none())
            .cloned()
    });
    if let Some(id) = unknown {
        return Err(HandlerError::validation(format!(
            "attribute filter {id} does not exist"
        )));
    }

    ops.mutate_undoable(StateAction::FilterContext(
        FilterContextAction::RemoveFilters {
            local_ids: local_ids.clone(),
        },
    ));
    Ok(DashboardEvent::AttributeFiltersRemoved { local_ids })
}

pub(crate) fn move_attribute_filter(
    ops: &HandlerOps,
    local_id: String,
    to_index: RelativeIndex,
) -> Result<DashboardEvent, HandlerError> {
    let (from, len) = ops.read(|tree| {
        (
            tree.filter_context.position_of(&local_id),
            tree.filter_context.attribute_filters.len(),
        )
    });
    let from = from.ok_or_else(|| {
        HandlerError::validation(format!("attribute filter {local_id} does not exist"))
    })?;
    let to = resolve_index(to_index, len, false).ok_or_else(|| {
        HandlerError::validation(format!("filter index {to_index} out of bounds"))
    })?;

    ops.mutate_undoable(StateAction::FilterContext(FilterContextAction::MoveFilter {
        from,
        to,
    }));
    Ok(DashboardEvent::AttributeFilterMoved {
        local_id,
        from_index: from,
        to_index: to,
    })
}

pub(crate) fn change_attribute_filter_selection(
    ops: &HandlerOps,
    local_id: String,
    elements: Vec<String>,
    negative: bool,
) -> Result<DashboardEvent, HandlerError> {
    ensure_filter_exists(ops, &local_id)?;
    ops.mutate_undoable(StateAction::FilterContext(
        FilterContextAction::SetSelection {
            local_id: local_id.clone(),
            elements: elements.clone(),
            negative,
        },
    ));
    Ok(DashboardEvent::AttributeFilterSelectionChanged {
        local_id,
        elements,
        negative,
    })
}

pub(crate) fn set_attribute_filter_parents(
    ops: &HandlerOps,
    local_id: String,
    parents: Vec<String>,
) -> Result<DashboardEvent, HandlerError> {
    ensure_filter_exists(ops, &local_id)?;
    let unknown = ops.read(|tree| {
        parents
            .iter()
            .find(|p| tree.filter_context.position_of(p).is_none())
            .cloned()
    });
    if let Some(parent) = unknown {
        return Err(HandlerError::validation(format!(
            "parent filter {parent} does not exist"
        )));
    }
    // Build the parent graph as it would look after the change and walk it
    // from the changed filter.
    let cycle = ops.read(|tree| {
        let mut graph: HashMap<&str, &[String]> = tree
            .filter_context
            .attribute_filters
            .iter()
            .map(|f| (f.local_id.as_str(), f.parents.as_slice()))
            .collect();
        graph.insert(local_id.as_str(), parents.as_slice());
        has_cycle(&graph, &local_id)
    });
    if cycle {
        return Err(HandlerError::validation(
            "attribute filter parents must not form a cycle",
        ));
    }

    ops.mutate_undoable(StateAction::FilterContext(FilterContextAction::SetParents {
        local_id: local_id.clone(),
        parents: parents.clone(),
    }));
    Ok(DashboardEvent::AttributeFilterParentsChanged { local_id, parents })
}

pub(crate) fn change_filter_context_selection(
    ops: &HandlerOps,
    selections: Vec<FilterSelection>,
) -> Result<DashboardEvent, HandlerError> {
    ops.mutate_undoable(StateAction::FilterContext(
        FilterContextAction::ApplySelections(selections),
    ));
    Ok(DashboardEvent::FilterContextSelectionChanged)
}

fn ensure_filter_exists(ops: &HandlerOps, local_id: &str) -> Result<(), HandlerError> {
    let exists = ops.read(|tree| tree.filter_context.position_of(local_id).is_some());
    if exists {
        Ok(())
    } else {
        Err(HandlerError::validation(format!(
            "attribute filter {local_id} does not exist"
        )))
    }
}

/// Depth-first walk of the parent graph starting at `start`, looking for a
/// path back to `start`.
fn has_cycle(graph: &HashMap<&str, &[String]>, start: &str) -> bool {
    let mut stack: Vec<&str> = graph.get(start).map(|p| p.iter().map(String::as_str).collect()).unwrap_or_default();
    let mut visited: Vec<&str> = Vec::new();
    while let Some(current) = stack.pop() {
        if current == start {
            return true;
        }
        if visited.contains(&current) {
            continue;
        }
        visited.push(current);
        if let Some(parents) = graph.get(current) {
            stack.extend(parents.iter().map(String::as_str));
        }
    }
    false
}
