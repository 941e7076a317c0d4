//! Layout handlers: sections, items, stash resolution, and undo/redo.
//!
//! Index resolution (the `-1` append convention) and stash expansion happen
//! here, against a read snapshot, so the reducers only ever see concrete
//! indexes and concrete items.

use crate::error::HandlerError;
use crate::event::DashboardEvent;
use crate::store::{LayoutAction, LayoutState, StateAction};
use crate::types::{
    resolve_index, ItemDefinition, RelativeIndex, SectionHeader, SectionItem, StashId,
};

use super::HandlerOps;

/// Expand item definitions into concrete items, pulling stashed items out
/// of the given layout snapshot. Returns the items plus the stash ids that
/// must be consumed by the mutation.
fn resolve_items(
    state: &LayoutState,
    definitions: Vec<ItemDefinition>,
) -> Result<(Vec<SectionItem>, Vec<StashId>), HandlerError> {
    let mut items = Vec::new();
    let mut consumed = Vec::new();
    for definition in definitions {
        match definition {
            ItemDefinition::Item(item) => items.push(item),
            ItemDefinition::Stashed(stash_id) => {
                let stashed = state.stash.get(&stash_id).ok_or_else(|| {
                    HandlerError::validation(format!("stash {stash_id} does not exist"))
                })?;
                items.extend(stashed.iter().cloned());
                consumed.push(stash_id);
            }
        }
    }
    Ok((items, consumed))
}

fn section_len(ops: &HandlerOps) -> usize {
    ops.read(|tree| tree.layout.layout.sections.len())
}

fn resolve_section(
    ops: &HandlerOps,
    index: RelativeIndex,
    allow_end: bool,
) -> Result<usize, HandlerError> {
    resolve_index(index, section_len(ops), allow_end)
        .ok_or_else(|| HandlerError::validation(format!("section index {index} out of bounds")))
}

fn resolve_item(
    ops: &HandlerOps,
    section: usize,
    index: RelativeIndex,
    allow_end: bool,
) -> Result<usize, HandlerError> {
    let len = ops.read(|tree| {
        tree.layout
            .layout
            .sections
            .get(section)
            .map(|s| s.items.len())
    });
    let len = len.ok_or_else(|| {
        HandlerError::validation(format!("section index {section} out of bounds"))
    })?;
    resolve_index(index, len, allow_end)
        .ok_or_else(|| HandlerError::validation(format!("item index {index} out of bounds")))
}

pub(crate) fn add_layout_section(
    ops: &HandlerOps,
    index: RelativeIndex,
    header: SectionHeader,
    items: Vec<ItemDefinition>,
) -> Result<DashboardEvent, HandlerError> {
    let index = resolve_section(ops, index, true)?;
    let (items, consumed_stashes) = ops.read(|tree| resolve_items(&tree.layout, items))?;
    let section = crate::types::LayoutSection { header, items };

    ops.mutate_undoable(StateAction::Layout(LayoutAction::AddSection {
        index,
        section: section.clone(),
        consumed_stashes,
    }));
    Ok(DashboardEvent::LayoutSectionAdded { index, section })
}

pub(crate) fn move_layout_section(
    ops: &HandlerOps,
    section_index: RelativeIndex,
    to_index: RelativeIndex,
) -> Result<DashboardEvent, HandlerError> {
    let from = resolve_section(ops, section_index, false)?;
    let to = resolve_section(ops, to_index, false)?;

    ops.mutate_undoable(StateAction::Layout(LayoutAction::MoveSection { from, to }));
    Ok(DashboardEvent::LayoutSectionMoved {
        from_index: from,
        to_index: to,
    })
}

pub(crate) fn remove_layout_section(
    ops: &HandlerOps,
    index: RelativeIndex,
    stash: Option<StashId>,
) -> Result<DashboardEvent, HandlerError> {
    let index = resolve_section(ops, index, false)?;

    ops.mutate_undoable(StateAction::Layout(LayoutAction::RemoveSection {
        index,
        stash: stash.clone(),
    }));
    Ok(DashboardEvent::LayoutSectionRemoved { index, stash })
}

pub(crate) fn change_layout_section_header(
    ops: &HandlerOps,
    index: RelativeIndex,
    header: SectionHeader,
    merge: bool,
) -> Result<DashboardEvent, HandlerError> {
    let index = resolve_section(ops, index, false)?;
    let header = if merge {
        ops.read(|tree| {
            tree.layout
                .layout
                .sections
                .get(index)
                .map(|section| section.header.merged_with(&header))
        })
        .unwrap_or(header)
    } else {
        header
    };

    ops.mutate_undoable(StateAction::Layout(LayoutAction::ChangeSectionHeader {
        index,
        header: header.clone(),
    }));
    Ok(DashboardEvent::LayoutSectionHeaderChanged { index, header })
}

pub(crate) fn add_section_items(
    ops: &HandlerOps,
    section_index: RelativeIndex,
    item_index: RelativeIndex,
    items: Vec<ItemDefinition>,
) -> Result<DashboardEvent, HandlerError> {
    let section = resolve_section(ops, section_index, false)?;
    let item_index = resolve_item(ops, section, item_index, true)?;
    let (items, consumed_stashes) = ops.read(|tree| resolve_items(&tree.layout, items))?;
    let count = items.len();

    ops.mutate_undoable(StateAction::Layout(LayoutAction::AddItems {
        section_index: section,
        item_index,
        items,
        consumed_stashes,
    }));
    Ok(DashboardEvent::SectionItemsAdded {
        section_index: section,
        item_index,
        count,
    })
}

pub(crate) fn move_section_item(
    ops: &HandlerOps,
    section_index: RelativeIndex,
    item_index: RelativeIndex,
    to_section_index: RelativeIndex,
    to_item_index: RelativeIndex,
) -> Result<DashboardEvent, HandlerError> {
    let from_section = resolve_section(ops, section_index, false)?;
    let from_item = resolve_item(ops, from_section, item_index, false)?;
    let to_section = resolve_section(ops, to_section_index, false)?;
    // Moving within the same section keeps the list length; into another
    // section the end slot is one past the current last item.
    let to_item = resolve_item(ops, to_section, to_item_index, to_section != from_section)?;

    ops.mutate_undoable(StateAction::Layout(LayoutAction::MoveItem {
        from_section,
        from_item,
        to_section,
        to_item,
    }));
    Ok(DashboardEvent::SectionItemMoved {
        from_section_index: from_section,
        from_item_index: from_item,
        to_section_index: to_section,
        to_item_index: to_item,
    })
}

pub(crate) fn remove_section_item(
    ops: &HandlerOps,
    section_index: RelativeIndex,
    item_index: RelativeIndex,
    stash: Option<StashId>,
    eager: bool,
) -> Result<DashboardEvent, HandlerError> {
    let section = resolve_section(ops, section_index, false)?;
    let item = resolve_item(ops, section, item_index, false)?;
    let last_item = ops.read(|tree| {
        tree.layout
            .layout
            .sections
            .get(section)
            .map(|s| s.items.len() == 1)
            .unwrap_or(false)
    });
    let section_removed = eager && last_item;

    ops.mutate_undoable(StateAction::Layout(LayoutAction::RemoveItem {
        section_index: section,
        item_index: item,
        stash: stash.clone(),
        remove_empty_section: eager,
    }));
    Ok(DashboardEvent::SectionItemRemoved {
        section_index: section,
        item_index: item,
        stash,
        section_removed,
    })
}

pub(crate) fn replace_section_item(
    ops: &HandlerOps,
    section_index: RelativeIndex,
    item_index: RelativeIndex,
    item: ItemDefinition,
    stash: Option<StashId>,
) -> Result<DashboardEvent, HandlerError> {
    let section = resolve_section(ops, section_index, false)?;
    let index = resolve_item(ops, section, item_index, false)?;
    let (mut items, consumed_stashes) = ops.read(|tree| resolve_items(&tree.layout, vec![item]))?;
    if items.len() != 1 {
        return Err(HandlerError::validation(
            "replacement must resolve to exactly one item",
        ));
    }
    let item = items.remove(0);

    ops.mutate_undoable(StateAction::Layout(LayoutAction::ReplaceItem {
        section_index: section,
        item_index: index,
        item,
        stash: stash.clone(),
        consumed_stashes,
    }));
    Ok(DashboardEvent::SectionItemReplaced {
        section_index: section,
        item_index: index,
    })
}

/// Apply the most recent undo entry through the reducer pipeline.
pub(crate) fn undo(ops: &HandlerOps) -> Result<DashboardEvent, HandlerError> {
    let entry = ops
        .journal()
        .pop_for_undo()
        .ok_or_else(|| HandlerError::validation("nothing to undo"))?;
    ops.mutate(entry.inverse);
    Ok(DashboardEvent::UndoApplied {
        slice: entry.slice,
        undone_correlation: entry.correlation_id,
    })
}

/// Re-apply the most recently undone entry.
pub(crate) fn redo(ops: &HandlerOps) -> Result<DashboardEvent, HandlerError> {
    let entry = ops
        .journal()
        .pop_for_redo()
        .ok_or_else(|| HandlerError::validation("nothing to redo"))?;
    ops.mutate(entry.forward);
    Ok(DashboardEvent::RedoApplied {
        slice: entry.slice,
        redone_correlation: entry.correlation_id,
    })
}
