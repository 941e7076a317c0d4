//! Layout slice: sections, items, widget headers and drills, and the stash
//! of removed items.
//!
//! Actions arrive with indexes already resolved (no `-1` convention here)
//! and stash references already expanded into concrete items; the handler
//! layer owns that resolution and its error reporting. Reducers clamp
//! rather than fail on indexes that race past the end of a list.

use std::collections::HashMap;

use crate::types::{
    DrillDefinition, Layout, LayoutSection, ObjRef, SectionHeader, SectionItem, StashId,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutState {
    pub layout: Layout,
    /// Items of removed sections/items, resurrectable by stash id.
    pub stash: HashMap<StashId, Vec<SectionItem>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutAction {
    SetLayout(Layout),
    AddSection {
        index: usize,
        section: LayoutSection,
        /// Stash ids consumed while building the section's items.
        consumed_stashes: Vec<StashId>,
    },
    MoveSection {
        from: usize,
        to: usize,
    },
    RemoveSection {
        index: usize,
        stash: Option<StashId>,
    },
    ChangeSectionHeader {
        index: usize,
        header: SectionHeader,
    },
    AddItems {
        section_index: usize,
        item_index: usize,
        items: Vec<SectionItem>,
        consumed_stashes: Vec<StashId>,
    },
    MoveItem {
        from_section: usize,
        from_item: usize,
        to_section: usize,
        to_item: usize,
    },
    RemoveItem {
        section_index: usize,
        item_index: usize,
        stash: Option<StashId>,
        /// Drop the section too when this removal empties it.
        remove_empty_section: bool,
    },
    ReplaceItem {
        section_index: usize,
        item_index: usize,
        item: SectionItem,
        stash: Option<StashId>,
        consumed_stashes: Vec<StashId>,
    },
    ChangeWidgetTitle {
        widget_id: String,
        title: String,
    },
    /// Upsert drill definitions on a widget, matched by origin.
    UpsertWidgetDrills {
        widget_id: String,
        drills: Vec<DrillDefinition>,
    },
    RemoveWidgetDrills {
        widget_id: String,
        origins: Vec<ObjRef>,
    },
    Restore(LayoutState),
}

pub(crate) fn apply(state: &mut LayoutState, action: LayoutAction) {
    match action {
        LayoutAction::SetLayout(layout) => {
            state.layout = layout;
            state.stash.clear();
        }
        LayoutAction::AddSection {
            index,
            section,
            consumed_stashes,
        } => {
            consume_stashes(state, &consumed_stashes);
            let index = index.min(state.layout.sections.len());
            state.layout.sections.insert(index, section);
        }
        LayoutAction::MoveSection { from, to } => {
            if from < state.layout.sections.len() {
                let section = state.layout.sections.remove(from);
                let to = to.min(state.layout.sections.len());
                state.layout.sections.insert(to, section);
            }
        }
        LayoutAction::RemoveSection { index, stash } => {
            if index < state.layout.sections.len() {
                let removed = state.layout.sections.remove(index);
                if let Some(stash_id) = stash {
                    state.stash.insert(stash_id, removed.items);
                }
            }
        }
        LayoutAction::ChangeSectionHeader { index, header } => {
            if let Some(section) = state.layout.sections.get_mut(index) {
                section.header = header;
            }
        }
        LayoutAction::AddItems {
            section_index,
            item_index,
            items,
            consumed_stashes,
        } => {
            consume_stashes(state, &consumed_stashes);
            if let Some(section) = state.layout.sections.get_mut(section_index) {
                let mut at = item_index.min(section.items.len());
                for item in items {
                    section.items.insert(at, item);
                    at += 1;
                }
            }
        }
        LayoutAction::MoveItem {
            from_section,
            from_item,
            to_section,
            to_item,
        } => {
            let item = state
                .layout
                .sections
                .get_mut(from_section)
                .filter(|section| from_item < section.items.len())
                .map(|section| section.items.remove(from_item));
            if let Some(item) = item {
                if let Some(target) = state.layout.sections.get_mut(to_section) {
                    let to_item = to_item.min(target.items.len());
                    target.items.insert(to_item, item);
                }
            }
        }
        LayoutAction::RemoveItem {
            section_index,
            item_index,
            stash,
            remove_empty_section,
        } => {
            let mut emptied = false;
            if let Some(section) = state.layout.sections.get_mut(section_index) {
                if item_index < section.items.len() {
                    let removed = section.items.remove(item_index);
                    if let Some(stash_id) = stash {
                        state.stash.insert(stash_id, vec![removed]);
                    }
                    emptied = section.items.is_empty();
                }
            }
            if emptied && remove_empty_section {
                state.layout.sections.remove(section_index);
            }
        }
        LayoutAction::ReplaceItem {
            section_index,
            item_index,
            item,
            stash,
            consumed_stashes,
        } => {
            consume_stashes(state, &consumed_stashes);
            if let Some(section) = state.layout.sections.get_mut(section_index) {
                if let Some(slot) = section.items.get_mut(item_index) {
                    let replaced = std::mem::replace(slot, item);
                    if let Some(stash_id) = stash {
                        state.stash.insert(stash_id, vec![replaced]);
                    }
                }
            }
        }
        LayoutAction::ChangeWidgetTitle { widget_id, title } => {
            if let Some(widget) = find_widget_mut(state, &widget_id) {
                widget.title = title;
            }
        }
        LayoutAction::UpsertWidgetDrills { widget_id, drills } => {
            if let Some(widget) = find_widget_mut(state, &widget_id) {
                for drill in drills {
                    match widget
                        .drills
                        .iter_mut()
                        .find(|existing| existing.origin == drill.origin)
                    {
                        Some(existing) => *existing = drill,
                        None => widget.drills.push(drill),
                    }
                }
            }
        }
        LayoutAction::RemoveWidgetDrills { widget_id, origins } => {
            if let Some(widget) = find_widget_mut(state, &widget_id) {
                widget.drills.retain(|drill| !origins.contains(&drill.origin));
            }
        }
        LayoutAction::Restore(prior) => *state = prior,
    }
}

fn consume_stashes(state: &mut LayoutState, stash_ids: &[StashId]) {
    for stash_id in stash_ids {
        state.stash.remove(stash_id);
    }
}

fn find_widget_mut<'a>(
    state: &'a mut LayoutState,
    widget_id: &str,
) -> Option<&'a mut crate::types::Widget> {
    state
        .layout
        .sections
        .iter_mut()
        .flat_map(|section| section.items.iter_mut())
        .map(|item| &mut item.widget)
        .find(|widget| widget.id == widget_id)
}

/// Find a widget in the layout by id; used by handler-side validation.
pub(crate) fn find_widget<'a>(state: &'a LayoutState, widget_id: &str) -> Option<&'a crate::types::Widget> {
    state
        .layout
        .sections
        .iter()
        .flat_map(|section| section.items.iter())
        .map(|item| &item.widget)
        .find(|widget| widget.id == widget_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Widget, WidgetKind};

    fn item(title: &str) -> SectionItem {
        SectionItem::new(Widget::new(WidgetKind::Insight(ObjRef::new("ins")), title))
    }

    fn state_with_section(items: Vec<SectionItem>) -> LayoutState {
        LayoutState {
            layout: Layout {
                sections: vec![LayoutSection {
                    header: SectionHeader::titled("s0"),
                    items,
                }],
            },
            stash: HashMap::new(),
        }
    }

    #[test]
    fn remove_section_with_stash_keeps_items_resurrectable() {
        let mut state = state_with_section(vec![item("a"), item("b")]);
        apply(
            &mut state,
            LayoutAction::RemoveSection {
                index: 0,
                stash: Some("stash-1".into()),
            },
        );

        assert!(state.layout.sections.is_empty());
        assert_eq!(state.stash["stash-1"].len(), 2);
    }

    #[test]
    fn add_section_consumes_used_stashes() {
        let mut state = LayoutState::default();
        state.stash.insert("stash-1".into(), vec![item("a")]);

        let items = state.stash["stash-1"].clone();
        apply(
            &mut state,
            LayoutAction::AddSection {
                index: 0,
                section: LayoutSection {
                    header: SectionHeader::default(),
                    items,
                },
                consumed_stashes: vec!["stash-1".into()],
            },
        );

        assert_eq!(state.layout.sections[0].items.len(), 1);
        assert!(state.stash.is_empty(), "stash consumed on use");
    }

    #[test]
    fn eager_remove_drops_emptied_section() {
        let mut state = state_with_section(vec![item("only")]);
        apply(
            &mut state,
            LayoutAction::RemoveItem {
                section_index: 0,
                item_index: 0,
                stash: None,
                remove_empty_section: true,
            },
        );
        assert!(state.layout.sections.is_empty());
    }

    #[test]
    fn non_eager_remove_keeps_empty_section() {
        let mut state = state_with_section(vec![item("only")]);
        apply(
            &mut state,
            LayoutAction::RemoveItem {
                section_index: 0,
                item_index: 0,
                stash: None,
                remove_empty_section: false,
            },
        );
        assert_eq!(state.layout.sections.len(), 1);
        assert!(state.layout.sections[0].items.is_empty());
    }

    #[test]
    fn move_item_across_sections() {
        let mut state = state_with_section(vec![item("a"), item("b")]);
        state.layout.sections.push(LayoutSection::default());

        apply(
            &mut state,
            LayoutAction::MoveItem {
                from_section: 0,
                from_item: 1,
                to_section: 1,
                to_item: 0,
            },
        );

        assert_eq!(state.layout.sections[0].items.len(), 1);
        assert_eq!(state.layout.sections[1].items[0].widget.title, "b");
    }

    #[test]
    fn upsert_drills_replaces_matching_origin() {
        let mut state = state_with_section(vec![item("a")]);
        let widget_id = state.layout.sections[0].items[0].widget.id.clone();
        let origin = ObjRef::new("measure.revenue");

        apply(
            &mut state,
            LayoutAction::UpsertWidgetDrills {
                widget_id: widget_id.clone(),
                drills: vec![DrillDefinition {
                    origin: origin.clone(),
                    target: crate::types::DrillTarget::Url("https://a".into()),
                }],
            },
        );
        apply(
            &mut state,
            LayoutAction::UpsertWidgetDrills {
                widget_id: widget_id.clone(),
                drills: vec![DrillDefinition {
                    origin: origin.clone(),
                    target: crate::types::DrillTarget::Url("https://b".into()),
                }],
            },
        );

        let widget = find_widget(&state, &widget_id).expect("widget exists");
        assert_eq!(widget.drills.len(), 1, "same origin upserts in place");
        assert_eq!(
            widget.drills[0].target,
            crate::types::DrillTarget::Url("https://b".into())
        );
    }

    #[test]
    fn out_of_range_indexes_are_ignored() {
        let mut state = state_with_section(vec![item("a")]);
        let before = state.clone();
        apply(
            &mut state,
            LayoutAction::RemoveSection {
                index: 5,
                stash: None,
            },
        );
        apply(
            &mut state,
            LayoutAction::ChangeSectionHeader {
                index: 5,
                header: SectionHeader::titled("x"),
            },
        );
        assert_eq!(state, before);
    }
}
