//! Filter context slice: the date filter plus ordered attribute filters.

use crate::types::{AttributeFilter, DateFilterSelection, FilterContext, FilterSelection};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterContextState {
    pub date_filter: DateFilterSelection,
    pub attribute_filters: Vec<AttributeFilter>,
}

impl FilterContextState {
    pub fn as_context(&self) -> FilterContext {
        FilterContext {
            date_filter: self.date_filter.clone(),
            attribute_filters: self.attribute_filters.clone(),
        }
    }

    pub fn from_context(context: FilterContext) -> Self {
        Self {
            date_filter: context.date_filter,
            attribute_filters: context.attribute_filters,
        }
    }

    pub fn position_of(&self, local_id: &str) -> Option<usize> {
        self.attribute_filters
            .iter()
            .position(|filter| filter.local_id == local_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterContextAction {
    Set(FilterContext),
    SetDateSelection(DateFilterSelection),
    AddFilter {
        index: usize,
        filter: AttributeFilter,
    },
    RemoveFilters {
        local_ids: Vec<String>,
    },
    MoveFilter {
        from: usize,
        to: usize,
    },
    SetSelection {
        local_id: String,
        elements: Vec<String>,
        negative: bool,
    },
    SetParents {
        local_id: String,
        parents: Vec<String>,
    },
    /// Bulk selection change, best-effort matched by local id.
    ApplySelections(Vec<FilterSelection>),
    Restore(FilterContextState),
}

pub(crate) fn apply(state: &mut FilterContextState, action: FilterContextAction) {
    match action {
        FilterContextAction::Set(context) => *state = FilterContextState::from_context(context),
        FilterContextAction::SetDateSelection(selection) => state.date_filter = selection,
        FilterContextAction::AddFilter { index, filter } => {
            let index = index.min(state.attribute_filters.len());
            state.attribute_filters.insert(index, filter);
        }
        FilterContextAction::RemoveFilters { local_ids } => {
            state
                .attribute_filters
                .retain(|filter| !local_ids.contains(&filter.local_id));
            // Removed filters must also disappear from parent lists.
            for filter in &mut state.attribute_filters {
                filter.parents.retain(|parent| !local_ids.contains(parent));
            }
        }
        FilterContextAction::MoveFilter { from, to } => {
            if from < state.attribute_filters.len() {
                let filter = state.attribute_filters.remove(from);
                let to = to.min(state.attribute_filters.len());
                state.attribute_filters.insert(to, filter);
            }
        }
        FilterContextAction::SetSelection {
            local_id,
            elements,
            negative,
        } => {
            if let Some(filter) = filter_mut(state, &local_id) {
                filter.elements = elements;
                filter.negative = negative;
            }
        }
        FilterContextAction::SetParents { local_id, parents } => {
            if let Some(filter) = filter_mut(state, &local_id) {
                filter.parents = parents;
            }
        }
        FilterContextAction::ApplySelections(selections) => {
            for selection in selections {
                match selection {
                    FilterSelection::Date(date) => state.date_filter = date,
                    FilterSelection::Attribute {
                        local_id,
                        elements,
                        negative,
                    } => {
                        // Best effort: selections for unknown filters are
                        // silently skipped.
                        if let Some(filter) = filter_mut(state, &local_id) {
                            filter.elements = elements;
                            filter.negative = negative;
                        }
                    }
                }
            }
        }
        FilterContextAction::Restore(prior) => *state = prior,
    }
}

fn filter_mut<'a>(
    state: &'a mut FilterContextState,
    local_id: &str,
) -> Option<&'a mut AttributeFilter> {
    state
        .attribute_filters
        .iter_mut()
        .find(|filter| filter.local_id == local_id)
}
