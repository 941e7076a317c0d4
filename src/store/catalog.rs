//! Catalog slice: workspace items usable on this dashboard.

use crate::types::CatalogItem;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogState {
    pub items: Vec<CatalogItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogAction {
    SetItems(Vec<CatalogItem>),
    Restore(CatalogState),
}

pub(crate) fn apply(state: &mut CatalogState, action: CatalogAction) {
    match action {
        CatalogAction::SetItems(items) => state.items = items,
        CatalogAction::Restore(prior) => *state = prior,
    }
}
