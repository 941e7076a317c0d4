//! Read-side projections over the state tree.
//!
//! Plain selector functions compute from a `&StateTree`; [`Memo`] caches a
//! computed value keyed by the store's version counter, so a selector over
//! an unchanged tree returns the cached clone without recomputing.

use std::sync::Mutex;

use crate::store::{StateStore, StateTree};
use crate::types::{FilterContext, Layout, ObjRef, Permissions};

/// Version-keyed memoization cell for one derived value.
///
/// `get` recomputes only when the store's version moved since the cached
/// computation; otherwise it returns a clone of the cached value.
pub struct Memo<T> {
    cache: Mutex<Option<(u64, T)>>,
}

impl<T: Clone> Memo<T> {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(None),
        }
    }

    pub fn get(&self, store: &StateStore, compute: impl FnOnce(&StateTree) -> T) -> T {
        let version = store.version();
        {
            let cache = self.cache.lock().expect("memo lock poisoned");
            if let Some((cached_version, value)) = cache.as_ref() {
                if *cached_version == version {
                    return value.clone();
                }
            }
        }
        // The tree may move between the version read and this compute; a
        // stale cache entry for one version is harmless, the next call
        // recomputes.
        let value = store.read(compute);
        *self.cache.lock().expect("memo lock poisoned") = Some((version, value.clone()));
        value
    }
}

impl<T: Clone> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub fn select_title(tree: &StateTree) -> String {
    tree.meta.title.clone()
}

pub fn select_dashboard_ref(tree: &StateTree) -> Option<ObjRef> {
    tree.meta.dashboard.clone()
}

pub fn select_layout(tree: &StateTree) -> Layout {
    tree.layout.layout.clone()
}

pub fn select_filter_context(tree: &StateTree) -> FilterContext {
    tree.filter_context.as_context()
}

pub fn select_permissions(tree: &StateTree) -> Permissions {
    tree.permissions.permissions
}

pub fn select_is_initialized(tree: &StateTree) -> bool {
    tree.status.initialized
}

pub fn select_is_loading(tree: &StateTree) -> bool {
    tree.status.loading
}

pub fn select_is_saving(tree: &StateTree) -> bool {
    tree.status.saving
}

pub fn select_pending_render_count(tree: &StateTree) -> usize {
    tree.ui.pending_renders.len()
}
