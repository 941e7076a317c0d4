//! The single versioned state tree and its reducer pipeline.
//!
//! All mutation flows through [`StateStore::dispatch`]: an action names its
//! slice, the matching reducer applies it under the store's write lock, and
//! the tree's version counter bumps. Reducers are pure, synchronous, and
//! infallible; handlers resolve indexes and stash contents *before*
//! dispatching, so a reducer never has a failure path.

pub mod catalog;
pub mod executions;
pub mod filter_context;
pub mod layout;
pub mod meta;
pub mod permissions;
pub mod status;
pub mod ui;
pub mod undo;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::command::CorrelationId;
use undo::{UndoEntry, UndoJournal};

pub use catalog::{CatalogAction, CatalogState};
pub use executions::{ExecutionsAction, ExecutionsState};
pub use filter_context::{FilterContextAction, FilterContextState};
pub use layout::{LayoutAction, LayoutState};
pub use meta::{MetaAction, MetaState};
pub use permissions::{PermissionsAction, PermissionsState};
pub use status::{StatusAction, StatusState};
pub use ui::{UiAction, UiState};

/// Names of the state slices; undo entries and `UndoApplied` events carry
/// the slice they touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SliceId {
    Meta,
    Layout,
    FilterContext,
    Catalog,
    Permissions,
    Status,
    Executions,
    Ui,
}

/// The whole dashboard state. One instance per session; only reducers
/// mutate it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateTree {
    pub meta: MetaState,
    pub layout: LayoutState,
    pub filter_context: FilterContextState,
    pub catalog: CatalogState,
    pub permissions: PermissionsState,
    pub status: StatusState,
    pub executions: ExecutionsState,
    pub ui: UiState,
}

/// A state mutation, routed to exactly one slice reducer (`ResetAll`
/// excepted, which rebuilds the whole tree).
#[derive(Debug, Clone, PartialEq)]
pub enum StateAction {
    Meta(MetaAction),
    Layout(LayoutAction),
    FilterContext(FilterContextAction),
    Catalog(CatalogAction),
    Permissions(PermissionsAction),
    Status(StatusAction),
    Executions(ExecutionsAction),
    Ui(UiAction),
    /// Reset every slice to its empty default.
    ResetAll,
}

impl StateAction {
    /// The slice this action mutates; `None` for `ResetAll`.
    pub fn slice(&self) -> Option<SliceId> {
        match self {
            StateAction::Meta(_) => Some(SliceId::Meta),
            StateAction::Layout(_) => Some(SliceId::Layout),
            StateAction::FilterContext(_) => Some(SliceId::FilterContext),
            StateAction::Catalog(_) => Some(SliceId::Catalog),
            StateAction::Permissions(_) => Some(SliceId::Permissions),
            StateAction::Status(_) => Some(SliceId::Status),
            StateAction::Executions(_) => Some(SliceId::Executions),
            StateAction::Ui(_) => Some(SliceId::Ui),
            StateAction::ResetAll => None,
        }
    }
}

fn apply(tree: &mut StateTree, action: StateAction) {
    match action {
        StateAction::Meta(action) => meta::apply(&mut tree.meta, action),
        StateAction::Layout(action) => layout::apply(&mut tree.layout, action),
        StateAction::FilterContext(action) => {
            filter_context::apply(&mut tree.filter_context, action)
        }
        StateAction::Catalog(action) => catalog::apply(&mut tree.catalog, action),
        StateAction::Permissions(action) => permissions::apply(&mut tree.permissions, action),
        StateAction::Status(action) => status::apply(&mut tree.status, action),
        StateAction::Executions(action) => executions::apply(&mut tree.executions, action),
        StateAction::Ui(action) => ui::apply(&mut tree.ui, action),
        StateAction::ResetAll => *tree = StateTree::default(),
    }
}

/// Build the inverse of an undoable action against the current tree.
///
/// Most slices are only ever mutated by undoable commands between journal
/// clears, so a full-slice restore is an exact inverse. The meta slice also
/// takes non-undoable bookkeeping writes (save updates the reference and
/// the persisted definition), so a title change inverts field-wise instead
/// of snapshotting the slice.
fn inverse_of(tree: &StateTree, slice: SliceId, action: &StateAction) -> StateAction {
    match action {
        StateAction::Meta(MetaAction::SetTitle(_)) => {
            StateAction::Meta(MetaAction::SetTitle(tree.meta.title.clone()))
        }
        _ => restore_action(tree, slice),
    }
}

/// Build the action that restores a slice to its current contents.
fn restore_action(tree: &StateTree, slice: SliceId) -> StateAction {
    match slice {
        SliceId::Meta => StateAction::Meta(MetaAction::Restore(tree.meta.clone())),
        SliceId::Layout => StateAction::Layout(LayoutAction::Restore(tree.layout.clone())),
        SliceId::FilterContext => {
            StateAction::FilterContext(FilterContextAction::Restore(tree.filter_context.clone()))
        }
        SliceId::Catalog => StateAction::Catalog(CatalogAction::Restore(tree.catalog.clone())),
        SliceId::Permissions => {
            StateAction::Permissions(PermissionsAction::Restore(tree.permissions.clone()))
        }
        SliceId::Status => StateAction::Status(StatusAction::Restore(tree.status.clone())),
        SliceId::Executions => {
            StateAction::Executions(ExecutionsAction::Restore(tree.executions.clone()))
        }
        SliceId::Ui => StateAction::Ui(UiAction::Restore(tree.ui.clone())),
    }
}

/// Versioned container for the state tree.
///
/// The version counter increments on every applied action and never goes
/// backwards, including across undo; memoized selectors key off it.
pub struct StateStore {
    tree: RwLock<StateTree>,
    version: AtomicU64,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(StateTree::default()),
            version: AtomicU64::new(0),
        }
    }

    /// Apply one action. Returns the new tree version.
    pub fn dispatch(&self, action: StateAction) -> u64 {
        let mut tree = self.tree.write().expect("state tree lock poisoned");
        tracing::trace!(slice = ?action.slice(), "applying state action");
        apply(&mut tree, action);
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Apply one undoable action, journaling its inverse. Inverse capture,
    /// application, and the journal record all happen under the same write
    /// lock, so journal order always matches mutation order even under
    /// concurrent dispatch.
    ///
    /// Actions without a single slice apply without a journal entry.
    pub(crate) fn dispatch_undoable(
        &self,
        action: StateAction,
        journal: &UndoJournal,
        correlation_id: CorrelationId,
    ) -> u64 {
        let mut tree = self.tree.write().expect("state tree lock poisoned");
        if let Some(slice) = action.slice() {
            journal.record(UndoEntry {
                slice,
                inverse: inverse_of(&tree, slice, &action),
                forward: action.clone(),
                correlation_id,
            });
        }
        tracing::trace!(slice = ?action.slice(), "applying undoable state action");
        apply(&mut tree, action);
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Read the tree under the shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&StateTree) -> R) -> R {
        let tree = self.tree.read().expect("state tree lock poisoned");
        f(&tree)
    }

    /// Current tree version. Monotonic; bumped by every dispatch.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_bumps_version() {
        let store = StateStore::new();
        assert_eq!(store.version(), 0);

        let v1 = store.dispatch(StateAction::Meta(MetaAction::SetTitle("a".into())));
        let v2 = store.dispatch(StateAction::Meta(MetaAction::SetTitle("b".into())));

        assert_eq!(v1, 1);
        assert_eq!(v2, 2);
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn dispatch_routes_to_the_named_slice() {
        let store = StateStore::new();
        store.dispatch(StateAction::Meta(MetaAction::SetTitle("Revenue".into())));
        store.dispatch(StateAction::Status(StatusAction::SetLoading(true)));

        store.read(|tree| {
            assert_eq!(tree.meta.title, "Revenue");
            assert!(tree.status.loading);
            assert_eq!(tree.layout, LayoutState::default(), "other slices untouched");
        });
    }

    #[test]
    fn reset_all_restores_defaults_but_version_keeps_growing() {
        let store = StateStore::new();
        store.dispatch(StateAction::Meta(MetaAction::SetTitle("Revenue".into())));
        let before_reset = store.version();

        let after_reset = store.dispatch(StateAction::ResetAll);

        store.read(|tree| assert_eq!(*tree, StateTree::default()));
        assert!(after_reset > before_reset, "version never goes backwards");
    }

    #[test]
    fn undoable_layout_dispatch_journals_an_exact_inverse() {
        let store = StateStore::new();
        let journal = UndoJournal::new(50);
        let snapshot = store.read(|tree| tree.clone());

        store.dispatch_undoable(
            StateAction::Layout(LayoutAction::AddSection {
                index: 0,
                section: Default::default(),
                consumed_stashes: Vec::new(),
            }),
            &journal,
            CorrelationId::new("add-section"),
        );
        store.read(|tree| assert_eq!(tree.layout.layout.sections.len(), 1));

        let entry = journal.pop_for_undo().expect("dispatch journaled an entry");
        store.dispatch(entry.inverse);
        store.read(|tree| assert_eq!(*tree, snapshot));
    }

    #[test]
    fn title_inverse_leaves_later_meta_writes_intact() {
        let store = StateStore::new();
        let journal = UndoJournal::new(50);
        store.dispatch(StateAction::Meta(MetaAction::SetTitle("Original".into())));

        store.dispatch_undoable(
            StateAction::Meta(MetaAction::SetTitle("Q3 Report".into())),
            &journal,
            CorrelationId::new("rename"),
        );
        // Bookkeeping write on the same slice, not undoable.
        store.dispatch(StateAction::Meta(MetaAction::SetReference(
            crate::types::ObjRef::new("dashboard/1"),
        )));

        let entry = journal.pop_for_undo().expect("rename journaled an entry");
        store.dispatch(entry.inverse);

        store.read(|tree| {
            assert_eq!(tree.meta.title, "Original");
            assert_eq!(
                tree.meta.dashboard,
                Some(crate::types::ObjRef::new("dashboard/1")),
                "undoing the rename must not roll back the reference"
            );
        });
    }

    #[test]
    fn concurrent_undoable_dispatches_journal_in_application_order() {
        use std::sync::Arc;

        let store = Arc::new(StateStore::new());
        let journal = Arc::new(UndoJournal::new(256));
        store.dispatch(StateAction::Meta(MetaAction::SetTitle("base".into())));

        for round in 0..50 {
            let handles: Vec<_> = (0..2)
                .map(|i| {
                    let store = Arc::clone(&store);
                    let journal = Arc::clone(&journal);
                    std::thread::spawn(move || {
                        store.dispatch_undoable(
                            StateAction::Meta(MetaAction::SetTitle(format!("{round}-{i}"))),
                            &journal,
                            CorrelationId::new(format!("{round}-{i}")),
                        );
                    })
                })
                .collect();
            for handle in handles {
                handle.join().expect("dispatch thread panicked");
            }
        }

        // Whichever thread won each race, unwinding the journal retraces
        // the mutation order back to the starting title.
        while let Some(entry) = journal.pop_for_undo() {
            store.dispatch(entry.inverse);
        }
        store.read(|tree| assert_eq!(tree.meta.title, "base"));
    }
}
