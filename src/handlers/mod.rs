//! Command handler bodies and the plumbing they run on.
//!
//! A handler is an async function taking [`HandlerOps`] and the command's
//! payload, returning the command's success event or a [`HandlerError`].
//! Handlers never publish their own terminal event; the dispatcher does
//! that from the handler's return value, which is what makes the
//! one-terminal-event-per-command invariant easy to audit.

pub(crate) mod dashboard;
pub(crate) mod drill;
pub(crate) mod execution;
pub(crate) mod filters;
pub(crate) mod layout;
pub(crate) mod render;
pub(crate) mod widgets;

use std::sync::Arc;

use tokio::sync::watch;

use crate::backend::BackendProvider;
use crate::command::{CorrelationId, DashboardCommand};
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, HandlerError};
use crate::event::DashboardEvent;
use crate::store::undo::UndoJournal;
use crate::store::{StateAction, StateTree};

/// Capabilities handed to every handler: state access, mutation dispatch,
/// intermediate event publishing, undo recording, cancellation checkpoints,
/// and nested command dispatch.
pub(crate) struct HandlerOps {
    dispatcher: Arc<Dispatcher>,
    correlation_id: CorrelationId,
    shutdown: watch::Receiver<bool>,
    /// Set for exclusive-class commands; flips when a newer command of the
    /// same class supersedes this one.
    superseded: Option<watch::Receiver<bool>>,
}

impl HandlerOps {
    pub(crate) fn new(
        dispatcher: Arc<Dispatcher>,
        correlation_id: CorrelationId,
        shutdown: watch::Receiver<bool>,
        superseded: Option<watch::Receiver<bool>>,
    ) -> Self {
        Self {
            dispatcher,
            correlation_id,
            shutdown,
            superseded,
        }
    }

    pub(crate) fn workspace(&self) -> &str {
        self.dispatcher.workspace()
    }

    /// The dashboard reference the session was built for, if any.
    pub(crate) fn initial_dashboard(&self) -> Option<crate::types::ObjRef> {
        self.dispatcher.initial_dashboard().cloned()
    }

    pub(crate) fn backend(&self) -> &Arc<dyn BackendProvider> {
        self.dispatcher.backend()
    }

    pub(crate) fn journal(&self) -> &UndoJournal {
        self.dispatcher.journal()
    }

    /// Read the state tree.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&StateTree) -> R) -> R {
        self.dispatcher.store().read(f)
    }

    /// Apply a state action without recording undo history.
    pub(crate) fn mutate(&self, action: StateAction) -> u64 {
        self.dispatcher.store().dispatch(action)
    }

    /// Apply a state action and journal its inverse for undo. The entry is
    /// recorded under the store's write lock, so concurrent undoable
    /// commands journal in the order their mutations land.
    pub(crate) fn mutate_undoable(&self, action: StateAction) -> u64 {
        self.dispatcher.store().dispatch_undoable(
            action,
            self.dispatcher.journal(),
            self.correlation_id.clone(),
        )
    }

    /// Publish an intermediate (non-terminal) event carrying this command's
    /// correlation id.
    pub(crate) fn publish(&self, event: DashboardEvent) {
        self.dispatcher
            .publish(Some(self.correlation_id.clone()), event);
    }

    /// Cancellation checkpoint. Handlers call this around every suspension
    /// point; past a checkpoint the handler runs to its next one without
    /// observing teardown or supersession.
    ///
    /// # Errors
    ///
    /// `HandlerError::Cancelled` once the session is torn down or this
    /// command was superseded by a newer one of its exclusive class.
    pub(crate) fn checkpoint(&self) -> Result<(), HandlerError> {
        if *self.shutdown.borrow() {
            return Err(HandlerError::Cancelled);
        }
        if let Some(superseded) = &self.superseded {
            if *superseded.borrow() {
                return Err(HandlerError::Cancelled);
            }
        }
        Ok(())
    }

    /// Dispatch a nested command and await its terminal event. The nested
    /// command gets its own correlation id and its own events; a nested
    /// failure converts into this handler's failure via
    /// `HandlerError::Nested`.
    pub(crate) async fn nested(
        &self,
        command: DashboardCommand,
    ) -> Result<DashboardEvent, DispatchError> {
        let (_, receiver) = self.dispatcher.submit(command, None);
        receiver.await.unwrap_or(Err(DispatchError::Cancelled))
    }
}

/// Route a command to its handler. Exhaustive: a new command variant
/// without a handler arm is a compile error.
pub(crate) async fn run(
    ops: HandlerOps,
    command: DashboardCommand,
) -> Result<DashboardEvent, HandlerError> {
    match command {
        DashboardCommand::Initialize => dashboard::initialize(&ops).await,
        DashboardCommand::Save => dashboard::save(&ops).await,
        DashboardCommand::SaveAs { title } => dashboard::save_as(&ops, title).await,
        DashboardCommand::Rename { new_title } => dashboard::rename(&ops, new_title),
        DashboardCommand::Delete => dashboard::delete(&ops).await,
        DashboardCommand::Reset => dashboard::reset(&ops),
        DashboardCommand::ExportToPdf => dashboard::export_to_pdf(&ops).await,

        DashboardCommand::ChangeDateFilterSelection { selection } => {
            filters::change_date_filter_selection(&ops, selection)
        }
        DashboardCommand::AddAttributeFilter {
            display_form,
            index,
            parents,
        } => filters::add_attribute_filter(&ops, display_form, index, parents),
        DashboardCommand::RemoveAttributeFilters { local_ids } => {
            filters::remove_attribute_filters(&ops, local_ids)
        }
        DashboardCommand::MoveAttributeFilter { local_id, to_index } => {
            filters::move_attribute_filter(&ops, local_id, to_index)
        }
        DashboardCommand::ChangeAttributeFilterSelection {
            local_id,
            elements,
            negative,
        } => filters::change_attribute_filter_selection(&ops, local_id, elements, negative),
        DashboardCommand::SetAttributeFilterParents { local_id, parents } => {
            filters::set_attribute_filter_parents(&ops, local_id, parents)
        }
        DashboardCommand::ChangeFilterContextSelection { selections } => {
            filters::change_filter_context_selection(&ops, selections)
        }

        DashboardCommand::AddLayoutSection {
            index,
            header,
            items,
        } => layout::add_layout_section(&ops, index, header, items),
        DashboardCommand::MoveLayoutSection {
            section_index,
            to_index,
        } => layout::move_layout_section(&ops, section_index, to_index),
        DashboardCommand::RemoveLayoutSection { index, stash } => {
            layout::remove_layout_section(&ops, index, stash)
        }
        DashboardCommand::ChangeLayoutSectionHeader {
            index,
            header,
            merge,
        } => layout::change_layout_section_header(&ops, index, header, merge),
        DashboardCommand::AddSectionItems {
            section_index,
            item_index,
            items,
        } => layout::add_section_items(&ops, section_index, item_index, items),
        DashboardCommand::MoveSectionItem {
            section_index,
            item_index,
            to_section_index,
            to_item_index,
        } => layout::move_section_item(
            &ops,
            section_index,
            item_index,
            to_section_index,
            to_item_index,
        ),
        DashboardCommand::RemoveSectionItem {
            section_index,
            item_index,
            stash,
            eager,
        } => layout::remove_section_item(&ops, section_index, item_index, stash, eager),
        DashboardCommand::ReplaceSectionItem {
            section_index,
            item_index,
            item,
            stash,
        } => layout::replace_section_item(&ops, section_index, item_index, item, stash),

        DashboardCommand::Undo => layout::undo(&ops),
        DashboardCommand::Redo => layout::redo(&ops),

        DashboardCommand::ChangeWidgetHeader { widget_id, title } => {
            widgets::change_widget_header(&ops, widget_id, title)
        }
        DashboardCommand::ModifyDrillsForWidget { widget_id, drills } => {
            widgets::modify_drills_for_widget(&ops, widget_id, drills)
        }
        DashboardCommand::RemoveDrillsForWidget { widget_id, origins } => {
            widgets::remove_drills_for_widget(&ops, widget_id, origins)
        }
        // Rejected in validate(); kept in the match so the routing table
        // stays exhaustive.
        DashboardCommand::RefreshWidget { .. } => Err(HandlerError::validation(
            "refresh_widget is not supported",
        )),

        DashboardCommand::Drill {
            widget_id,
            definition,
        } => drill::drill(&ops, widget_id, definition).await,
        DashboardCommand::DrillDown { widget_id, insight } => {
            drill::drill_down(&ops, widget_id, insight).await
        }
        DashboardCommand::DrillToInsight { widget_id, insight } => {
            drill::drill_to_insight(&ops, widget_id, insight)
        }
        DashboardCommand::DrillToDashboard {
            dashboard,
            selections,
        } => drill::drill_to_dashboard(&ops, dashboard, selections),
        DashboardCommand::DrillToUrl {
            widget_id,
            url_template,
        } => drill::drill_to_url(&ops, widget_id, url_template).await,
        DashboardCommand::ChangeDrillableItems { items } => {
            drill::change_drillable_items(&ops, items)
        }

        DashboardCommand::RequestAsyncRender { render_id } => {
            render::request_async_render(&ops, render_id)
        }
        DashboardCommand::ResolveAsyncRender { render_id } => {
            render::resolve_async_render(&ops, render_id)
        }

        DashboardCommand::UpsertExecutionResult { widget_id, outcome } => {
            execution::upsert_execution_result(&ops, widget_id, outcome)
        }

        DashboardCommand::TriggerEvent { payload } => {
            Ok(DashboardEvent::CustomEventTriggered { payload })
        }
    }
}
