//! The command inventory: everything a host can ask the dashboard to do.
//!
//! Commands form one closed sum type; routing in the dispatcher is an
//! exhaustive `match`, so adding a command without a handler is a compile
//! error rather than a runtime "unregistered command" path. Synchronous
//! payload validation lives here too: anything [`DashboardCommand::validate`]
//! rejects never spawns a handler and never touches state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RejectionReason;
use crate::types::{
    DateFilterSelection, DrillDefinition, FilterSelection, ItemDefinition, ObjRef, RelativeIndex,
    SectionHeader, StashId,
};

/// Opaque identifier correlating a command with its resulting events.
///
/// Callers may supply their own (any non-empty string); the session
/// generates one when none is given. All events published on behalf of a
/// command carry its correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random correlation id.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commands that may run at most one instance at a time.
///
/// Dispatching a command of a class with an instance already in flight
/// cancels the in-flight one; its dispatch future rejects with `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExclusiveClass {
    Initialize,
    Export,
}

/// Every command the dashboard engine accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DashboardCommand {
    // -- dashboard lifecycle ------------------------------------------------
    /// Load the dashboard, catalog, and permissions from the backend and
    /// populate the state tree. Resets undo history.
    Initialize,
    /// Persist the current layout and filter context.
    Save,
    /// Persist a copy of the current dashboard under a new title.
    SaveAs { title: String },
    /// Change the dashboard title. Undoable.
    Rename { new_title: String },
    /// Delete the persisted dashboard and clear all state.
    Delete,
    /// Discard unsaved changes by re-applying the last persisted definition.
    Reset,
    /// Export the dashboard to PDF via the backend.
    ExportToPdf,

    // -- filter context -----------------------------------------------------
    ChangeDateFilterSelection {
        selection: DateFilterSelection,
    },
    AddAttributeFilter {
        display_form: ObjRef,
        index: RelativeIndex,
        parents: Vec<String>,
    },
    RemoveAttributeFilters {
        local_ids: Vec<String>,
    },
    MoveAttributeFilter {
        local_id: String,
        to_index: RelativeIndex,
    },
    ChangeAttributeFilterSelection {
        local_id: String,
        elements: Vec<String>,
        negative: bool,
    },
    SetAttributeFilterParents {
        local_id: String,
        parents: Vec<String>,
    },
    /// Bulk selection change, best-effort matched by local id.
    ChangeFilterContextSelection {
        selections: Vec<FilterSelection>,
    },

    // -- layout ---------------------------------------------------------
    AddLayoutSection {
        index: RelativeIndex,
        header: SectionHeader,
        items: Vec<ItemDefinition>,
    },
    MoveLayoutSection {
        section_index: RelativeIndex,
        to_index: RelativeIndex,
    },
    RemoveLayoutSection {
        index: RelativeIndex,
        /// When set, the removed items are stashed under this id and can be
        /// resurrected by an `ItemDefinition::Stashed` reference.
        stash: Option<StashId>,
    },
    ChangeLayoutSectionHeader {
        index: RelativeIndex,
        header: SectionHeader,
        /// Merge with the existing header instead of replacing it.
        merge: bool,
    },
    AddSectionItems {
        section_index: RelativeIndex,
        item_index: RelativeIndex,
        items: Vec<ItemDefinition>,
    },
    MoveSectionItem {
        section_index: RelativeIndex,
        item_index: RelativeIndex,
        to_section_index: RelativeIndex,
        to_item_index: RelativeIndex,
    },
    RemoveSectionItem {
        section_index: RelativeIndex,
        item_index: RelativeIndex,
        stash: Option<StashId>,
        /// Remove the section as well when this was its last item.
        eager: bool,
    },
    ReplaceSectionItem {
        section_index: RelativeIndex,
        item_index: RelativeIndex,
        item: ItemDefinition,
        stash: Option<StashId>,
    },

    // -- undo / redo ------------------------------------------------------
    Undo,
    Redo,

    // -- widgets ----------------------------------------------------------
    ChangeWidgetHeader {
        widget_id: String,
        title: String,
    },
    /// Upsert drill definitions on a widget, matched by origin.
    ModifyDrillsForWidget {
        widget_id: String,
        drills: Vec<DrillDefinition>,
    },
    RemoveDrillsForWidget {
        widget_id: String,
        origins: Vec<ObjRef>,
    },
    /// Declared but unsupported; always rejected.
    RefreshWidget {
        widget_id: String,
    },

    // -- drilling -----------------------------------------------------------
    /// Perform a configured drill: runs the execution for the drill context
    /// and then dispatches the matching drill-to command.
    Drill {
        widget_id: String,
        definition: DrillDefinition,
    },
    DrillDown {
        widget_id: String,
        insight: ObjRef,
    },
    DrillToInsight {
        widget_id: String,
        insight: ObjRef,
    },
    DrillToDashboard {
        dashboard: Option<ObjRef>,
        selections: Vec<FilterSelection>,
    },
    DrillToUrl {
        widget_id: String,
        url_template: String,
    },
    ChangeDrillableItems {
        items: Vec<ObjRef>,
    },

    // -- render coordination ------------------------------------------------
    RequestAsyncRender {
        render_id: String,
    },
    ResolveAsyncRender {
        render_id: String,
    },

    // -- executions -----------------------------------------------------
    UpsertExecutionResult {
        widget_id: String,
        outcome: crate::types::ExecutionOutcome,
    },

    // -- custom passthrough ---------------------------------------------
    /// Re-emit an arbitrary host payload as a `CustomEventTriggered` event.
    TriggerEvent {
        payload: serde_json::Value,
    },
}

impl DashboardCommand {
    /// Short stable name used in log spans and failure messages.
    pub fn name(&self) -> &'static str {
        match self {
            DashboardCommand::Initialize => "initialize",
            DashboardCommand::Save => "save",
            DashboardCommand::SaveAs { .. } => "save_as",
            DashboardCommand::Rename { .. } => "rename",
            DashboardCommand::Delete => "delete",
            DashboardCommand::Reset => "reset",
            DashboardCommand::ExportToPdf => "export_to_pdf",
            DashboardCommand::ChangeDateFilterSelection { .. } => "change_date_filter_selection",
            DashboardCommand::AddAttributeFilter { .. } => "add_attribute_filter",
            DashboardCommand::RemoveAttributeFilters { .. } => "remove_attribute_filters",
            DashboardCommand::MoveAttributeFilter { .. } => "move_attribute_filter",
            DashboardCommand::ChangeAttributeFilterSelection { .. } => {
                "change_attribute_filter_selection"
            }
            DashboardCommand::SetAttributeFilterParents { .. } => "set_attribute_filter_parents",
            DashboardCommand::ChangeFilterContextSelection { .. } => {
                "change_filter_context_selection"
            }
            DashboardCommand::AddLayoutSection { .. } => "add_layout_section",
            DashboardCommand::MoveLayoutSection { .. } => "move_layout_section",
            DashboardCommand::RemoveLayoutSection { .. } => "remove_layout_section",
            DashboardCommand::ChangeLayoutSectionHeader { .. } => "change_layout_section_header",
            DashboardCommand::AddSectionItems { .. } => "add_section_items",
            DashboardCommand::MoveSectionItem { .. } => "move_section_item",
            DashboardCommand::RemoveSectionItem { .. } => "remove_section_item",
            DashboardCommand::ReplaceSectionItem { .. } => "replace_section_item",
            DashboardCommand::Undo => "undo",
            DashboardCommand::Redo => "redo",
            DashboardCommand::ChangeWidgetHeader { .. } => "change_widget_header",
            DashboardCommand::ModifyDrillsForWidget { .. } => "modify_drills_for_widget",
            DashboardCommand::RemoveDrillsForWidget { .. } => "remove_drills_for_widget",
            DashboardCommand::RefreshWidget { .. } => "refresh_widget",
            DashboardCommand::Drill { .. } => "drill",
            DashboardCommand::DrillDown { .. } => "drill_down",
            DashboardCommand::DrillToInsight { .. } => "drill_to_insight",
            DashboardCommand::DrillToDashboard { .. } => "drill_to_dashboard",
            DashboardCommand::DrillToUrl { .. } => "drill_to_url",
            DashboardCommand::ChangeDrillableItems { .. } => "change_drillable_items",
            DashboardCommand::RequestAsyncRender { .. } => "request_async_render",
            DashboardCommand::ResolveAsyncRender { .. } => "resolve_async_render",
            DashboardCommand::UpsertExecutionResult { .. } => "upsert_execution_result",
            DashboardCommand::TriggerEvent { .. } => "trigger_event",
        }
    }

    /// Exclusive-class tag, when this command supersedes in-flight commands
    /// of the same class.
    pub fn exclusive_class(&self) -> Option<ExclusiveClass> {
        match self {
            DashboardCommand::Initialize => Some(ExclusiveClass::Initialize),
            DashboardCommand::ExportToPdf => Some(ExclusiveClass::Export),
            _ => None,
        }
    }

    /// Synchronous payload validation.
    ///
    /// Only checks that need no state access happen here; state-dependent
    /// checks (index bounds, unknown widgets) are handler-side and surface
    /// as `CommandFailed` with `FailureKind::Validation`.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason published in the `CommandRejected`
    /// event; the command never starts.
    pub fn validate(&self) -> Result<(), RejectionReason> {
        match self {
            DashboardCommand::SaveAs { title } if title.trim().is_empty() => {
                Err(RejectionReason::EmptyField { field: "title" })
            }
            DashboardCommand::Rename { new_title } if new_title.trim().is_empty() => {
                Err(RejectionReason::EmptyField { field: "new_title" })
            }
            DashboardCommand::ChangeWidgetHeader { title, .. } if title.trim().is_empty() => {
                Err(RejectionReason::EmptyField { field: "title" })
            }
            DashboardCommand::AddAttributeFilter { index, .. } if *index < -1 => {
                Err(RejectionReason::MalformedIndex { index: *index })
            }
            DashboardCommand::SetAttributeFilterParents { local_id, parents }
                if parents.contains(local_id) =>
            {
                Err(RejectionReason::SelfParent)
            }
            DashboardCommand::AddLayoutSection { index, .. } if *index < -1 => {
                Err(RejectionReason::MalformedIndex { index: *index })
            }
            DashboardCommand::AddSectionItems { items, .. } if items.is_empty() => {
                Err(RejectionReason::EmptyField { field: "items" })
            }
            DashboardCommand::RefreshWidget { .. } => Err(RejectionReason::Unsupported {
                name: "refresh_widget",
            }),
            DashboardCommand::RequestAsyncRender { render_id }
            | DashboardCommand::ResolveAsyncRender { render_id }
                if render_id.is_empty() =>
            {
                Err(RejectionReason::EmptyField { field: "render_id" })
            }
            _ => {
                if let Some(index) = self.malformed_index() {
                    return Err(RejectionReason::MalformedIndex { index });
                }
                Ok(())
            }
        }
    }

    /// First relative index in the payload below the `-1` floor, if any.
    fn malformed_index(&self) -> Option<RelativeIndex> {
        fn first_bad(indexes: &[RelativeIndex]) -> Option<RelativeIndex> {
            indexes.iter().copied().find(|index| *index < -1)
        }
        match self {
            DashboardCommand::MoveAttributeFilter { to_index, .. } => first_bad(&[*to_index]),
            DashboardCommand::MoveLayoutSection {
                section_index,
                to_index,
            } => first_bad(&[*section_index, *to_index]),
            DashboardCommand::RemoveLayoutSection { index, .. }
            | DashboardCommand::ChangeLayoutSectionHeader { index, .. } => first_bad(&[*index]),
            DashboardCommand::AddSectionItems {
                section_index,
                item_index,
                ..
            } => first_bad(&[*section_index, *item_index]),
            DashboardCommand::MoveSectionItem {
                section_index,
                item_index,
                to_section_index,
                to_item_index,
            } => first_bad(&[
                *section_index,
                *item_index,
                *to_section_index,
                *to_item_index,
            ]),
            DashboardCommand::RemoveSectionItem {
                section_index,
                item_index,
                ..
            }
            | DashboardCommand::ReplaceSectionItem {
                section_index,
                item_index,
                ..
            } => first_bad(&[*section_index, *item_index]),
            _ => None,
        }
    }
}

// Creator shorthands for the payload-heavy commands; hosts can always build
// the enum variants directly.
impl DashboardCommand {
    pub fn rename(new_title: impl Into<String>) -> Self {
        DashboardCommand::Rename {
            new_title: new_title.into(),
        }
    }

    pub fn add_layout_section(
        index: RelativeIndex,
        header: SectionHeader,
        items: Vec<ItemDefinition>,
    ) -> Self {
        DashboardCommand::AddLayoutSection {
            index,
            header,
            items,
        }
    }

    /// Remove a section without stashing its items.
    pub fn remove_layout_section(index: RelativeIndex) -> Self {
        DashboardCommand::RemoveLayoutSection { index, stash: None }
    }

    /// Remove an item and its section too when the section becomes empty.
    pub fn eager_remove_section_item(
        section_index: RelativeIndex,
        item_index: RelativeIndex,
    ) -> Self {
        DashboardCommand::RemoveSectionItem {
            section_index,
            item_index,
            stash: None,
            eager: true,
        }
    }
}
