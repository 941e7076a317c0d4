//! The event inventory and the envelope every published event travels in.
//!
//! Events are facts: they are emitted after the corresponding state change
//! has been applied, never before. Each command produces exactly one
//! terminal event (its success event, `CommandFailed`, or
//! `CommandRejected`); the session's correlation table settles dispatch
//! futures off these terminal events.

use serde::{Deserialize, Serialize};

use crate::backend::ExecutionResult;
use crate::command::{CorrelationId, DashboardCommand};
use crate::error::FailureKind;
use crate::store::SliceId;
use crate::types::{
    AttributeFilter, DateFilterSelection, DrillDefinition, ExecutionOutcome, LayoutSection,
    ObjRef, SectionHeader, StashId,
};

/// Context snapshot stamped onto every envelope at publish time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    pub workspace: String,
    /// Reference of the dashboard, once known (after initialize or save).
    pub dashboard: Option<ObjRef>,
    /// State tree version at the moment of emission.
    pub state_version: u64,
}

/// A published event plus its delivery metadata.
///
/// `sequence` is allocated per session and increases monotonically; gaps
/// never occur, so listeners can detect missed events after resubscribing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub sequence: u64,
    /// Correlation id of the command this event was emitted for, if any.
    pub correlation_id: Option<CorrelationId>,
    pub ctx: EventContext,
    pub event: DashboardEvent,
}

/// Every event the dashboard engine publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DashboardEvent {
    // -- engine-level -----------------------------------------------------
    /// A command passed validation and its handler is about to run.
    CommandStarted { command: DashboardCommand },
    /// A command failed synchronous validation or is unsupported; nothing
    /// ran and no state changed.
    CommandRejected {
        command: DashboardCommand,
        reason: String,
    },
    /// A command's handler failed after starting.
    CommandFailed {
        command: DashboardCommand,
        kind: FailureKind,
        message: String,
    },
    /// The whole state tree was reset to its empty defaults.
    StateCleared,

    // -- dashboard lifecycle ------------------------------------------------
    DashboardInitialized {
        dashboard: Option<ObjRef>,
        title: String,
    },
    DashboardSaved {
        reference: ObjRef,
        /// True when this save created the dashboard.
        new_dashboard: bool,
    },
    DashboardCopySaved {
        reference: ObjRef,
        title: String,
    },
    DashboardRenamed {
        new_title: String,
    },
    DashboardDeleted,
    DashboardWasReset,
    DashboardExportedToPdf {
        uri: String,
    },

    // -- filter context -----------------------------------------------------
    DateFilterSelectionChanged {
        selection: DateFilterSelection,
    },
    AttributeFilterAdded {
        filter: AttributeFilter,
        index: usize,
    },
    AttributeFiltersRemoved {
        local_ids: Vec<String>,
    },
    AttributeFilterMoved {
        local_id: String,
        from_index: usize,
        to_index: usize,
    },
    AttributeFilterSelectionChanged {
        local_id: String,
        elements: Vec<String>,
        negative: bool,
    },
    AttributeFilterParentsChanged {
        local_id: String,
        parents: Vec<String>,
    },
    FilterContextSelectionChanged,

    // -- layout ---------------------------------------------------------
    LayoutSectionAdded {
        index: usize,
        section: LayoutSection,
    },
    LayoutSectionMoved {
        from_index: usize,
        to_index: usize,
    },
    LayoutSectionRemoved {
        index: usize,
        stash: Option<StashId>,
    },
    LayoutSectionHeaderChanged {
        index: usize,
        header: SectionHeader,
    },
    SectionItemsAdded {
        section_index: usize,
        item_index: usize,
        count: usize,
    },
    SectionItemMoved {
        from_section_index: usize,
        from_item_index: usize,
        to_section_index: usize,
        to_item_index: usize,
    },
    SectionItemRemoved {
        section_index: usize,
        item_index: usize,
        stash: Option<StashId>,
        /// True when eager removal also dropped the emptied section.
        section_removed: bool,
    },
    SectionItemReplaced {
        section_index: usize,
        item_index: usize,
    },

    // -- undo / redo ------------------------------------------------------
    UndoApplied {
        slice: SliceId,
        /// Correlation id of the command whose effect was undone.
        undone_correlation: CorrelationId,
    },
    RedoApplied {
        slice: SliceId,
        redone_correlation: CorrelationId,
    },

    // -- widgets ----------------------------------------------------------
    WidgetHeaderChanged {
        widget_id: String,
        title: String,
    },
    WidgetDrillsModified {
        widget_id: String,
        drills: Vec<DrillDefinition>,
    },
    WidgetDrillsRemoved {
        widget_id: String,
        origins: Vec<ObjRef>,
    },

    // -- drilling -----------------------------------------------------------
    DrillPerformed {
        widget_id: String,
        definition: DrillDefinition,
        result: ExecutionResult,
    },
    DrillDownResolved {
        widget_id: String,
        insight: ObjRef,
        result: ExecutionResult,
    },
    DrillToInsightResolved {
        widget_id: String,
        insight: ObjRef,
    },
    DrillToDashboardResolved {
        dashboard: Option<ObjRef>,
    },
    DrillToUrlResolved {
        widget_id: String,
        url: String,
    },
    DrillableItemsChanged {
        items: Vec<ObjRef>,
    },

    // -- render coordination ------------------------------------------------
    AsyncRenderRequested {
        render_id: String,
    },
    AsyncRenderResolved {
        render_id: String,
    },
    /// Every requested async render has resolved; the dashboard is fully
    /// rendered. Published in addition to the resolving command's terminal
    /// event.
    RenderResolved,

    // -- executions -----------------------------------------------------
    ExecutionResultUpserted {
        widget_id: String,
        outcome: ExecutionOutcome,
    },

    // -- custom passthrough ---------------------------------------------
    CustomEventTriggered {
        payload: serde_json::Value,
    },
}

impl DashboardEvent {
    /// Whether this event settles its command's dispatch future.
    ///
    /// Non-terminal events are informational extras published while a
    /// command is still in flight (or, for `RenderResolved` and
    /// `StateCleared`, alongside another command's terminal event).
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            DashboardEvent::CommandStarted { .. }
                | DashboardEvent::StateCleared
                | DashboardEvent::RenderResolved
        )
    }

    /// Short stable name used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            DashboardEvent::CommandStarted { .. } => "command_started",
            DashboardEvent::CommandRejected { .. } => "command_rejected",
            DashboardEvent::CommandFailed { .. } => "command_failed",
            DashboardEvent::StateCleared => "state_cleared",
            DashboardEvent::DashboardInitialized { .. } => "dashboard_initialized",
            DashboardEvent::DashboardSaved { .. } => "dashboard_saved",
            DashboardEvent::DashboardCopySaved { .. } => "dashboard_copy_saved",
            DashboardEvent::DashboardRenamed { .. } => "dashboard_renamed",
            DashboardEvent::DashboardDeleted => "dashboard_deleted",
            DashboardEvent::DashboardWasReset => "dashboard_was_reset",
            DashboardEvent::DashboardExportedToPdf { .. } => "dashboard_exported_to_pdf",
            DashboardEvent::DateFilterSelectionChanged { .. } => "date_filter_selection_changed",
            DashboardEvent::AttributeFilterAdded { .. } => "attribute_filter_added",
            DashboardEvent::AttributeFiltersRemoved { .. } => "attribute_filters_removed",
            DashboardEvent::AttributeFilterMoved { .. } => "attribute_filter_moved",
            DashboardEvent::AttributeFilterSelectionChanged { .. } => {
                "attribute_filter_selection_changed"
            }
            DashboardEvent::AttributeFilterParentsChanged { .. } => {
                "attribute_filter_parents_changed"
            }
            DashboardEvent::FilterContextSelectionChanged => "filter_context_selection_changed",
            DashboardEvent::LayoutSectionAdded { .. } => "layout_section_added",
            DashboardEvent::LayoutSectionMoved { .. } => "layout_section_moved",
            DashboardEvent::LayoutSectionRemoved { .. } => "layout_section_removed",
            DashboardEvent::LayoutSectionHeaderChanged { .. } => "layout_section_header_changed",
            DashboardEvent::SectionItemsAdded { .. } => "section_items_added",
            DashboardEvent::SectionItemMoved { .. } => "section_item_moved",
            DashboardEvent::SectionItemRemoved { .. } => "section_item_removed",
            DashboardEvent::SectionItemReplaced { .. } => "section_item_replaced",
            DashboardEvent::UndoApplied { .. } => "undo_applied",
            DashboardEvent::RedoApplied { .. } => "redo_applied",
            DashboardEvent::WidgetHeaderChanged { .. } => "widget_header_changed",
            DashboardEvent::WidgetDrillsModified { .. } => "widget_drills_modified",
            DashboardEvent::WidgetDrillsRemoved { .. } => "widget_drills_removed",
            DashboardEvent::DrillPerformed { .. } => "drill_performed",
            DashboardEvent::DrillDownResolved { .. } => "drill_down_resolved",
            DashboardEvent::DrillToInsightResolved { .. } => "drill_to_insight_resolved",
            DashboardEvent::DrillToDashboardResolved { .. } => "drill_to_dashboard_resolved",
            DashboardEvent::DrillToUrlResolved { .. } => "drill_to_url_resolved",
            DashboardEvent::DrillableItemsChanged { .. } => "drillable_items_changed",
            DashboardEvent::AsyncRenderRequested { .. } => "async_render_requested",
            DashboardEvent::AsyncRenderResolved { .. } => "async_render_resolved",
            DashboardEvent::RenderResolved => "render_resolved",
            DashboardEvent::ExecutionResultUpserted { .. } => "execution_result_upserted",
            DashboardEvent::CustomEventTriggered { .. } => "custom_event_triggered",
        }
    }
}
