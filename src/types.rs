//! Core domain types shared by commands, events, and state slices.
//!
//! These are deliberately small, serde-friendly value types. The command
//! core never interprets visualization internals; widgets and insights are
//! carried as opaque references plus the few fields the engine itself
//! manipulates (titles, drill definitions, layout sizing).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference to a backend-managed object (dashboard, insight, display form).
///
/// Opaque to the engine; only the backend collaborator interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjRef(pub String);

impl ObjRef {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self(identifier.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjRef {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Identifier of a stash of removed layout items.
///
/// When removing a section or item, the caller may stash the removed items
/// under an identifier and later resurrect them by using that identifier in
/// place of an item definition. Stashes are consumed on use.
pub type StashId = String;

/// Relative index into a list: zero-based, with `-1` meaning "at the end".
///
/// This convention is used by every layout command that places sections or
/// items, mirroring the dispatch API's ergonomics for append operations.
pub type RelativeIndex = i32;

/// Resolve a relative index against a list of the given length.
///
/// Returns `None` if the index is out of bounds. `-1` resolves to `len`
/// (append position) when `allow_end` is true, or `len - 1` otherwise.
pub(crate) fn resolve_index(index: RelativeIndex, len: usize, allow_end: bool) -> Option<usize> {
    if index == -1 {
        if allow_end {
            return Some(len);
        }
        return len.checked_sub(1);
    }
    if index < 0 {
        return None;
    }
    let idx = index as usize;
    let limit = if allow_end { len } else { len.saturating_sub(1) };
    (idx <= limit).then_some(idx)
}

/// Header of a layout section: optional title and description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionHeader {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl SectionHeader {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: None,
        }
    }

    /// Merge another header into this one, keeping existing fields where the
    /// other header has none. Used by the change-section-header command's
    /// `merge` mode.
    pub fn merged_with(&self, other: &SectionHeader) -> Self {
        Self {
            title: other.title.clone().or_else(|| self.title.clone()),
            description: other
                .description
                .clone()
                .or_else(|| self.description.clone()),
        }
    }
}

/// What a widget renders. The engine treats all kinds uniformly; the kind
/// only matters to drill handling and to the host's renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidgetKind {
    /// A stored visualization.
    Insight(ObjRef),
    /// A single-measure KPI.
    Kpi(ObjRef),
    /// Host-defined custom widget; the string names the renderer.
    Custom(String),
}

/// A widget placed on the dashboard layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    /// Unique within the dashboard; generated when the widget is created.
    pub id: String,
    pub kind: WidgetKind,
    pub title: String,
    pub description: Option<String>,
    /// Drill definitions configured on this widget, keyed by origin.
    pub drills: Vec<DrillDefinition>,
}

impl Widget {
    pub fn new(kind: WidgetKind, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            description: None,
            drills: Vec::new(),
        }
    }
}

/// Grid sizing of one layout item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSize {
    pub grid_width: u32,
    pub grid_height: Option<u32>,
}

impl Default for ItemSize {
    fn default() -> Self {
        Self {
            grid_width: 12,
            grid_height: None,
        }
    }
}

/// One item within a layout section: a widget plus its sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionItem {
    pub widget: Widget,
    pub size: ItemSize,
}

impl SectionItem {
    pub fn new(widget: Widget) -> Self {
        Self {
            widget,
            size: ItemSize::default(),
        }
    }
}

/// A horizontal band of the dashboard layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutSection {
    pub header: SectionHeader,
    pub items: Vec<SectionItem>,
}

/// The dashboard layout: an ordered list of sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub sections: Vec<LayoutSection>,
}

/// Definition of an item to place on the layout: either a concrete item or
/// a reference to previously stashed items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemDefinition {
    Item(SectionItem),
    /// Resurrect items stashed under this identifier. The stash is consumed.
    Stashed(StashId),
}

/// Where a drill on a widget leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrillTarget {
    Insight(ObjRef),
    Dashboard(ObjRef),
    /// URL template with attribute placeholders resolved at drill time.
    Url(String),
}

/// A drill configured on a widget: drilling from `origin` (a measure or
/// attribute in the widget) leads to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillDefinition {
    pub origin: ObjRef,
    pub target: DrillTarget,
}

/// Granularity of a date filter window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateGranularity {
    Date,
    Week,
    Month,
    Quarter,
    Year,
}

/// Selection state of the dashboard's date filter.
///
/// Absolute selections use formatted dates on the given granularity;
/// relative selections use offsets from today (0 = current period,
/// negative = past). `AllTime` clears the filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFilterSelection {
    AllTime,
    Absolute {
        granularity: DateGranularity,
        from: String,
        to: String,
    },
    Relative {
        granularity: DateGranularity,
        from: i32,
        to: i32,
    },
}

impl Default for DateFilterSelection {
    fn default() -> Self {
        Self::AllTime
    }
}

/// One attribute filter in the dashboard's filter context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeFilter {
    /// Stable identifier within this dashboard; parent references use it.
    pub local_id: String,
    /// Display form of the filtered attribute.
    pub display_form: ObjRef,
    /// Selected element values.
    pub elements: Vec<String>,
    /// When true the selection is an exclusion list.
    pub negative: bool,
    /// Local ids of parent filters limiting this filter's elements.
    pub parents: Vec<String>,
}

impl AttributeFilter {
    pub fn new(display_form: ObjRef) -> Self {
        Self {
            local_id: Uuid::new_v4().to_string(),
            display_form,
            // An empty negative selection means "all elements".
            elements: Vec::new(),
            negative: true,
            parents: Vec::new(),
        }
    }
}

/// The full filter context: one date filter plus ordered attribute filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterContext {
    pub date_filter: DateFilterSelection,
    pub attribute_filters: Vec<AttributeFilter>,
}

/// One selection in a bulk filter-context change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterSelection {
    Date(DateFilterSelection),
    Attribute {
        local_id: String,
        elements: Vec<String>,
        negative: bool,
    },
}

/// Kind of a catalog item exposed to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogItemKind {
    Metric,
    Attribute,
    Fact,
    Insight,
}

/// An item of the workspace catalog usable on this dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub reference: ObjRef,
    pub title: String,
    pub kind: CatalogItemKind,
}

/// Workspace permissions relevant to dashboard commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub can_edit: bool,
    pub can_export: bool,
    pub can_save_as: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        // Conservative default until the backend's answer arrives.
        Self {
            can_edit: false,
            can_export: false,
            can_save_as: false,
        }
    }
}

impl Permissions {
    pub fn all() -> Self {
        Self {
            can_edit: true,
            can_export: true,
            can_save_as: true,
        }
    }
}

/// Outcome of an analytical execution cached per widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    Success(serde_json::Value),
    Error(String),
}
