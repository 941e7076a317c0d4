//! Drill handlers.
//!
//! `Drill` is the entry point: it runs the execution establishing the drill
//! context and then dispatches the target-specific drill-to command as a
//! nested command; a nested failure fails the outer drill with the nested
//! classification.

use crate::backend::ExecutionRequest;
use crate::command::DashboardCommand;
use crate::error::HandlerError;
use crate::event::DashboardEvent;
use crate::store::layout::find_widget;
use crate::store::{StateAction, UiAction};
use crate::types::{DrillDefinition, DrillTarget, FilterSelection, ObjRef};

use super::HandlerOps;

fn ensure_widget_exists(ops: &HandlerOps, widget_id: &str) -> Result<(), HandlerError> {
    let exists = ops.read(|tree| find_widget(&tree.layout, widget_id).is_some());
    if exists {
        Ok(())
    } else {
        Err(HandlerError::validation(format!(
            "widget {widget_id} is not on the dashboard"
        )))
    }
}

pub(crate) async fn drill(
    ops: &HandlerOps,
    widget_id: String,
    definition: DrillDefinition,
) -> Result<DashboardEvent, HandlerError> {
    ensure_widget_exists(ops, &widget_id)?;

    ops.checkpoint()?;
    let request = ExecutionRequest {
        widget: ObjRef::new(widget_id.clone()),
        intersection: vec![definition.origin.to_string()],
    };
    let workspace = ops.workspace().to_owned();
    let result = ops.backend().run_execution(&workspace, &request).await?;
    ops.checkpoint()?;

    let follow_up = match &definition.target {
        DrillTarget::Insight(insight) => DashboardCommand::DrillToInsight {
            widget_id: widget_id.clone(),
            insight: insight.clone(),
        },
        DrillTarget::Dashboard(dashboard) => DashboardCommand::DrillToDashboard {
            dashboard: Some(dashboard.clone()),
            selections: Vec::new(),
        },
        DrillTarget::Url(template) => DashboardCommand::DrillToUrl {
            widget_id: widget_id.clone(),
            url_template: template.clone(),
        },
    };
    ops.nested(follow_up).await?;

    Ok(DashboardEvent::DrillPerformed {
        widget_id,
        definition,
        result,
    })
}

pub(crate) async fn drill_down(
    ops: &HandlerOps,
    widget_id: String,
    insight: ObjRef,
) -> Result<DashboardEvent, HandlerError> {
    ensure_widget_exists(ops, &widget_id)?;

    ops.checkpoint()?;
    let request = ExecutionRequest {
        widget: ObjRef::new(widget_id.clone()),
        intersection: vec![insight.to_string()],
    };
    let workspace = ops.workspace().to_owned();
    let result = ops.backend().run_execution(&workspace, &request).await?;

    Ok(DashboardEvent::DrillDownResolved {
        widget_id,
        insight,
        result,
    })
}

pub(crate) fn drill_to_insight(
    ops: &HandlerOps,
    widget_id: String,
    insight: ObjRef,
) -> Result<DashboardEvent, HandlerError> {
    ensure_widget_exists(ops, &widget_id)?;
    Ok(DashboardEvent::DrillToInsightResolved { widget_id, insight })
}

pub(crate) fn drill_to_dashboard(
    _ops: &HandlerOps,
    dashboard: Option<ObjRef>,
    _selections: Vec<FilterSelection>,
) -> Result<DashboardEvent, HandlerError> {
    // Target filters travel in the resolved event's context for the host to
    // apply in the destination session; this session's state is untouched.
    Ok(DashboardEvent::DrillToDashboardResolved { dashboard })
}

pub(crate) async fn drill_to_url(
    ops: &HandlerOps,
    widget_id: String,
    url_template: String,
) -> Result<DashboardEvent, HandlerError> {
    ensure_widget_exists(ops, &widget_id)?;

    ops.checkpoint()?;
    let placeholders = extract_placeholders(&url_template);
    let url = if placeholders.is_empty() {
        url_template
    } else {
        let request = ExecutionRequest {
            widget: ObjRef::new(widget_id.clone()),
            intersection: placeholders,
        };
        let workspace = ops.workspace().to_owned();
        let result = ops.backend().run_execution(&workspace, &request).await?;
        fill_placeholders(&url_template, &result.data)
    };

    Ok(DashboardEvent::DrillToUrlResolved { widget_id, url })
}

pub(crate) fn change_drillable_items(
    ops: &HandlerOps,
    items: Vec<ObjRef>,
) -> Result<DashboardEvent, HandlerError> {
    ops.mutate(StateAction::Ui(UiAction::SetDrillableItems(items.clone())));
    Ok(DashboardEvent::DrillableItemsChanged { items })
}

/// Names inside `{...}` markers in a URL template.
fn extract_placeholders(template: &str) -> Vec<String> {
    let mut placeholders = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(end) = rest[start..].find('}') else { break };
        placeholders.push(rest[start + 1..start + end].to_owned());
        rest = &rest[start + end + 1..];
    }
    placeholders
}

/// Substitute `{name}` markers with string values from the execution data.
/// Unresolvable markers are left in place.
fn fill_placeholders(template: &str, data: &serde_json::Value) -> String {
    let mut url = template.to_owned();
    if let Some(values) = data.as_object() {
        for (name, value) in values {
            if let Some(value) = value.as_str() {
                url = url.replace(&format!("{{{name}}}"), value);
            }
        }
    }
    url
}
