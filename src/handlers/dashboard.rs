//! Dashboard lifecycle handlers: initialize, save, save-as, rename,
//! delete, reset, export.

use crate::backend::DashboardDefinition;
use crate::error::HandlerError;
use crate::event::DashboardEvent;
use crate::store::{
    CatalogAction, ExecutionsAction, FilterContextAction, FilterContextState, LayoutAction,
    MetaAction, PermissionsAction, StateAction, StatusAction, UiAction, UiState,
};

use super::HandlerOps;

const UNTITLED: &str = "Untitled dashboard";

/// Load (or create) the dashboard and populate every slice. Re-running
/// initialize discards all local state including undo history.
pub(crate) async fn initialize(ops: &HandlerOps) -> Result<DashboardEvent, HandlerError> {
    ops.mutate(StateAction::Status(StatusAction::SetLoading(true)));
    let result = load_all(ops).await;
    ops.mutate(StateAction::Status(StatusAction::SetLoading(false)));
    let definition = result?;

    let dashboard = definition.reference.clone();
    let title = definition.title.clone();
    ops.mutate(StateAction::Meta(MetaAction::SetIdentity {
        dashboard: dashboard.clone(),
        title: title.clone(),
    }));
    ops.mutate(StateAction::Meta(MetaAction::SetPersisted(Some(
        definition.clone(),
    ))));
    ops.mutate(StateAction::Layout(LayoutAction::SetLayout(
        definition.layout,
    )));
    ops.mutate(StateAction::FilterContext(FilterContextAction::Set(
        definition.filter_context,
    )));
    ops.mutate(StateAction::Executions(ExecutionsAction::Clear));
    ops.mutate(StateAction::Ui(UiAction::Restore(UiState::default())));
    ops.mutate(StateAction::Status(StatusAction::SetInitialized(true)));
    ops.journal().clear();

    Ok(DashboardEvent::DashboardInitialized { dashboard, title })
}

async fn load_all(ops: &HandlerOps) -> Result<DashboardDefinition, HandlerError> {
    let workspace = ops.workspace().to_owned();
    let initial = ops.read(|tree| tree.meta.dashboard.clone());
    let to_load = initial.or_else(|| ops.initial_dashboard());

    let definition = match to_load {
        Some(reference) => {
            ops.checkpoint()?;
            ops.backend().load_dashboard(&workspace, &reference).await?
        }
        None => DashboardDefinition {
            reference: None,
            title: UNTITLED.to_owned(),
            layout: Default::default(),
            filter_context: Default::default(),
        },
    };

    ops.checkpoint()?;
    let permissions = ops.backend().load_permissions(&workspace).await?;
    ops.checkpoint()?;
    let catalog = ops.backend().load_catalog(&workspace).await?;
    ops.checkpoint()?;

    ops.mutate(StateAction::Permissions(PermissionsAction::Set(permissions)));
    ops.mutate(StateAction::Catalog(CatalogAction::SetItems(catalog)));
    Ok(definition)
}

/// Persist the current layout and filter context under the current title.
pub(crate) async fn save(ops: &HandlerOps) -> Result<DashboardEvent, HandlerError> {
    let (definition, can_edit) = ops.read(|tree| {
        (
            DashboardDefinition {
                reference: tree.meta.dashboard.clone(),
                title: tree.meta.title.clone(),
                layout: tree.layout.layout.clone(),
                filter_context: tree.filter_context.as_context(),
            },
            tree.permissions.permissions.can_edit,
        )
    });
    if !can_edit {
        return Err(HandlerError::validation(
            "saving requires edit permission in this workspace",
        ));
    }
    let new_dashboard = definition.reference.is_none();

    ops.mutate(StateAction::Status(StatusAction::SetSaving(true)));
    let result: Result<crate::types::ObjRef, HandlerError> = async {
        ops.checkpoint()?;
        let workspace = ops.workspace().to_owned();
        Ok(ops.backend().save_dashboard(&workspace, &definition).await?)
    }
    .await;
    ops.mutate(StateAction::Status(StatusAction::SetSaving(false)));
    let reference = result?;

    let mut persisted = definition;
    persisted.reference = Some(reference.clone());
    ops.mutate(StateAction::Meta(MetaAction::SetReference(reference.clone())));
    ops.mutate(StateAction::Meta(MetaAction::SetPersisted(Some(persisted))));

    Ok(DashboardEvent::DashboardSaved {
        reference,
        new_dashboard,
    })
}

/// Persist a copy under a new title. The session keeps pointing at the
/// original dashboard.
pub(crate) async fn save_as(
    ops: &HandlerOps,
    title: String,
) -> Result<DashboardEvent, HandlerError> {
    let (definition, can_save_as) = ops.read(|tree| {
        (
            DashboardDefinition {
                reference: None,
                title: title.clone(),
                layout: tree.layout.layout.clone(),
                filter_context: tree.filter_context.as_context(),
            },
            tree.permissions.permissions.can_save_as,
        )
    });
    if !can_save_as {
        return Err(HandlerError::validation(
            "saving a copy requires create permission in this workspace",
        ));
    }

    ops.checkpoint()?;
    let workspace = ops.workspace().to_owned();
    let reference = ops.backend().save_dashboard(&workspace, &definition).await?;

    Ok(DashboardEvent::DashboardCopySaved { reference, title })
}

/// Change the dashboard title. Undoable.
pub(crate) fn rename(ops: &HandlerOps, new_title: String) -> Result<DashboardEvent, HandlerError> {
    ops.mutate_undoable(StateAction::Meta(MetaAction::SetTitle(new_title.clone())));
    Ok(DashboardEvent::DashboardRenamed { new_title })
}

/// Delete the persisted dashboard and clear all local state.
pub(crate) async fn delete(ops: &HandlerOps) -> Result<DashboardEvent, HandlerError> {
    let reference = ops
        .read(|tree| tree.meta.dashboard.clone())
        .ok_or_else(|| HandlerError::validation("dashboard has never been saved"))?;

    ops.checkpoint()?;
    let workspace = ops.workspace().to_owned();
    ops.backend().delete_dashboard(&workspace, &reference).await?;

    ops.journal().clear();
    ops.mutate(StateAction::ResetAll);
    ops.publish(DashboardEvent::StateCleared);

    Ok(DashboardEvent::DashboardDeleted)
}

/// Discard unsaved changes by re-applying the last persisted definition.
pub(crate) fn reset(ops: &HandlerOps) -> Result<DashboardEvent, HandlerError> {
    let persisted = ops
        .read(|tree| tree.meta.persisted.clone())
        .ok_or_else(|| HandlerError::validation("no persisted state to reset to"))?;

    ops.mutate(StateAction::Meta(MetaAction::SetIdentity {
        dashboard: persisted.reference.clone(),
        title: persisted.title.clone(),
    }));
    ops.mutate(StateAction::Layout(LayoutAction::SetLayout(
        persisted.layout.clone(),
    )));
    ops.mutate(StateAction::FilterContext(FilterContextAction::Restore(
        FilterContextState::from_context(persisted.filter_context.clone()),
    )));
    ops.journal().clear();

    Ok(DashboardEvent::DashboardWasReset)
}

/// Export to PDF via the backend. Exclusive: a newer export supersedes
/// this one at its next checkpoint.
pub(crate) async fn export_to_pdf(ops: &HandlerOps) -> Result<DashboardEvent, HandlerError> {
    let (reference, can_export) = ops.read(|tree| {
        (
            tree.meta.dashboard.clone(),
            tree.permissions.permissions.can_export,
        )
    });
    if !can_export {
        return Err(HandlerError::validation(
            "exporting requires export permission in this workspace",
        ));
    }
    let reference =
        reference.ok_or_else(|| HandlerError::validation("save the dashboard before exporting"))?;

    ops.mutate(StateAction::Status(StatusAction::SetExporting(true)));
    let result: Result<crate::backend::ExportResult, HandlerError> = async {
        ops.checkpoint()?;
        let workspace = ops.workspace().to_owned();
        let export = ops.backend().export_to_pdf(&workspace, &reference).await?;
        ops.checkpoint()?;
        Ok(export)
    }
    .await;
    ops.mutate(StateAction::Status(StatusAction::SetExporting(false)));
    let export = result?;

    Ok(DashboardEvent::DashboardExportedToPdf { uri: export.uri })
}
