//! The backend collaborator seam.
//!
//! The engine never talks to a server directly. Everything that leaves the
//! process goes through [`BackendProvider`], an injected async trait object.
//! Handlers map [`BackendError`] values into `CommandFailed` events with
//! `FailureKind::Backend`; a backend failure is never allowed to surface as
//! an unclassified error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{CatalogItem, FilterContext, Layout, ObjRef, Permissions};

/// Error returned by backend calls, classified for failure reporting.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// The referenced object or workspace does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The caller lacks permission for the operation.
    #[error("operation forbidden: {message}")]
    Forbidden { message: String },

    /// The object changed underneath the caller.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// The backend is unreachable or overloaded.
    #[error("backend unavailable: {message}")]
    Unavailable { message: String },

    /// Anything the backend could not classify further.
    #[error("backend error: {message}")]
    Other { message: String },
}

impl BackendError {
    pub fn not_found(what: impl Into<String>) -> Self {
        BackendError::NotFound { what: what.into() }
    }
}

/// The persisted shape of a dashboard: what `Save` writes and `Initialize`
/// reads. Deliberately narrow; rendering concerns stay out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardDefinition {
    /// `None` for a dashboard that has never been saved.
    pub reference: Option<ObjRef>,
    pub title: String,
    pub layout: Layout,
    pub filter_context: FilterContext,
}

/// An analytical execution requested by drill handling or widget refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Widget whose definition drives the execution.
    pub widget: ObjRef,
    /// Drill origin or URL placeholders to resolve, when applicable.
    pub intersection: Vec<String>,
}

/// Result of one analytical execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub data: serde_json::Value,
}

/// Result of a PDF export: a URI the host can download from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResult {
    pub uri: String,
}

/// The analytical backend the dashboard model runs against.
///
/// Implementations must be cheap to share (`Arc<dyn BackendProvider>`); all
/// methods take `&self` and may be called concurrently.
#[async_trait]
pub trait BackendProvider: Send + Sync {
    /// Load the persisted definition of a dashboard.
    async fn load_dashboard(
        &self,
        workspace: &str,
        dashboard: &ObjRef,
    ) -> Result<DashboardDefinition, BackendError>;

    /// Persist a definition. Returns the reference of the stored dashboard;
    /// definitions without a reference are created, others overwritten.
    async fn save_dashboard(
        &self,
        workspace: &str,
        definition: &DashboardDefinition,
    ) -> Result<ObjRef, BackendError>;

    /// Delete a persisted dashboard.
    async fn delete_dashboard(&self, workspace: &str, dashboard: &ObjRef)
        -> Result<(), BackendError>;

    /// Load the catalog items usable on dashboards in this workspace.
    async fn load_catalog(&self, workspace: &str) -> Result<Vec<CatalogItem>, BackendError>;

    /// Load the caller's permissions in this workspace.
    async fn load_permissions(&self, workspace: &str) -> Result<Permissions, BackendError>;

    /// Run one analytical execution.
    async fn run_execution(
        &self,
        workspace: &str,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, BackendError>;

    /// Export a dashboard to PDF, returning the artifact's URI.
    async fn export_to_pdf(
        &self,
        workspace: &str,
        dashboard: &ObjRef,
    ) -> Result<ExportResult, BackendError>;
}


#[cfg(test)]
mod tests {
    use super::fixtures::StubBackend;
    use super::*;

    #[tokio::test]
    async fn stub_backend_saves_and_loads_round_trip() {
        let backend = StubBackend::new();
        let definition = DashboardDefinition {
            reference: None,
            title: "Revenue".into(),
            layout: Layout::default(),
            filter_context: FilterContext::default(),
        };

        let reference = backend
            .save_dashboard("ws", &definition)
            .await
            .expect("save should succeed");
        let loaded = backend
            .load_dashboard("ws", &reference)
            .await
            .expect("load should succeed");

        assert_eq!(loaded.title, "Revenue");
        assert_eq!(loaded.reference, Some(reference));
    }

    #[tokio::test]
    async fn stub_backend_injected_failure_is_returned() {
        let backend = StubBackend::new();
        backend.fail(
            "load_dashboard",
            BackendError::not_found("workspace"),
        );

        let err = backend
            .load_dashboard("ws", &ObjRef::new("dashboard/1"))
            .await
            .expect_err("injected failure should surface");
        assert!(matches!(err, BackendError::NotFound { .. }));
        assert_eq!(err.to_string(), "workspace not found");
    }

    #[tokio::test]
    async fn injected_failure_persists_across_calls() {
        let backend = StubBackend::new();
        backend.fail(
            "load_catalog",
            BackendError::Unavailable {
                message: "down".into(),
            },
        );

        for _ in 0..2 {
            let err = backend
                .load_catalog("ws")
                .await
                .expect_err("injected failure stays armed");
            assert!(matches!(err, BackendError::Unavailable { .. }));
        }
    }

    #[tokio::test]
    async fn delete_missing_dashboard_is_not_found() {
        let backend = StubBackend::new();
        let err = backend
            .delete_dashboard("ws", &ObjRef::new("dashboard/9"))
            .await
            .expect_err("missing dashboard");
        assert!(matches!(err, BackendError::NotFound { .. }));
    }
}
