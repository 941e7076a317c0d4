//! Per-session immutable context shared by every command handler.

use std::sync::Arc;

use crate::backend::BackendProvider;
use crate::types::ObjRef;

/// Tuning knobs of a dashboard session.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Maximum number of undo entries kept per state slice; the oldest
    /// entry is evicted when the bound is exceeded.
    pub undo_depth: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { undo_depth: 50 }
    }
}

/// Immutable per-session context: which workspace and dashboard the session
/// operates on, and the backend it talks to.
///
/// Mutable dashboard identity (the current reference after save/save-as)
/// lives in the meta state slice, not here.
pub struct DashboardContext {
    pub workspace: String,
    /// Dashboard to load on `Initialize`; `None` starts an empty unsaved
    /// dashboard.
    pub dashboard: Option<ObjRef>,
    pub backend: Arc<dyn BackendProvider>,
    pub config: DashboardConfig,
}

impl std::fmt::Debug for DashboardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardContext")
            .field("workspace", &self.workspace)
            .field("dashboard", &self.dashboard)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
