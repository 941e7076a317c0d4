//! The public session surface: build, dispatch, subscribe, read, tear down.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::backend::BackendProvider;
use crate::bus::ListenerId;
use crate::command::{CorrelationId, DashboardCommand};
use crate::context::{DashboardConfig, DashboardContext};
use crate::dispatcher::{CommandResult, Dispatcher};
use crate::error::DispatchError;
use crate::event::{DashboardEvent, EventEnvelope};
use crate::store::StateTree;
use crate::types::ObjRef;

/// A dispatched command's future. Resolves to the command's terminal
/// outcome exactly once; dropping it makes the dispatch fire-and-forget
/// (events still flow to subscribers).
pub struct PendingCommand {
    correlation_id: CorrelationId,
    receiver: oneshot::Receiver<CommandResult>,
}

impl PendingCommand {
    /// Correlation id assigned to this dispatch; all events emitted for the
    /// command carry it.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }
}

impl Future for PendingCommand {
    type Output = CommandResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Sender dropped without settling only happens at teardown races.
            Poll::Ready(Err(_)) => Poll::Ready(Err(DispatchError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Error from [`DashboardSessionBuilder::build`].
#[derive(Debug, thiserror::Error)]
pub enum SessionBuildError {
    #[error("a backend provider is required")]
    MissingBackend,
    #[error("a workspace is required")]
    MissingWorkspace,
}

/// Builder for [`DashboardSession`].
pub struct DashboardSessionBuilder {
    backend: Option<Arc<dyn BackendProvider>>,
    workspace: Option<String>,
    dashboard: Option<ObjRef>,
    config: DashboardConfig,
}

impl DashboardSessionBuilder {
    /// The backend the session talks to. Required.
    pub fn backend(mut self, backend: Arc<dyn BackendProvider>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Workspace the dashboard lives in. Required.
    pub fn workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// Dashboard to load on `Initialize`. Omit to start an empty unsaved
    /// dashboard.
    pub fn dashboard(mut self, dashboard: ObjRef) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    /// Override the per-slice undo bound (default 50).
    pub fn undo_depth(mut self, depth: usize) -> Self {
        self.config.undo_depth = depth;
        self
    }

    /// Assemble the session. The state tree starts empty; dispatch
    /// `DashboardCommand::Initialize` to populate it.
    ///
    /// # Errors
    ///
    /// Returns an error when a required field is missing.
    pub fn build(self) -> Result<DashboardSession, SessionBuildError> {
        let backend = self.backend.ok_or(SessionBuildError::MissingBackend)?;
        let workspace = self.workspace.ok_or(SessionBuildError::MissingWorkspace)?;
        let ctx = DashboardContext {
            workspace,
            dashboard: self.dashboard,
            backend,
            config: self.config,
        };
        tracing::info!(workspace = %ctx.workspace, "dashboard session created");
        Ok(DashboardSession {
            dispatcher: Dispatcher::new(ctx),
        })
    }
}

/// One dashboard's command/event engine.
///
/// Dispatch commands, subscribe to the resulting events, read the state
/// tree through selectors, and tear the session down when the host is
/// done; teardown (also run on drop) rejects every still-pending dispatch
/// future with `Cancelled`, so promises never leak.
pub struct DashboardSession {
    dispatcher: Arc<Dispatcher>,
}

impl DashboardSession {
    pub fn builder() -> DashboardSessionBuilder {
        DashboardSessionBuilder {
            backend: None,
            workspace: None,
            dashboard: None,
            config: DashboardConfig::default(),
        }
    }

    /// Dispatch a command with a generated correlation id.
    pub fn dispatch(&self, command: DashboardCommand) -> PendingCommand {
        let (correlation_id, receiver) = self.dispatcher.submit(command, None);
        PendingCommand {
            correlation_id,
            receiver,
        }
    }

    /// Dispatch a command under a caller-chosen correlation id.
    pub fn dispatch_with_correlation(
        &self,
        command: DashboardCommand,
        correlation_id: CorrelationId,
    ) -> PendingCommand {
        let (correlation_id, receiver) = self.dispatcher.submit(command, Some(correlation_id));
        PendingCommand {
            correlation_id,
            receiver,
        }
    }

    /// Subscribe to every published event.
    pub fn on_event<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        self.dispatcher.bus().subscribe(listener)
    }

    /// Subscribe to events matching a predicate.
    pub fn on_event_when<P, F>(&self, predicate: P, listener: F) -> ListenerId
    where
        P: Fn(&DashboardEvent) -> bool + Send + Sync + 'static,
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        self.dispatcher.bus().subscribe_when(predicate, listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.dispatcher.bus().unsubscribe(id)
    }

    /// Read the state tree under the shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&StateTree) -> R) -> R {
        self.dispatcher.store().read(f)
    }

    /// Current state tree version.
    pub fn state_version(&self) -> u64 {
        self.dispatcher.store().version()
    }

    pub fn can_undo(&self) -> bool {
        self.dispatcher.journal().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.dispatcher.journal().can_redo()
    }

    /// Tear the session down: reject all pending dispatch futures with
    /// `Cancelled`, signal running handlers to stop at their next
    /// checkpoint, and refuse further commands. Idempotent.
    pub fn teardown(&self) {
        self.dispatcher.teardown();
    }
}

// The dispatcher holds the backend trait object, so Debug is manual.
impl std::fmt::Debug for DashboardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardSession")
            .field("workspace", &self.dispatcher.workspace())
            .field("state_version", &self.dispatcher.store().version())
            .finish_non_exhaustive()
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        self.dispatcher.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::backend::fixtures::StubBackend;
    use crate::backend::{
        BackendError, DashboardDefinition, ExecutionRequest, ExecutionResult, ExportResult,
    };
    use crate::error::FailureKind;
    use crate::types::{
        CatalogItem, DrillDefinition, DrillTarget, FilterContext, ItemDefinition, Layout,
        LayoutSection, Permissions, SectionHeader, SectionItem, Widget, WidgetKind,
    };
    use async_trait::async_trait;

    fn definition_with_widget(title: &str) -> (DashboardDefinition, String) {
        let widget = Widget::new(WidgetKind::Insight(ObjRef::new("insight/7")), "Revenue");
        let widget_id = widget.id.clone();
        let definition = DashboardDefinition {
            reference: Some(ObjRef::new("dashboard/1")),
            title: title.to_owned(),
            layout: Layout {
                sections: vec![LayoutSection {
                    header: SectionHeader::titled("KPIs"),
                    items: vec![SectionItem::new(widget)],
                }],
            },
            filter_context: FilterContext::default(),
        };
        (definition, widget_id)
    }

    fn session_for(backend: Arc<StubBackend>) -> DashboardSession {
        DashboardSession::builder()
            .backend(backend)
            .workspace("ws")
            .dashboard(ObjRef::new("dashboard/1"))
            .build()
            .expect("builder has all required fields")
    }

    async fn initialized_session(backend: Arc<StubBackend>) -> DashboardSession {
        let session = session_for(backend);
        session
            .dispatch(DashboardCommand::Initialize)
            .await
            .expect("initialize succeeds");
        session
    }

    fn collect_event_names(session: &DashboardSession) -> Arc<Mutex<Vec<&'static str>>> {
        let names = Arc::new(Mutex::new(Vec::new()));
        let names_clone = Arc::clone(&names);
        session.on_event(move |env| names_clone.lock().unwrap().push(env.event.name()));
        names
    }

    #[tokio::test]
    async fn builder_requires_backend_and_workspace() {
        let err = DashboardSession::builder()
            .workspace("ws")
            .build()
            .expect_err("missing backend");
        assert!(matches!(err, SessionBuildError::MissingBackend));

        let err = DashboardSession::builder()
            .backend(Arc::new(StubBackend::new()))
            .build()
            .expect_err("missing workspace");
        assert!(matches!(err, SessionBuildError::MissingWorkspace));
    }

    #[tokio::test]
    async fn initialize_populates_all_slices() {
        let (definition, _) = definition_with_widget("Original");
        let mut backend = StubBackend::new();
        backend.catalog = vec![CatalogItem {
            reference: ObjRef::new("metric.revenue"),
            title: "Revenue".into(),
            kind: crate::types::CatalogItemKind::Metric,
        }];
        let backend = Arc::new(backend.with_dashboard("dashboard/1", definition));

        let session = initialized_session(backend).await;

        session.read(|tree| {
            assert_eq!(tree.meta.title, "Original");
            assert_eq!(tree.meta.dashboard, Some(ObjRef::new("dashboard/1")));
            assert_eq!(tree.layout.layout.sections.len(), 1);
            assert_eq!(tree.catalog.items.len(), 1);
            assert_eq!(tree.permissions.permissions, Permissions::all());
            assert!(tree.status.initialized);
            assert!(!tree.status.loading);
        });
    }

    #[tokio::test]
    async fn rename_mutates_meta_emits_event_and_resolves_promise() {
        let (definition, _) = definition_with_widget("Original");
        let backend = Arc::new(StubBackend::new().with_dashboard("dashboard/1", definition));
        let session = initialized_session(backend).await;
        let names = collect_event_names(&session);

        let correlation = CorrelationId::new("rename-1");
        let event = session
            .dispatch_with_correlation(
                DashboardCommand::rename("Q3 Report"),
                correlation.clone(),
            )
            .await
            .expect("rename succeeds");

        assert_eq!(
            event,
            DashboardEvent::DashboardRenamed {
                new_title: "Q3 Report".into()
            }
        );
        session.read(|tree| assert_eq!(tree.meta.title, "Q3 Report"));
        assert!(names.lock().unwrap().contains(&"dashboard_renamed"));
    }

    #[tokio::test]
    async fn event_envelopes_carry_the_supplied_correlation_id() {
        let (definition, _) = definition_with_widget("Original");
        let backend = Arc::new(StubBackend::new().with_dashboard("dashboard/1", definition));
        let session = initialized_session(backend).await;

        let observed = Arc::new(Mutex::new(Vec::new()));
        let observed_clone = Arc::clone(&observed);
        session.on_event_when(
            |event| matches!(event, DashboardEvent::DashboardRenamed { .. }),
            move |env| observed_clone.lock().unwrap().push(env.correlation_id.clone()),
        );

        let correlation = CorrelationId::new("rename-42");
        session
            .dispatch_with_correlation(DashboardCommand::rename("New"), correlation.clone())
            .await
            .expect("rename succeeds");

        assert_eq!(*observed.lock().unwrap(), vec![Some(correlation)]);
    }

    #[tokio::test]
    async fn rejected_command_never_starts_or_mutates() {
        let backend = Arc::new(StubBackend::new());
        let session = session_for(backend);
        let names = collect_event_names(&session);
        let version_before = session.state_version();

        let err = session
            .dispatch(DashboardCommand::rename("   "))
            .await
            .expect_err("blank title rejected");

        assert!(matches!(err, DispatchError::Rejected { .. }));
        assert_eq!(session.state_version(), version_before);
        let names = names.lock().unwrap();
        assert!(names.contains(&"command_rejected"));
        assert!(!names.contains(&"command_started"));
    }

    #[tokio::test]
    async fn unsupported_command_is_rejected() {
        let backend = Arc::new(StubBackend::new());
        let session = session_for(backend);

        let err = session
            .dispatch(DashboardCommand::RefreshWidget {
                widget_id: "w1".into(),
            })
            .await
            .expect_err("unsupported command");
        assert!(matches!(err, DispatchError::Rejected { .. }));
        assert!(err.to_string().contains("not supported"));
    }

    #[tokio::test]
    async fn backend_failure_is_classified_not_internal() {
        let (definition, widget_id) = definition_with_widget("Original");
        let backend = Arc::new(StubBackend::new().with_dashboard("dashboard/1", definition));
        let session = initialized_session(Arc::clone(&backend)).await;
        backend.fail(
            "run_execution",
            BackendError::NotFound {
                what: "workspace".into(),
            },
        );
        let names = collect_event_names(&session);

        let err = session
            .dispatch(DashboardCommand::Drill {
                widget_id,
                definition: DrillDefinition {
                    origin: ObjRef::new("measure.revenue"),
                    target: DrillTarget::Insight(ObjRef::new("insight/7")),
                },
            })
            .await
            .expect_err("drill fails");

        match err {
            DispatchError::Failed { kind, message } => {
                assert_eq!(kind, FailureKind::Backend);
                assert!(message.contains("workspace not found"));
            }
            other => panic!("expected classified failure, got {other:?}"),
        }
        assert!(names.lock().unwrap().contains(&"command_failed"));
    }

    #[tokio::test]
    async fn drill_dispatches_nested_drill_to_command() {
        let (definition, widget_id) = definition_with_widget("Original");
        let backend = Arc::new(StubBackend::new().with_dashboard("dashboard/1", definition));
        let session = initialized_session(backend).await;
        let names = collect_event_names(&session);

        let event = session
            .dispatch(DashboardCommand::Drill {
                widget_id: widget_id.clone(),
                definition: DrillDefinition {
                    origin: ObjRef::new("measure.revenue"),
                    target: DrillTarget::Insight(ObjRef::new("insight/7")),
                },
            })
            .await
            .expect("drill succeeds");

        assert!(matches!(event, DashboardEvent::DrillPerformed { .. }));
        let names = names.lock().unwrap();
        assert!(names.contains(&"drill_to_insight_resolved"));
        assert!(names.contains(&"drill_performed"));
    }

    #[tokio::test]
    async fn events_from_one_command_arrive_in_emission_order() {
        let (definition, _) = definition_with_widget("Original");
        let backend = Arc::new(StubBackend::new().with_dashboard("dashboard/1", definition));
        let session = initialized_session(backend).await;

        let observed = Arc::new(Mutex::new(Vec::new()));
        let observed_clone = Arc::clone(&observed);
        session.on_event(move |env| {
            observed_clone
                .lock()
                .unwrap()
                .push((env.sequence, env.event.name()));
        });

        session
            .dispatch(DashboardCommand::Delete)
            .await
            .expect("delete succeeds");

        let observed = observed.lock().unwrap();
        let names: Vec<&str> = observed.iter().map(|(_, name)| *name).collect();
        assert_eq!(
            names,
            vec!["command_started", "state_cleared", "dashboard_deleted"]
        );
        let sequences: Vec<u64> = observed.iter().map(|(seq, _)| *seq).collect();
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn undo_redo_round_trip_restores_identical_state() {
        let (definition, _) = definition_with_widget("Original");
        let backend = Arc::new(StubBackend::new().with_dashboard("dashboard/1", definition));
        let session = initialized_session(backend).await;

        session
            .dispatch(DashboardCommand::add_layout_section(
                -1,
                SectionHeader::titled("Details"),
                vec![],
            ))
            .await
            .expect("add section");
        let after_forward = session.read(|tree| tree.clone());

        session
            .dispatch(DashboardCommand::Undo)
            .await
            .expect("undo");
        session.read(|tree| assert_eq!(tree.layout.layout.sections.len(), 1));

        session
            .dispatch(DashboardCommand::Redo)
            .await
            .expect("redo");
        session.read(|tree| assert_eq!(*tree, after_forward));
    }

    #[tokio::test]
    async fn undo_past_the_bound_hits_the_evicted_entry() {
        let backend = Arc::new(StubBackend::new());
        let session = DashboardSession::builder()
            .backend(backend)
            .workspace("ws")
            .undo_depth(50)
            .build()
            .expect("build");

        for i in 1..=51 {
            session
                .dispatch(DashboardCommand::rename(format!("t{i}")))
                .await
                .expect("rename");
        }
        for _ in 0..50 {
            session
                .dispatch(DashboardCommand::Undo)
                .await
                .expect("undo within bound");
        }

        // The oldest entry (t1's inverse) was evicted; state stays at t1.
        session.read(|tree| assert_eq!(tree.meta.title, "t1"));
        let err = session
            .dispatch(DashboardCommand::Undo)
            .await
            .expect_err("nothing left to undo");
        assert!(matches!(
            err,
            DispatchError::Failed {
                kind: FailureKind::Validation,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn undo_of_rename_keeps_later_save_bookkeeping() {
        let backend = Arc::new(StubBackend::new());
        let session = DashboardSession::builder()
            .backend(Arc::clone(&backend) as Arc<dyn BackendProvider>)
            .workspace("ws")
            .build()
            .expect("build");
        session
            .dispatch(DashboardCommand::Initialize)
            .await
            .expect("initialize empty dashboard");

        session
            .dispatch(DashboardCommand::rename("Q3 Report"))
            .await
            .expect("rename");
        let saved = session
            .dispatch(DashboardCommand::Save)
            .await
            .expect("save succeeds");
        let DashboardEvent::DashboardSaved { reference, .. } = saved else {
            panic!("expected DashboardSaved");
        };

        session.dispatch(DashboardCommand::Undo).await.expect("undo");

        // Undo reverts the title only; the save's reference and persisted
        // definition survive.
        session.read(|tree| {
            assert_eq!(tree.meta.title, "Untitled dashboard");
            assert_eq!(tree.meta.dashboard, Some(reference));
            assert!(tree.meta.persisted.is_some());
        });

        // A repeat save overwrites the same dashboard instead of creating
        // a second one.
        session
            .dispatch(DashboardCommand::Save)
            .await
            .expect("second save");
        assert_eq!(backend.dashboards.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn new_undoable_command_clears_redo() {
        let backend = Arc::new(StubBackend::new());
        let session = session_for(backend);

        session
            .dispatch(DashboardCommand::rename("one"))
            .await
            .expect("rename");
        session
            .dispatch(DashboardCommand::Undo)
            .await
            .expect("undo");
        assert!(session.can_redo());

        session
            .dispatch(DashboardCommand::rename("two"))
            .await
            .expect("rename");
        assert!(!session.can_redo());
    }

    #[tokio::test]
    async fn initialize_resets_undo_history() {
        let (definition, _) = definition_with_widget("Original");
        let backend = Arc::new(StubBackend::new().with_dashboard("dashboard/1", definition));
        let session = session_for(backend);

        session
            .dispatch(DashboardCommand::rename("scratch"))
            .await
            .expect("rename");
        assert!(session.can_undo());

        session
            .dispatch(DashboardCommand::Initialize)
            .await
            .expect("initialize");
        assert!(!session.can_undo());
    }

    #[tokio::test]
    async fn stash_round_trip_restores_items_and_consumes_stash() {
        let (definition, widget_id) = definition_with_widget("Original");
        let backend = Arc::new(StubBackend::new().with_dashboard("dashboard/1", definition));
        let session = initialized_session(backend).await;

        session
            .dispatch(DashboardCommand::RemoveLayoutSection {
                index: 0,
                stash: Some("stash-1".into()),
            })
            .await
            .expect("remove with stash");
        session.read(|tree| assert!(tree.layout.layout.sections.is_empty()));

        session
            .dispatch(DashboardCommand::add_layout_section(
                -1,
                SectionHeader::titled("Restored"),
                vec![ItemDefinition::Stashed("stash-1".into())],
            ))
            .await
            .expect("resurrect from stash");

        session.read(|tree| {
            assert_eq!(tree.layout.layout.sections.len(), 1);
            assert_eq!(
                tree.layout.layout.sections[0].items[0].widget.id,
                widget_id
            );
            assert!(tree.layout.stash.is_empty(), "stash consumed on use");
        });

        // A second use of the consumed stash is a validation failure.
        let err = session
            .dispatch(DashboardCommand::add_layout_section(
                -1,
                SectionHeader::default(),
                vec![ItemDefinition::Stashed("stash-1".into())],
            ))
            .await
            .expect_err("stash already consumed");
        assert!(matches!(
            err,
            DispatchError::Failed {
                kind: FailureKind::Validation,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn save_persists_current_layout_and_title() {
        let backend = Arc::new(StubBackend::new());
        let session = DashboardSession::builder()
            .backend(Arc::clone(&backend) as Arc<dyn BackendProvider>)
            .workspace("ws")
            .build()
            .expect("build");
        session
            .dispatch(DashboardCommand::Initialize)
            .await
            .expect("initialize empty dashboard");

        session
            .dispatch(DashboardCommand::rename("Fresh"))
            .await
            .expect("rename");
        session
            .dispatch(DashboardCommand::add_layout_section(
                -1,
                SectionHeader::titled("S"),
                vec![],
            ))
            .await
            .expect("add section");

        let event = session
            .dispatch(DashboardCommand::Save)
            .await
            .expect("save succeeds");
        let DashboardEvent::DashboardSaved {
            reference,
            new_dashboard,
        } = event
        else {
            panic!("expected DashboardSaved");
        };
        assert!(new_dashboard);

        let stored = backend
            .dashboards
            .lock()
            .unwrap()
            .get(reference.as_str())
            .cloned()
            .expect("definition persisted");
        assert_eq!(stored.title, "Fresh");
        assert_eq!(stored.layout.sections.len(), 1);
        session.read(|tree| assert_eq!(tree.meta.dashboard, Some(reference)));
    }

    #[tokio::test]
    async fn async_render_protocol_reports_full_render_once() {
        let backend = Arc::new(StubBackend::new());
        let session = session_for(backend);
        let names = collect_event_names(&session);

        for id in ["r1", "r2"] {
            session
                .dispatch(DashboardCommand::RequestAsyncRender {
                    render_id: id.into(),
                })
                .await
                .expect("request");
        }
        session
            .dispatch(DashboardCommand::ResolveAsyncRender {
                render_id: "r1".into(),
            })
            .await
            .expect("resolve first");
        assert!(!names.lock().unwrap().contains(&"render_resolved"));

        session
            .dispatch(DashboardCommand::ResolveAsyncRender {
                render_id: "r2".into(),
            })
            .await
            .expect("resolve last");

        let names = names.lock().unwrap();
        assert_eq!(
            names.iter().filter(|n| **n == "render_resolved").count(),
            1
        );
    }

    #[tokio::test]
    async fn resolving_unrequested_render_fails_validation() {
        let backend = Arc::new(StubBackend::new());
        let session = session_for(backend);

        let err = session
            .dispatch(DashboardCommand::ResolveAsyncRender {
                render_id: "ghost".into(),
            })
            .await
            .expect_err("nothing pending");
        assert!(matches!(
            err,
            DispatchError::Failed {
                kind: FailureKind::Validation,
                ..
            }
        ));
    }

    /// Backend whose saves never complete; used to park commands in flight.
    struct HangingBackend;

    #[async_trait]
    impl BackendProvider for HangingBackend {
        async fn load_dashboard(
            &self,
            _workspace: &str,
            _dashboard: &ObjRef,
        ) -> Result<DashboardDefinition, BackendError> {
            Ok(DashboardDefinition {
                reference: Some(ObjRef::new("dashboard/1")),
                title: "Parked".into(),
                layout: Layout::default(),
                filter_context: FilterContext::default(),
            })
        }

        async fn save_dashboard(
            &self,
            _workspace: &str,
            _definition: &DashboardDefinition,
        ) -> Result<ObjRef, BackendError> {
            std::future::pending().await
        }

        async fn delete_dashboard(
            &self,
            _workspace: &str,
            _dashboard: &ObjRef,
        ) -> Result<(), BackendError> {
            Ok(())
        }

        async fn load_catalog(&self, _workspace: &str) -> Result<Vec<CatalogItem>, BackendError> {
            Ok(Vec::new())
        }

        async fn load_permissions(&self, _workspace: &str) -> Result<Permissions, BackendError> {
            Ok(Permissions::all())
        }

        async fn run_execution(
            &self,
            _workspace: &str,
            _request: &ExecutionRequest,
        ) -> Result<ExecutionResult, BackendError> {
            Ok(ExecutionResult {
                data: serde_json::Value::Null,
            })
        }

        async fn export_to_pdf(
            &self,
            _workspace: &str,
            _dashboard: &ObjRef,
        ) -> Result<ExportResult, BackendError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn teardown_rejects_every_pending_dispatch() {
        let session = DashboardSession::builder()
            .backend(Arc::new(HangingBackend))
            .workspace("ws")
            .dashboard(ObjRef::new("dashboard/1"))
            .build()
            .expect("build");
        session
            .dispatch(DashboardCommand::Initialize)
            .await
            .expect("initialize");

        let pending: Vec<PendingCommand> = (0..3)
            .map(|_| session.dispatch(DashboardCommand::Save))
            .collect();
        tokio::time::sleep(Duration::from_millis(10)).await;

        session.teardown();

        for future in pending {
            let err = future.await.expect_err("pending dispatch rejected");
            assert!(matches!(err, DispatchError::Cancelled));
        }

        let err = session
            .dispatch(DashboardCommand::rename("after"))
            .await
            .expect_err("session closed");
        assert!(matches!(err, DispatchError::SessionClosed));
    }

    /// Export blocks until the test releases a semaphore permit.
    struct GatedExportBackend {
        release: tokio::sync::Semaphore,
    }

    #[async_trait]
    impl BackendProvider for GatedExportBackend {
        async fn load_dashboard(
            &self,
            workspace: &str,
            dashboard: &ObjRef,
        ) -> Result<DashboardDefinition, BackendError> {
            HangingBackend.load_dashboard(workspace, dashboard).await
        }

        async fn save_dashboard(
            &self,
            _workspace: &str,
            _definition: &DashboardDefinition,
        ) -> Result<ObjRef, BackendError> {
            Ok(ObjRef::new("dashboard/1"))
        }

        async fn delete_dashboard(
            &self,
            _workspace: &str,
            _dashboard: &ObjRef,
        ) -> Result<(), BackendError> {
            Ok(())
        }

        async fn load_catalog(&self, _workspace: &str) -> Result<Vec<CatalogItem>, BackendError> {
            Ok(Vec::new())
        }

        async fn load_permissions(&self, _workspace: &str) -> Result<Permissions, BackendError> {
            Ok(Permissions::all())
        }

        async fn run_execution(
            &self,
            _workspace: &str,
            _request: &ExecutionRequest,
        ) -> Result<ExecutionResult, BackendError> {
            Ok(ExecutionResult {
                data: serde_json::Value::Null,
            })
        }

        async fn export_to_pdf(
            &self,
            _workspace: &str,
            _dashboard: &ObjRef,
        ) -> Result<ExportResult, BackendError> {
            let _permit = self
                .release
                .acquire()
                .await
                .map_err(|_| BackendError::Unavailable {
                    message: "export gate closed".into(),
                })?;
            Ok(ExportResult {
                uri: "exports/dashboard-1.pdf".into(),
            })
        }
    }

    #[tokio::test]
    async fn newer_export_supersedes_the_in_flight_one() {
        let backend = Arc::new(GatedExportBackend {
            release: tokio::sync::Semaphore::new(0),
        });
        let session = DashboardSession::builder()
            .backend(Arc::clone(&backend) as Arc<dyn BackendProvider>)
            .workspace("ws")
            .dashboard(ObjRef::new("dashboard/1"))
            .build()
            .expect("build");
        session
            .dispatch(DashboardCommand::Initialize)
            .await
            .expect("initialize");

        let first = session.dispatch(DashboardCommand::ExportToPdf);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = session.dispatch(DashboardCommand::ExportToPdf);
        tokio::time::sleep(Duration::from_millis(10)).await;
        backend.release.add_permits(2);

        let err = first.await.expect_err("superseded export cancelled");
        assert!(matches!(err, DispatchError::Cancelled));

        let event = second.await.expect("latest export completes");
        assert!(matches!(
            event,
            DashboardEvent::DashboardExportedToPdf { .. }
        ));
    }

    #[tokio::test]
    async fn trigger_event_round_trips_the_payload() {
        let backend = Arc::new(StubBackend::new());
        let session = session_for(backend);
        let payload = serde_json::json!({ "kind": "host-signal", "value": 3 });

        let event = session
            .dispatch(DashboardCommand::TriggerEvent {
                payload: payload.clone(),
            })
            .await
            .expect("trigger succeeds");

        assert_eq!(event, DashboardEvent::CustomEventTriggered { payload });
    }
}
