//! Command intake: validation, handler task spawning, terminal-event
//! publication, and dispatch-future settlement.
//!
//! The dispatcher owns the engine's moving parts (store, bus, undo journal,
//! correlation table) and enforces the core contract: every submitted
//! command produces exactly one terminal event, and every dispatch future
//! settles exactly once, including under handler panics and teardown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, watch};
use tracing::Instrument;

use crate::backend::BackendProvider;
use crate::bus::EventBus;
use crate::command::{CorrelationId, DashboardCommand, ExclusiveClass};
use crate::context::DashboardContext;
use crate::error::{DispatchError, FailureKind};
use crate::event::{DashboardEvent, EventContext};
use crate::handlers::{self, HandlerOps};
use crate::store::undo::UndoJournal;
use crate::store::StateStore;

/// What a dispatch future resolves to: the command's success event, or the
/// classified reason it produced none.
pub type CommandResult = Result<DashboardEvent, DispatchError>;

type SettleSender = oneshot::Sender<CommandResult>;

pub(crate) struct Dispatcher {
    ctx: DashboardContext,
    store: Arc<StateStore>,
    bus: Arc<EventBus>,
    journal: Arc<UndoJournal>,
    /// Pending dispatch futures, keyed by correlation id. Settled by the
    /// bus listener on the first terminal event with a matching id.
    correlations: Mutex<HashMap<CorrelationId, SettleSender>>,
    /// One cancel signal per exclusive class; replaced (and the old one
    /// fired) when a newer command of the class arrives.
    exclusive: Mutex<HashMap<ExclusiveClass, watch::Sender<bool>>>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
}

impl Dispatcher {
    /// Build the engine around a context. The returned `Arc` is shared by
    /// the session handle and every spawned handler task.
    pub(crate) fn new(ctx: DashboardContext) -> Arc<Self> {
        let bus = Arc::new(EventBus::new());
        let journal = Arc::new(UndoJournal::new(ctx.config.undo_depth));
        let (shutdown, _) = watch::channel(false);

        Arc::new_cyclic(|weak: &std::sync::Weak<Dispatcher>| {
            // Settlement rides the bus like any other listener, so dispatch
            // futures resolve in event order with everything else.
            let settle_handle = weak.clone();
            bus.subscribe(move |envelope| {
                if !envelope.event.is_terminal() {
                    return;
                }
                let Some(correlation_id) = envelope.correlation_id.clone() else {
                    return;
                };
                if let Some(dispatcher) = settle_handle.upgrade() {
                    dispatcher.settle(correlation_id, &envelope.event);
                }
            });

            Dispatcher {
                ctx,
                store: Arc::new(StateStore::new()),
                bus: Arc::clone(&bus),
                journal,
                correlations: Mutex::new(HashMap::new()),
                exclusive: Mutex::new(HashMap::new()),
                shutdown,
                closed: AtomicBool::new(false),
            }
        })
    }

    pub(crate) fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub(crate) fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub(crate) fn journal(&self) -> &UndoJournal {
        &self.journal
    }

    pub(crate) fn backend(&self) -> &Arc<dyn BackendProvider> {
        &self.ctx.backend
    }

    pub(crate) fn workspace(&self) -> &str {
        &self.ctx.workspace
    }

    pub(crate) fn initial_dashboard(&self) -> Option<&crate::types::ObjRef> {
        self.ctx.dashboard.as_ref()
    }

    /// Publish an event, stamping the envelope with the current context.
    pub(crate) fn publish(&self, correlation_id: Option<CorrelationId>, event: DashboardEvent) {
        let ctx = EventContext {
            workspace: self.ctx.workspace.clone(),
            dashboard: self.store.read(|tree| tree.meta.dashboard.clone()),
            state_version: self.store.version(),
        };
        tracing::debug!(event = event.name(), "publishing event");
        self.bus.publish(correlation_id, ctx, event);
    }

    /// Submit a command. Returns its correlation id and the receiver the
    /// session wraps into a dispatch future. The receiver settles exactly
    /// once; dropping it makes the dispatch fire-and-forget.
    pub(crate) fn submit(
        self: &Arc<Self>,
        command: DashboardCommand,
        correlation_id: Option<CorrelationId>,
    ) -> (CorrelationId, oneshot::Receiver<CommandResult>) {
        let correlation_id = correlation_id.unwrap_or_else(CorrelationId::random);
        let (sender, receiver) = oneshot::channel();

        if self.closed.load(Ordering::Acquire) {
            let _ = sender.send(Err(DispatchError::SessionClosed));
            return (correlation_id, receiver);
        }
        self.correlations
            .lock()
            .expect("correlation table lock poisoned")
            .insert(correlation_id.clone(), sender);

        if let Err(reason) = command.validate() {
            tracing::warn!(
                command = command.name(),
                correlation_id = %correlation_id,
                %reason,
                "command rejected"
            );
            self.publish(
                Some(correlation_id.clone()),
                DashboardEvent::CommandRejected {
                    reason: reason.to_string(),
                    command,
                },
            );
            return (correlation_id, receiver);
        }

        let superseded = command.exclusive_class().map(|class| {
            let (cancel, cancelled) = watch::channel(false);
            let mut exclusive = self
                .exclusive
                .lock()
                .expect("exclusive class lock poisoned");
            if let Some(previous) = exclusive.insert(class, cancel) {
                tracing::debug!(?class, "superseding in-flight exclusive command");
                let _ = previous.send(true);
            }
            cancelled
        });

        self.publish(
            Some(correlation_id.clone()),
            DashboardEvent::CommandStarted {
                command: command.clone(),
            },
        );

        let span = tracing::info_span!(
            "command",
            name = command.name(),
            correlation_id = %correlation_id,
        );
        let ops = HandlerOps::new(
            Arc::clone(self),
            correlation_id.clone(),
            self.shutdown.subscribe(),
            superseded,
        );
        let failed_command = command.clone();
        let handle = tokio::spawn(handlers::run(ops, command).instrument(span));

        // The supervisor task is the panic boundary: a panicking handler
        // surfaces as a JoinError here and becomes a classified failure,
        // never a lost dispatch.
        let dispatcher = Arc::clone(self);
        let terminal_correlation = correlation_id.clone();
        tokio::spawn(async move {
            let event = match handle.await {
                Ok(Ok(event)) => event,
                Ok(Err(err)) => {
                    tracing::warn!(
                        command = failed_command.name(),
                        error = %err,
                        "command failed"
                    );
                    DashboardEvent::CommandFailed {
                        kind: err.kind(),
                        message: err.to_string(),
                        command: failed_command,
                    }
                }
                Err(join_err) if join_err.is_panic() => {
                    tracing::error!(
                        command = failed_command.name(),
                        "command handler panicked"
                    );
                    DashboardEvent::CommandFailed {
                        kind: FailureKind::Internal,
                        message: "command handler panicked".to_owned(),
                        command: failed_command,
                    }
                }
                Err(_) => DashboardEvent::CommandFailed {
                    kind: FailureKind::Cancelled,
                    message: "command handler was aborted".to_owned(),
                    command: failed_command,
                },
            };
            dispatcher.publish(Some(terminal_correlation), event);
        });

        (correlation_id, receiver)
    }

    /// Resolve the pending dispatch future for a terminal event. A missing
    /// table entry means the dispatch already settled (fire-and-forget, or
    /// rejected at teardown); the event still reached bus listeners.
    fn settle(&self, correlation_id: CorrelationId, event: &DashboardEvent) {
        let sender = self
            .correlations
            .lock()
            .expect("correlation table lock poisoned")
            .remove(&correlation_id);
        let Some(sender) = sender else { return };

        let result = match event {
            DashboardEvent::CommandRejected { reason, .. } => Err(DispatchError::Rejected {
                reason: reason.clone(),
            }),
            DashboardEvent::CommandFailed {
                kind: FailureKind::Cancelled,
                ..
            } => Err(DispatchError::Cancelled),
            DashboardEvent::CommandFailed { kind, message, .. } => Err(DispatchError::Failed {
                kind: *kind,
                message: message.clone(),
            }),
            success => Ok(success.clone()),
        };
        // The receiver may be gone (fire-and-forget dispatch).
        let _ = sender.send(result);
    }

    /// Tear the session down: stop accepting commands, signal cancellation
    /// to running handlers, and reject every outstanding dispatch future.
    /// Idempotent.
    pub(crate) fn teardown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.shutdown.send(true);
        let pending: Vec<SettleSender> = {
            let mut correlations = self
                .correlations
                .lock()
                .expect("correlation table lock poisoned");
            correlations.drain().map(|(_, sender)| sender).collect()
        };
        let rejected = pending.len();
        for sender in pending {
            let _ = sender.send(Err(DispatchError::Cancelled));
        }
        tracing::info!(rejected, "session torn down");
    }
}
