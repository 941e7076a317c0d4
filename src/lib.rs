//! Deterministic command/event engine for analytical dashboards.
//!
//! A [`DashboardSession`](session::DashboardSession) turns dispatched
//! [`DashboardCommand`](command::DashboardCommand)s into validated state
//! mutations and ordered [`DashboardEvent`](event::DashboardEvent)s. Every
//! dispatch returns a future that settles exactly once with the command's
//! terminal outcome; all side effects go through an injected
//! [`BackendProvider`](backend::BackendProvider).

pub mod backend;
pub mod bus;
pub mod command;
pub mod error;
pub mod event;
pub mod selectors;
pub mod session;
pub mod store;
pub mod types;

mod context;
mod dispatcher;
mod handlers;

pub use backend::{BackendProvider, DashboardDefinition, ExecutionRequest, ExecutionResult};
pub use bus::ListenerId;
pub use command::{CorrelationId, DashboardCommand};
pub use context::DashboardConfig;
pub use dispatcher::CommandResult;
pub use error::{DispatchError, FailureKind, RejectionReason};
pub use event::{DashboardEvent, EventContext, EventEnvelope};
pub use session::{DashboardSession, DashboardSessionBuilder, PendingCommand, SessionBuildError};
pub use store::{StateStore, StateTree};
