//! Synchronous, ordered event fan-out.
//!
//! The bus delivers every envelope to all matching listeners, in
//! subscription order, before the publishing call returns (unless a
//! delivery loop is already running on another stack frame, in which case
//! the envelope queues behind it). Delivery iterates a snapshot of the
//! listener list taken when the envelope's delivery starts:
//!
//! - listeners registered during delivery see only later events;
//! - unsubscribing during delivery does not disturb the current snapshot;
//! - publishing from inside a listener never re-enters the loop, the
//!   envelope is appended to the pending queue and delivered after the
//!   current envelope finishes fan-out.
//!
//! Sequence numbers are allocated in queue order, so listeners always
//! observe strictly increasing sequences.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::command::CorrelationId;
use crate::event::{DashboardEvent, EventContext, EventEnvelope};

/// Handle returned from a subscription; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;
type Predicate = Arc<dyn Fn(&DashboardEvent) -> bool + Send + Sync>;

#[derive(Clone)]
struct Subscription {
    id: ListenerId,
    predicate: Option<Predicate>,
    listener: Listener,
}

/// The session-scoped event bus.
pub struct EventBus {
    next_listener_id: AtomicU64,
    next_sequence: AtomicU64,
    listeners: RwLock<Vec<Subscription>>,
    pending: Mutex<VecDeque<EventEnvelope>>,
    draining: AtomicBool,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            next_listener_id: AtomicU64::new(0),
            next_sequence: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
        }
    }

    /// Register a listener for every published event.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        self.subscribe_inner(None, Arc::new(listener))
    }

    /// Register a listener for events matching the predicate.
    pub fn subscribe_when<P, F>(&self, predicate: P, listener: F) -> ListenerId
    where
        P: Fn(&DashboardEvent) -> bool + Send + Sync + 'static,
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        self.subscribe_inner(Some(Arc::new(predicate)), Arc::new(listener))
    }

    fn subscribe_inner(&self, predicate: Option<Predicate>, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .expect("event bus listener lock poisoned")
            .push(Subscription {
                id,
                predicate,
                listener,
            });
        id
    }

    /// Remove a listener. Returns false when the id is unknown (already
    /// unsubscribed). Safe to call from inside a listener.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .expect("event bus listener lock poisoned");
        let before = listeners.len();
        listeners.retain(|sub| sub.id != id);
        listeners.len() != before
    }

    /// Publish an event. Returns the envelope's sequence number.
    ///
    /// When no delivery loop is running this call delivers the envelope
    /// (and anything queued behind it) before returning; when called from
    /// inside a listener it only queues.
    pub fn publish(
        &self,
        correlation_id: Option<CorrelationId>,
        ctx: EventContext,
        event: DashboardEvent,
    ) -> u64 {
        let sequence = {
            let mut pending = self.pending.lock().expect("event bus queue lock poisoned");
            let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
            pending.push_back(EventEnvelope {
                sequence,
                correlation_id,
                ctx,
                event,
            });
            sequence
        };
        self.drain();
        sequence
    }

    /// Run the delivery loop unless another frame already holds it.
    fn drain(&self) {
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // A delivery loop is active; it will pick up the queue.
                return;
            }
            loop {
                let envelope = {
                    let mut pending =
                        self.pending.lock().expect("event bus queue lock poisoned");
                    pending.pop_front()
                };
                let Some(envelope) = envelope else { break };
                let snapshot: Vec<Subscription> = self
                    .listeners
                    .read()
                    .expect("event bus listener lock poisoned")
                    .clone();
                for sub in &snapshot {
                    let matches = sub
                        .predicate
                        .as_ref()
                        .map_or(true, |pred| pred(&envelope.event));
                    if matches {
                        (sub.listener)(&envelope);
                    }
                }
            }
            self.draining.store(false, Ordering::Release);
            // An envelope may have been queued by another thread between
            // the final pop and the flag release; re-check or it would sit
            // undelivered until the next publish.
            if self
                .pending
                .lock()
                .expect("event bus queue lock poisoned")
                .is_empty()
            {
                return;
            }
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .expect("event bus listener lock poisoned")
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
