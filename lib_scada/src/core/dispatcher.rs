//! # Zero-Copy Message Dispatcher
//!
//! Every adaptor owns one `Dispatcher`. The adaptor's worker (or, for the
//! manual adaptor, the caller of `feed`) hands it each inbound message and
//! the dispatcher invokes every registered listener in registration order.
//!
//! ## Core Design Principles:
//!
//! 1.  **Zero-Copy Fan-out**: a message is wrapped in an `Arc` once. All
//!     listeners receive the same instance, so tags of one source always see
//!     the very same message, only projected differently.
//!
//! 2.  **Synchronous, Ordered Delivery**: `broadcast` returns only after every
//!     live listener has run. Messages of one dispatcher therefore reach all
//!     listeners in arrival order.
//!
//! 3.  **Immediate Cancellation**: each listener carries a `CancellationToken`
//!     and sits behind its own lock. `Subscription::cancel` takes that lock and
//!     empties the slot, so once it returns the handler can never run again,
//!     not even for a message another thread is broadcasting at that moment.
//!
//! Handlers must not cancel their own subscription or broadcast into the
//! dispatcher they are registered on; both would wait on the slot they hold.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// The unit every adaptor produces.
pub type Message = Arc<Value>;

type Handler = Box<dyn FnMut(&Message) -> bool + Send>;
type HandlerSlot = Arc<Mutex<Option<Handler>>>;

/// # Listener Handle
///
/// Internal record of one registered listener.
struct ListenerHandle {
    id: u64,
    token: CancellationToken,
    slot: HandlerSlot,
}

/// # Core Dispatcher
pub struct Dispatcher {
    /// Name used in log lines (usually the adaptor kind and endpoint).
    label: String,
    listeners: Mutex<Vec<ListenerHandle>>,
    next_id: AtomicU64,
    /// Cancelled on `close`; a closed dispatcher drops every message.
    closed: CancellationToken,
}

impl Dispatcher {
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            closed: CancellationToken::new(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// # Subscribe
    ///
    /// Registers `handler` behind every listener added so far. The returned
    /// [`Subscription`] is the only way to stop it; dropping the subscription
    /// leaves the listener registered.
    pub fn subscribe<F>(self: &Arc<Self>, mut handler: F) -> Subscription
    where
        F: FnMut(&Message) + Send + 'static,
    {
        self.subscribe_filtered(move |message: &Message| {
            handler(message);
            true
        })
    }

    /// Like [`subscribe`](Self::subscribe), but the handler tells whether it
    /// accepted the message. Only accepted messages count as delivered.
    pub fn subscribe_filtered<F>(self: &Arc<Self>, handler: F) -> Subscription
    where
        F: FnMut(&Message) -> bool + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let slot: HandlerSlot = Arc::new(Mutex::new(Some(Box::new(handler))));

        self.lock_listeners().push(ListenerHandle {
            id,
            token: token.clone(),
            slot,
        });
        log::trace!("Listener {} registered on '{}'", id, self.label);

        Subscription {
            id,
            token,
            dispatcher: Arc::downgrade(self),
        }
    }

    /// # Broadcast
    ///
    /// Delivers one message to every live listener and returns how many
    /// accepted it.
    ///
    /// ## Logic:
    /// 1.  Wraps the payload in an `Arc` so all listeners share it.
    /// 2.  Snapshots the listener list and releases the list lock, so handlers
    ///     may subscribe new listeners without deadlocking.
    /// 3.  For each listener, skips it if its token was cancelled, otherwise
    ///     locks its slot and runs the handler if the slot is still filled.
    pub fn broadcast(&self, payload: Value) -> usize {
        if self.closed.is_cancelled() {
            log::trace!("Dropping message on closed dispatcher '{}'", self.label);
            return 0;
        }

        let message: Message = Arc::new(payload);
        let snapshot: Vec<(CancellationToken, HandlerSlot)> = self
            .lock_listeners()
            .iter()
            .map(|listener| (listener.token.clone(), Arc::clone(&listener.slot)))
            .collect();

        let mut delivered = 0;
        for (token, slot) in snapshot {
            if token.is_cancelled() || self.closed.is_cancelled() {
                continue;
            }
            let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(handler) = guard.as_mut() {
                if handler(&message) {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Number of listeners that have not been cancelled.
    pub fn listener_count(&self) -> usize {
        self.lock_listeners()
            .iter()
            .filter(|listener| !listener.token.is_cancelled())
            .count()
    }

    /// Stops all further delivery. Idempotent.
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            log::debug!("Dispatcher '{}' closed", self.label);
        }
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Removes a listener and empties its slot, waiting for an in-flight
    /// invocation to finish first.
    fn remove_listener(&self, id: u64) {
        let removed = {
            let mut listeners = self.lock_listeners();
            listeners
                .iter()
                .position(|listener| listener.id == id)
                .map(|pos| listeners.remove(pos))
        };

        if let Some(listener) = removed {
            listener.token.cancel();
            let mut guard = listener.slot.lock().unwrap_or_else(PoisonError::into_inner);
            guard.take();
            log::trace!("Listener {} removed from '{}'", listener.id, self.label);
        }
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<ListenerHandle>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// # Subscription
///
/// Cancellation handle of one listener.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    token: CancellationToken,
    dispatcher: Weak<Dispatcher>,
}

impl Subscription {
    /// Stops the listener. Once this returns the handler will not be invoked
    /// again. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher.remove_listener(self.id);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
