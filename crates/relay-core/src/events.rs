//! Observer registry with removable handles.
//!
//! An [`EventRegistry`] holds the observers of one event stream. Each
//! registration yields a [`SubscriptionId`] that removes it again.
//!
//! ## Dispatch
//!
//! [`dispatch`](EventRegistry::dispatch) snapshots the handler list under the
//! lock and invokes handlers with the lock released. Handlers may therefore
//! subscribe or unsubscribe (themselves included) while a dispatch is in
//! flight, from the dispatching thread or any other. A handler removed during
//! a dispatch may still observe the event that dispatch is delivering.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

/// Identifies one registration in an [`EventRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub_{}", self.0)
    }
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Subscriber set for one event stream.
pub struct EventRegistry<E> {
    next_id: AtomicU64,
    /// Handlers in registration order.
    handlers: Mutex<Vec<(SubscriptionId, Handler<E>)>>,
}

impl<E> EventRegistry<E> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Register a handler.
    pub fn subscribe<H>(&self, handler: H) -> SubscriptionId
    where
        H: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe_with(|_| handler)
    }

    /// Register a handler that needs to know its own id.
    ///
    /// `make` receives the id before the handler is installed, so the handler
    /// can capture it and later remove itself.
    pub fn subscribe_with<F, H>(&self, make: F) -> SubscriptionId
    where
        F: FnOnce(SubscriptionId) -> H,
        H: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Handler<E> = Arc::new(make(id));
        self.handlers.lock().push((id, handler));
        trace!(%id, "subscribed");
        id
    }

    /// Remove a registration. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(pos) = handlers.iter().position(|(h, _)| *h == id) else {
            return false;
        };
        let _ = handlers.remove(pos);
        trace!(%id, "unsubscribed");
        true
    }

    /// Whether `id` is still registered.
    #[must_use]
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.handlers.lock().iter().any(|(h, _)| *h == id)
    }

    /// Deliver `event` to every handler registered when the call began.
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &E) -> usize {
        let snapshot: Vec<Handler<E>> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in &snapshot {
            handler(event);
        }
        snapshot.len()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Whether no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    /// Remove every handler.
    pub fn clear(&self) {
        self.handlers.lock().clear();
    }
}

impl<E> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("handler_count", &self.len())
            .finish()
    }
}

/// Handle to a registration, held weakly.
///
/// Dropping the handle leaves the registration in place. Call
/// [`cancel`](Self::cancel) to remove it early.
pub struct Subscription<E> {
    id: SubscriptionId,
    registry: Weak<EventRegistry<E>>,
}

impl<E> Subscription<E> {
    /// Wrap an id issued by `registry`.
    #[must_use]
    pub fn new(id: SubscriptionId, registry: &Arc<EventRegistry<E>>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    /// The registration id.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the registration if it is still present.
    ///
    /// Returns `false` if it already fired, was cancelled, or the registry
    /// is gone.
    pub fn cancel(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.unsubscribe(self.id))
    }

    /// Whether the registration is still installed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains(self.id))
    }
}

impl<E> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
