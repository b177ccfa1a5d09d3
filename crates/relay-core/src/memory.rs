//! In-process [`Connection`] backed by a bounded tokio channel.
//!
//! Outbound messages land on an `mpsc` queue whose receiver the caller
//! holds. Inbound traffic is simulated with [`MemoryConnection::receive`],
//! which dispatches to the connection's observers on the calling thread,
//! standing in for a transport's I/O thread.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use relay_settings::MemorySettings;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::connection::{Connection, MessageEvent};
use crate::errors::TransportError;
use crate::events::EventRegistry;
use crate::ids::ConnectionId;
use crate::messages::{ConnectionResult, Message};

/// Receiving half of a [`MemoryConnection`]'s outbound queue.
pub type Outbox = mpsc::Receiver<Arc<dyn Message>>;

/// A connection that lives entirely in memory.
pub struct MemoryConnection {
    id: ConnectionId,
    tx: mpsc::Sender<Arc<dyn Message>>,
    received: Arc<EventRegistry<MessageEvent>>,
    connected: AtomicBool,
    disconnect_reason: Mutex<Option<ConnectionResult>>,
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl MemoryConnection {
    /// Wrap an existing sender.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<dyn Message>>) -> Self {
        Self {
            id,
            tx,
            received: Arc::new(EventRegistry::new()),
            connected: AtomicBool::new(true),
            disconnect_reason: Mutex::new(None),
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Create a connection with an outbound queue of `capacity` messages.
    pub fn channel(capacity: NonZeroUsize) -> (Arc<Self>, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.get());
        (Arc::new(Self::new(ConnectionId::new(), tx)), rx)
    }

    /// Create a connection sized by `settings`. A zero capacity is raised
    /// to one.
    pub fn from_settings(settings: &MemorySettings) -> (Arc<Self>, Outbox) {
        let capacity = NonZeroUsize::new(settings.channel_capacity).unwrap_or(NonZeroUsize::MIN);
        Self::channel(capacity)
    }

    /// Create a connection sized from the global settings.
    pub fn with_default_capacity() -> (Arc<Self>, Outbox) {
        Self::from_settings(&relay_settings::get_settings().memory)
    }

    /// Deliver an inbound message to this connection's observers.
    ///
    /// Returns the number of observers invoked. Messages arriving after a
    /// disconnect are discarded.
    pub fn receive(self: &Arc<Self>, message: Arc<dyn Message>) -> usize {
        if !self.is_connected() {
            debug!(conn_id = %self.id, "discarding message received after disconnect");
            return 0;
        }
        let event = MessageEvent {
            connection: Arc::clone(self) as Arc<dyn Connection>,
            message,
        };
        self.received.dispatch(&event)
    }

    /// Whether `disconnect_async` has not been called yet.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Reason passed to the first `disconnect_async`, if any.
    pub fn disconnect_reason(&self) -> Option<ConnectionResult> {
        *self.disconnect_reason.lock()
    }

    /// Messages accepted onto the outbound queue.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Sends rejected because the queue was full or closed.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Connection for MemoryConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn send(&self, message: Arc<dyn Message>) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        match self.tx.try_send(message) {
            Ok(()) => {
                let _ = self.sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                match e {
                    TrySendError::Full(_) => Err(TransportError::Backpressure),
                    TrySendError::Closed(_) => Err(TransportError::Closed),
                }
            }
        }
    }

    fn disconnect_async(&self, reason: ConnectionResult) {
        if self.connected.swap(false, Ordering::AcqRel) {
            *self.disconnect_reason.lock() = Some(reason);
            debug!(conn_id = %self.id, %reason, "disconnect requested");
        }
    }

    fn message_received(&self) -> &Arc<EventRegistry<MessageEvent>> {
        &self.received
    }
}

impl std::fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
