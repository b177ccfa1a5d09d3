//! The connection capability.
//!
//! [`Connection`] captures the minimal surface this crate needs from a
//! transport: send a message, request a disconnect, and observe inbound
//! messages. Transport, framing, and lifecycle live behind the trait.

use std::fmt;
use std::sync::Arc;

use crate::errors::TransportError;
use crate::events::EventRegistry;
use crate::ids::ConnectionId;
use crate::messages::{ConnectionResult, Message};

/// One inbound message, as delivered to observers.
#[derive(Clone)]
pub struct MessageEvent {
    /// Connection the message arrived on.
    pub connection: Arc<dyn Connection>,
    /// The message.
    pub message: Arc<dyn Message>,
}

impl fmt::Debug for MessageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEvent")
            .field("connection", self.connection.id())
            .field("message", &self.message)
            .finish()
    }
}

/// A bidirectional message channel.
#[cfg_attr(test, mockall::automock)]
pub trait Connection: Send + Sync {
    /// Stable identifier for logging.
    fn id(&self) -> &ConnectionId;

    /// Transmit a message.
    fn send(&self, message: Arc<dyn Message>) -> Result<(), TransportError>;

    /// Request a disconnect. Returns without waiting for it to complete.
    fn disconnect_async(&self, reason: ConnectionResult);

    /// Observers of inbound messages, called in arrival order.
    fn message_received(&self) -> &Arc<EventRegistry<MessageEvent>>;
}
