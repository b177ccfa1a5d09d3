//! # relay-core
//!
//! Convenience operations over a bidirectional message connection.
//!
//! The [`Connection`](connection::Connection) trait is the only thing this
//! crate asks of a transport: `send`, `disconnect_async`, and an observable
//! stream of inbound messages. On top of it:
//!
//! - **One-shot subscriptions**: [`ConnectionExt::subscribe_once`] fires a
//!   callback for the first inbound message of a given type that passes a
//!   predicate, removing itself before the callback runs
//! - **Disconnect notice**: [`ConnectionExt::notify_and_disconnect`] sends a
//!   [`DisconnectMessage`](messages::DisconnectMessage) and then requests a
//!   disconnect
//! - **Broadcast**: [`broadcast_send`] sends one message to an ordered
//!   sequence of connections, stopping at the first failure
//!
//! The observer registry behind inbound streams is
//! [`EventRegistry`](events::EventRegistry). [`MemoryConnection`] is an
//! in-process implementation for tests and local wiring.
//!
//! ## Example
//!
//! ```rust,ignore
//! use relay_core::{ConnectionExt, MemoryConnection};
//!
//! let (conn, _outbox) = MemoryConnection::channel(NonZeroUsize::new(16).unwrap());
//! let _ = conn.subscribe_once(|m: &Pong| m.seq == 7, |m, _event| println!("pong {}", m.seq));
//! ```

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod events;
pub mod extensions;
pub mod ids;
pub mod logging;
pub mod memory;
pub mod messages;

pub use connection::{Connection, MessageEvent};
pub use errors::TransportError;
pub use events::{EventRegistry, Subscription, SubscriptionId};
pub use extensions::{ConnectionExt, broadcast_send};
pub use ids::ConnectionId;
pub use memory::{MemoryConnection, Outbox};
pub use messages::{ConnectionResult, DisconnectMessage, Message};
