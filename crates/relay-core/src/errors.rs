//! Transport errors surfaced by [`Connection`](crate::connection::Connection)
//! implementations.
//!
//! Operations in this crate propagate these unmodified. Nothing here is
//! retried, translated, or logged.

use thiserror::Error;

/// Failure reported by a connection's `send`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection is closed or its peer has gone away.
    #[error("connection closed")]
    Closed,

    /// The outbound queue is full.
    #[error("outbound queue full")]
    Backpressure,

    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(String),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
