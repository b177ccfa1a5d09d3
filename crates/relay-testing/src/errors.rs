//! Wait gate errors.

use thiserror::Error;

/// Why a [`WaitGate`](crate::WaitGate) wait did not pass.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WaitError {
    /// A failure was reported, or a pass report was rejected by the gate's
    /// predicate.
    #[error("asynchronous operation reported failure")]
    AssertionFailed,

    /// Nothing was reported within the timeout.
    #[error("asynchronous operation timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The gate was configured with an unusable value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for wait operations.
pub type Result<T> = std::result::Result<T, WaitError>;
