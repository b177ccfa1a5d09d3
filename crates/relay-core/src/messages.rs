//! Message vocabulary.
//!
//! Messages are opaque to this crate: anything implementing [`Message`] can
//! travel over a [`Connection`](crate::connection::Connection) as
//! `Arc<dyn Message>`. Typed handlers recover the concrete type with
//! [`downcast_ref`](trait.Message.html#method.downcast_ref).
//!
//! [`DisconnectMessage`] is the one message this crate constructs itself.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A payload that can be sent over a connection.
pub trait Message: Any + Send + Sync + fmt::Debug {
    /// Numeric type tag on the wire.
    fn message_type(&self) -> u16;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

impl dyn Message {
    /// Borrow as the concrete message type `M`, if it is one.
    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    /// Whether the payload is of concrete type `M`.
    pub fn is<M: Message>(&self) -> bool {
        self.as_any().is::<M>()
    }
}

/// Why a connection ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionResult {
    /// Closed normally.
    Success,
    /// Failed for an unknown reason.
    FailedUnknown,
    /// The connection could not be established or was lost.
    ConnectionFailed,
    /// Peers speak incompatible protocol versions.
    IncompatibleVersion,
    /// Peers could not agree on encryption.
    EncryptionMismatch,
    /// A message failed its authentication check.
    MessageAuthenticationFailed,
    /// The peer stopped responding.
    TimedOut,
    /// Application-defined reason; see [`DisconnectMessage::custom_reason`].
    Custom,
}

impl fmt::Display for ConnectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::FailedUnknown => "failed_unknown",
            Self::ConnectionFailed => "connection_failed",
            Self::IncompatibleVersion => "incompatible_version",
            Self::EncryptionMismatch => "encryption_mismatch",
            Self::MessageAuthenticationFailed => "message_authentication_failed",
            Self::TimedOut => "timed_out",
            Self::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// Tells the peer why it is being disconnected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectMessage {
    /// Reason code.
    pub reason: ConnectionResult,
    /// Free-text explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_reason: Option<String>,
}

impl DisconnectMessage {
    /// Wire type tag.
    pub const TYPE: u16 = 1;

    /// Disconnect notice with no custom text.
    #[must_use]
    pub fn new(reason: ConnectionResult) -> Self {
        Self {
            reason,
            custom_reason: None,
        }
    }

    /// Attach a free-text explanation.
    #[must_use]
    pub fn with_custom_reason(mut self, custom_reason: impl Into<String>) -> Self {
        self.custom_reason = Some(custom_reason.into());
        self
    }
}

impl Message for DisconnectMessage {
    fn message_type(&self) -> u16 {
        Self::TYPE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
