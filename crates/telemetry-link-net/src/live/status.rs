//! Connection status and subscriber notifications.

use std::fmt;
use std::sync::Arc;

use super::payload::TelemetryMessage;

/// Current state of the live data connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// No transport is active and none is being opened.
    #[default]
    Disconnected,
    /// A transport is being opened.
    Connecting,
    /// The transport is open and frames are flowing.
    Connected,
    /// The transport failed; a reconnect is pending unless the client stopped.
    Error,
}

impl ConnectionStatus {
    /// Lowercase name, as dashboards display it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }

    /// Whether a transport is active or being opened.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification delivered to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum LiveEvent {
    /// The connection status changed.
    StatusChanged(ConnectionStatus),
    /// A frame decoded successfully and is now the latest message.
    Message {
        /// Status at delivery time; always [`ConnectionStatus::Connected`].
        status: ConnectionStatus,
        /// The decoded payload.
        message: Arc<TelemetryMessage>,
    },
}

impl LiveEvent {
    /// The status carried by this event.
    pub fn status(&self) -> ConnectionStatus {
        match self {
            Self::StatusChanged(status) => *status,
            Self::Message { status, .. } => *status,
        }
    }

    /// The message carried by this event, if any.
    pub fn message(&self) -> Option<&Arc<TelemetryMessage>> {
        match self {
            Self::StatusChanged(_) => None,
            Self::Message { message, .. } => Some(message),
        }
    }
}
