//! Streaming transports for the live data client.
//!
//! A transport is a persistent, bidirectional message stream. The client never
//! talks to a socket directly; it asks a [`Connector`] to open a transport and
//! then consumes the [`TransportEvent`]s that transport reports, much like a
//! browser `WebSocket` object reports `open`, `message`, `error` and `close`.
//!
//! [`WebSocketConnector`] is the production implementation. Tests and
//! alternative transports implement [`Connector`] directly, using
//! [`TransportHandle::channel`] to obtain both ends of a transport.
//!
//! # Event Contract
//!
//! Every transport reports, in order:
//!
//! 1. zero or one [`TransportEvent::Opened`]
//! 2. any number of [`TransportEvent::Frame`]s (only after `Opened`)
//! 3. optionally one or more [`TransportEvent::Error`]s
//! 4. at most one [`TransportEvent::Closed`], after which nothing follows
//!
//! Dropping the event sender without `Closed` is treated as a close.

mod websocket;

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::error::Result;

pub use websocket::WebSocketConnector;

/// One discrete message delivered by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

/// Close details reported by the remote end, when it sent any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseInfo {
    /// Numeric close code (RFC 6455).
    pub code: u16,
    /// Human-readable reason; empty when none was given.
    pub reason: String,
}

/// Lifecycle and data events reported by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is open and frames may flow.
    Opened,
    /// A frame arrived from the remote end.
    Frame(Frame),
    /// A connection-level failure occurred.
    Error(String),
    /// The connection is closed. No further events follow.
    Closed(Option<CloseInfo>),
}

/// Commands the client sends to a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Send a UTF-8 text frame.
    Text(String),
    /// Close the connection normally.
    Close,
}

/// Everything a connector needs to open a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Endpoint URL, e.g. `ws://localhost:8000/ws`.
    pub url: String,
    /// Extra headers for the opening handshake.
    pub headers: HashMap<String, String>,
}

impl ConnectRequest {
    /// Create a request for the given URL with no extra headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }
}

/// The client's side of an open transport.
#[derive(Debug)]
pub struct TransportHandle {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

/// The transport's side: where it reports events and receives commands.
#[derive(Debug)]
pub struct TransportEndpoint {
    /// Report lifecycle and data events to the client.
    pub events: mpsc::UnboundedSender<TransportEvent>,
    /// Commands from the client. Yields `None` once the client has let go of
    /// the transport, which implementations should treat as [`Outbound::Close`].
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl TransportHandle {
    /// Create a connected handle/endpoint pair.
    pub fn channel() -> (TransportHandle, TransportEndpoint) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            TransportHandle {
                events: events_rx,
                outbound: outbound_tx,
            },
            TransportEndpoint {
                events: events_tx,
                outbound: outbound_rx,
            },
        )
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedReceiver<TransportEvent>,
        mpsc::UnboundedSender<Outbound>,
    ) {
        (self.events, self.outbound)
    }
}

/// Opens transports to a streaming endpoint.
///
/// `open` must return promptly: connection progress is reported later through
/// the handle's events, never by blocking the caller. Returning `Err` means no
/// transport could be created at all (bad request, no runtime); the client
/// treats it as a failed connection attempt.
pub trait Connector: Send + Sync + 'static {
    /// Begin opening a transport for `request`.
    fn open(&self, request: &ConnectRequest) -> Result<TransportHandle>;
}
