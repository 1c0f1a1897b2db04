//! Networking module for Telemetry Link.
//!
//! This crate provides the pieces a dashboard needs to follow a live
//! telemetry feed:
//!
//! - **Live Data Client**: One self-healing streaming connection with
//!   subscriber notifications
//! - **Transports**: WebSocket transport plus a [`Connector`] seam for others
//! - **Companion REST**: JSON helpers for the endpoints that accompany a feed
//!
//! # Live Data Client
//!
//! ```ignore
//! use telemetry_link_net::live::{LiveClientConfig, LiveDataClient, LiveEvent};
//!
//! let client = LiveDataClient::new(LiveClientConfig::default());
//!
//! let subscription = client.subscribe(|event| match event {
//!     LiveEvent::StatusChanged(status) => println!("status: {status}"),
//!     LiveEvent::Message { message, .. } => println!("{:?}", message.get("battery")),
//! });
//!
//! client.start("ws://localhost:8000/ws")?;
//! ```
//!
//! ## Reconnection
//!
//! Unexpected closes and errors are retried after a flat delay:
//!
//! ```ignore
//! use std::time::Duration;
//! use telemetry_link_net::live::{LiveClientConfig, ReconnectPolicy};
//!
//! let config = LiveClientConfig::new()
//!     .header("Authorization", "Bearer token")
//!     .reconnect_policy(
//!         ReconnectPolicy::new()
//!             .delay(Duration::from_secs(3))
//!             .max_attempts(10),
//!     );
//! ```
//!
//! # Companion REST
//!
//! ```ignore
//! use telemetry_link_net::companion::CompanionClient;
//!
//! let api = CompanionClient::new("http://localhost:8000")?;
//! let health = api.health_analysis().await?;
//! ```

pub mod companion;
mod error;
pub mod live;
pub mod transport;

pub use companion::{CompanionClient, CompanionClientBuilder};
pub use error::{NetworkError, Result};
pub use live::{
    ClientStats, ConnectionStatus, DecodeError, LiveClientConfig, LiveDataClient, LiveEvent,
    ReconnectPolicy, Subscription, TelemetryMessage,
};
pub use transport::{
    CloseInfo, ConnectRequest, Connector, Frame, Outbound, TransportEndpoint, TransportEvent,
    TransportHandle, WebSocketConnector,
};
