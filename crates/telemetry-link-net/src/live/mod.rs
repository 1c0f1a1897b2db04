//! Live data client.
//!
//! [`LiveDataClient`] keeps a single streaming connection to a telemetry
//! endpoint, decodes every inbound frame into a [`TelemetryMessage`], and
//! fans out [`LiveEvent`]s to any number of subscribers.
//!
//! # Connection Lifecycle
//!
//! ```text
//!                 start()
//! Disconnected ───────────▶ Connecting ──opened──▶ Connected
//!      ▲                      │   ▲                   │
//!      │ closed               │   │ retry delay       │ error
//!      │                      ▼   │                   ▼
//!      └───────────────────── Error ◀─────────────────┘
//! ```
//!
//! After an unexpected close or error the client waits a flat delay (3s by
//! default, 5s when the transport could not be created) and tries again.
//! [`LiveDataClient::stop`] cancels everything; nothing from a stopped
//! connection reaches subscribers afterwards.
//!
//! # Example
//!
//! ```ignore
//! use telemetry_link_net::live::{LiveClientConfig, LiveDataClient, LiveEvent};
//!
//! let client = LiveDataClient::new(LiveClientConfig::default());
//! let subscription = client.subscribe(|event| {
//!     if let LiveEvent::Message { message, .. } = event {
//!         println!("{:?}", message.get("battery"));
//!     }
//! });
//!
//! client.start("ws://localhost:8000/ws")?;
//! // ...
//! subscription.unsubscribe();
//! client.stop();
//! ```

mod client;
mod config;
pub mod machine;
mod payload;
mod status;

pub use client::{ClientStats, LiveDataClient, Subscription};
pub use config::{
    DEFAULT_CONNECT_FAILURE_DELAY, DEFAULT_RECONNECT_DELAY, LiveClientConfig, ReconnectPolicy,
    RetryCause,
};
pub use payload::{DecodeError, TelemetryMessage};
pub use status::{ConnectionStatus, LiveEvent};
