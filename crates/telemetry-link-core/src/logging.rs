//! Logging facilities for Telemetry Link.
//!
//! Telemetry Link uses the `tracing` crate for instrumentation. The library
//! never installs a subscriber; to see logs, install one in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("telemetry_link=debug")
//!         .init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! Levels are used consistently across crates:
//!
//! | Level | Used for |
//! |-------|----------|
//! | `trace` | Per-frame and per-emission detail |
//! | `debug` | Connection status transitions |
//! | `info`  | Reconnect scheduling, lifecycle (start/stop) |
//! | `warn`  | Decode failures, transport errors, exhausted retries |

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Root target; matches every subsystem below.
    pub const ROOT: &str = "telemetry_link";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "telemetry_link::signal";
    /// Live data client (status machine, frame decoding, reconnects).
    pub const LIVE: &str = "telemetry_link::live";
    /// Streaming transport (WebSocket socket task).
    pub const TRANSPORT: &str = "telemetry_link::transport";
    /// Companion REST client.
    pub const COMPANION: &str = "telemetry_link::companion";
    /// Process-wide client registry.
    pub const REGISTRY: &str = "telemetry_link::registry";
}

/// Span names used throughout Telemetry Link for tracing.
pub mod span_names {
    /// One socket session, from handshake to close.
    pub const SOCKET_SESSION: &str = "telemetry_link::transport::session";
}
