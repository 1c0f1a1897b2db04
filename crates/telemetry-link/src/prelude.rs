//! Prelude module for Telemetry Link.
//!
//! This module re-exports the most commonly used types for convenient importing:
//!
//! ```ignore
//! use telemetry_link::prelude::*;
//! ```
//!
//! This provides access to:
//! - The live data client (`LiveDataClient`, `LiveEvent`, `ConnectionStatus`)
//! - Client configuration (`LiveClientConfig`, `ReconnectPolicy`)
//! - Settings and the process-wide registry

// ============================================================================
// Live Data Client
// ============================================================================

pub use telemetry_link_net::live::{
    ConnectionStatus, LiveClientConfig, LiveDataClient, LiveEvent, ReconnectPolicy, Subscription,
    TelemetryMessage,
};
pub use telemetry_link_net::NetworkError;

// ============================================================================
// Companion REST
// ============================================================================

#[cfg(feature = "companion")]
pub use telemetry_link_net::companion::CompanionClient;

// ============================================================================
// Application Wiring
// ============================================================================

pub use crate::registry;
pub use crate::settings::{Settings, SettingsError};
