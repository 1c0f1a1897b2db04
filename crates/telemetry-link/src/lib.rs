//! Telemetry Link - a self-healing live telemetry client.
//!
//! This is the main umbrella crate that re-exports all public APIs, plus the
//! pieces an application wires together at startup: TOML [`settings`] and a
//! process-wide client [`registry`].
//!
//! # Example
//!
//! ```no_run
//! use telemetry_link::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load_or_default("telemetry.toml")?;
//!     let client = LiveDataClient::new(settings.stream.client_config());
//!
//!     let _subscription = client.subscribe(|event| match event {
//!         LiveEvent::StatusChanged(status) => println!("status: {status}"),
//!         LiveEvent::Message { message, .. } => println!("{:?}", message.get("battery")),
//!     });
//!
//!     client.start(&settings.stream.url)?;
//!     tokio::signal::ctrl_c().await?;
//!     client.stop();
//!     Ok(())
//! }
//! ```

pub use telemetry_link_core::*;

/// Live data client, transports and payloads.
pub mod live {
    pub use telemetry_link_net::live::*;
    pub use telemetry_link_net::transport::*;
    pub use telemetry_link_net::{NetworkError, Result};
}

/// Companion REST client.
#[cfg(feature = "companion")]
pub mod companion {
    pub use telemetry_link_net::companion::*;
}

pub mod prelude;
pub mod registry;
pub mod settings;

pub use registry::RegistryError;
pub use settings::{Settings, SettingsError};
