//! Core systems for Telemetry Link.
//!
//! This crate provides the foundational pieces shared by the networking and
//! umbrella crates:
//!
//! - **Signal/Slot System**: Type-safe subscriber sets with a strict
//!   "nothing after disconnect" guarantee
//! - **Errors**: Error types for signal misuse
//! - **Logging**: `tracing` target names used throughout the workspace
//!
//! # Signal/Slot Example
//!
//! ```
//! use telemetry_link_core::Signal;
//!
//! // Create a signal that notifies when a value changes
//! let value_changed = Signal::<i32>::new();
//!
//! // Connect a slot to handle the signal
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! // Emit the signal
//! value_changed.emit(42);
//!
//! // Disconnect when done
//! value_changed.disconnect(conn_id);
//! ```

mod error;
pub mod logging;
pub mod signal;

pub use error::SignalError;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
