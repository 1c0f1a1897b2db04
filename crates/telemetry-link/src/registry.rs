//! Process-wide live data client.
//!
//! Most applications follow one feed. Install its client once with [`init`]
//! and fetch it from anywhere with [`instance`]. Components that can take the
//! client as a parameter should do so instead; [`LiveDataClient`] is a cheap
//! handle to clone and pass around.

use parking_lot::RwLock;
use telemetry_link_net::LiveDataClient;

static CLIENT: RwLock<Option<LiveDataClient>> = parking_lot::const_rwlock(None);

/// Errors from the client registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A client is already installed.
    #[error("live data client already initialized")]
    AlreadyInitialized,
    /// No client is installed.
    #[error("live data client not initialized; call registry::init() first")]
    NotInitialized,
}

/// Install the process-wide client.
///
/// Returns an error if a client is already installed. Call [`shutdown`]
/// first to replace it.
pub fn init(client: LiveDataClient) -> Result<LiveDataClient, RegistryError> {
    let mut slot = CLIENT.write();
    if slot.is_some() {
        return Err(RegistryError::AlreadyInitialized);
    }
    *slot = Some(client.clone());
    tracing::debug!(target: "telemetry_link::registry", "live data client installed");
    Ok(client)
}

/// Get the process-wide client.
pub fn instance() -> Result<LiveDataClient, RegistryError> {
    try_instance().ok_or(RegistryError::NotInitialized)
}

/// Get the process-wide client, or `None` if none is installed.
pub fn try_instance() -> Option<LiveDataClient> {
    CLIENT.read().clone()
}

/// Stop and remove the process-wide client.
///
/// Returns `false` if no client was installed.
pub fn shutdown() -> bool {
    // Released before stopping so subscribers may consult the registry.
    let client = CLIENT.write().take();
    match client {
        Some(client) => {
            client.stop();
            tracing::debug!(target: "telemetry_link::registry", "live data client removed");
            true
        }
        None => false,
    }
}
