//! Configuration for the live data client.

use std::collections::HashMap;
use std::time::Duration;

/// Default delay before reconnecting after a close or transport error.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Default delay before retrying when a transport could not even be created.
pub const DEFAULT_CONNECT_FAILURE_DELAY: Duration = Duration::from_millis(5000);

/// Which failure a reconnect is recovering from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryCause {
    /// The transport closed or reported an error.
    ConnectionLost,
    /// The connector could not create a transport at all.
    ConnectFailed,
}

/// Configuration for automatic reconnection.
///
/// Delays are flat: every attempt waits the same amount of time. There is no
/// backoff growth and no jitter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Maximum number of consecutive failed attempts. `None` means infinite retries.
    pub max_attempts: Option<u32>,
    /// Delay after a close or transport error.
    pub delay: Duration,
    /// Delay after the connector failed to create a transport.
    pub connect_failure_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None, // Infinite retries by default
            delay: DEFAULT_RECONNECT_DELAY,
            connect_failure_delay: DEFAULT_CONNECT_FAILURE_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Create a new reconnect policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of consecutive failed attempts.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the delay used after a close or transport error.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the delay used after the connector failed outright.
    pub fn connect_failure_delay(mut self, delay: Duration) -> Self {
        self.connect_failure_delay = delay;
        self
    }

    /// Delay to wait before retrying after `cause`.
    pub fn delay_for(&self, cause: RetryCause) -> Duration {
        match cause {
            RetryCause::ConnectionLost => self.delay,
            RetryCause::ConnectFailed => self.connect_failure_delay,
        }
    }

    /// Whether `failed_attempts` consecutive failures exhaust this policy.
    pub fn is_exhausted(&self, failed_attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| failed_attempts >= max)
    }
}

/// Configuration for a [`LiveDataClient`](super::LiveDataClient).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveClientConfig {
    /// Custom headers to send during the handshake.
    pub headers: HashMap<String, String>,
    /// Auto-reconnect policy. If `None`, auto-reconnect is disabled.
    pub reconnect: Option<ReconnectPolicy>,
}

impl Default for LiveClientConfig {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            reconnect: Some(ReconnectPolicy::default()),
        }
    }
}

impl LiveClientConfig {
    /// Create a configuration with default reconnect behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a custom header for the handshake.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Use a custom reconnect policy.
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = Some(policy);
        self
    }

    /// Disable auto-reconnect.
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect = None;
        self
    }
}
