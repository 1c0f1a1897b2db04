//! Live data client with signal-based event delivery.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use telemetry_link_core::{ConnectionGuard, Signal};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::config::{LiveClientConfig, RetryCause};
use super::machine::{self, Effect, Input};
use super::payload::{DecodeError, TelemetryMessage};
use super::status::{ConnectionStatus, LiveEvent};
use crate::error::{NetworkError, Result};
use crate::transport::{
    ConnectRequest, Connector, Frame, Outbound, TransportEvent, WebSocketConnector,
};

/// Diagnostic counters for a client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Transports opened (initial connects plus reconnects).
    pub connection_attempts: u64,
    /// Frames received from current transports.
    pub frames_received: u64,
    /// Frames that decoded into a message.
    pub messages_decoded: u64,
    /// Frames dropped because they did not decode.
    pub decode_errors: u64,
    /// Reconnect timers armed.
    pub reconnects_scheduled: u64,
    /// The most recent decode failure.
    pub last_decode_error: Option<DecodeError>,
}

/// A subscriber registration returned by [`LiveDataClient::subscribe`].
///
/// Dropping the subscription unsubscribes. Once [`unsubscribe`](Self::unsubscribe)
/// returns (or the drop completes), the handler is never invoked again.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    guard: ConnectionGuard<LiveEvent>,
}

impl Subscription {
    /// Stop receiving notifications.
    ///
    /// Returns `false` if the client was already gone.
    pub fn unsubscribe(self) -> bool {
        self.guard.disconnect().is_ok()
    }

    /// Keep receiving notifications for the lifetime of the client.
    pub fn detach(self) {
        self.guard.detach();
    }
}

/// The transport the client currently owns.
struct ActiveTransport {
    generation: u64,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl ActiveTransport {
    fn close(self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

struct PendingRetry {
    generation: u64,
    task: JoinHandle<()>,
}

/// Mutable client state. Only touched while holding the state lock.
#[derive(Default)]
struct ClientState {
    status: ConnectionStatus,
    endpoint: Option<String>,
    /// Bumped on every transport open and on `stop()`. Events, timers and
    /// queued notifications tagged with an older generation are dropped.
    generation: u64,
    transport: Option<ActiveTransport>,
    retry: Option<PendingRetry>,
    latest: Option<Arc<TelemetryMessage>>,
    /// Reconnects since the last successful open.
    reconnect_attempts: u32,
    stats: ClientStats,
    runtime: Option<Handle>,
}

impl Drop for ClientState {
    fn drop(&mut self) {
        if let Some(retry) = self.retry.take() {
            retry.task.abort();
        }
    }
}

struct ClientShared {
    config: LiveClientConfig,
    connector: Arc<dyn Connector>,
    /// Serializes event handling, `start`, `stop` and notification delivery.
    /// Re-entrant so subscribers may call back into the client.
    dispatch: ReentrantMutex<()>,
    state: Mutex<ClientState>,
    events: Signal<LiveEvent>,
}

/// A live data client that keeps one streaming connection alive and
/// republishes what arrives on it.
///
/// The client manages a single transport at a time, decodes each inbound
/// frame into a [`TelemetryMessage`], and notifies subscribers of status
/// changes and new messages. Unexpected closes and transport errors are
/// retried after a flat delay until [`stop`](Self::stop) is called.
///
/// `LiveDataClient` is a cheap handle: clones share the same connection,
/// state and subscribers.
///
/// # Example
///
/// ```ignore
/// let client = LiveDataClient::new(LiveClientConfig::default());
///
/// let _subscription = client.subscribe(|event| match event {
///     LiveEvent::StatusChanged(status) => println!("status: {status}"),
///     LiveEvent::Message { message, .. } => println!("battery: {:?}", message.get("battery")),
/// });
///
/// client.start("ws://localhost:8000/ws")?;
/// ```
#[derive(Clone)]
pub struct LiveDataClient {
    shared: Arc<ClientShared>,
}

impl LiveDataClient {
    /// Create a client that connects over WebSocket.
    pub fn new(config: LiveClientConfig) -> Self {
        Self::with_connector(WebSocketConnector::new(), config)
    }

    /// Create a client that opens transports through `connector`.
    pub fn with_connector(connector: impl Connector, config: LiveClientConfig) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                config,
                connector: Arc::new(connector),
                dispatch: ReentrantMutex::new(()),
                state: Mutex::new(ClientState::default()),
                events: Signal::new(),
            }),
        }
    }

    /// Begin connecting to `endpoint_url`.
    ///
    /// A no-op if the client is already connecting or connected to the same
    /// URL. Otherwise any current transport and pending reconnect are dropped
    /// and a new connection attempt starts immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, endpoint_url: &str) -> Result<()> {
        validate_endpoint(endpoint_url)?;
        let runtime = Handle::try_current().map_err(|_| NetworkError::NoRuntime)?;
        let shared = &self.shared;

        let _dispatch = shared.dispatch.lock();
        let (events, generation) = {
            let mut st = shared.state.lock();
            if st.status.is_active() && st.endpoint.as_deref() == Some(endpoint_url) {
                tracing::debug!(
                    target: "telemetry_link::live",
                    url = endpoint_url,
                    status = %st.status,
                    "already started"
                );
                return Ok(());
            }

            tracing::info!(
                target: "telemetry_link::live",
                url = endpoint_url,
                "starting live data client"
            );
            st.endpoint = Some(endpoint_url.to_string());
            st.runtime = Some(runtime);
            st.reconnect_attempts = 0;

            let mut out = Vec::new();
            shared.apply(&mut st, Input::Start, &mut out);
            (out, st.generation)
        };
        shared.deliver(generation, events);
        Ok(())
    }

    /// Tear down the active transport and cancel any pending reconnect.
    ///
    /// Safe to call any number of times. When this returns, no notification
    /// originating from a transport opened before the call will be delivered.
    pub fn stop(&self) {
        let shared = &self.shared;

        let _dispatch = shared.dispatch.lock();
        let (events, generation) = {
            let mut st = shared.state.lock();
            st.generation += 1;
            if st.status != ConnectionStatus::Disconnected || st.retry.is_some() {
                tracing::info!(
                    target: "telemetry_link::live",
                    url = ?st.endpoint,
                    "stopping live data client"
                );
            }
            st.endpoint = None;

            let mut out = Vec::new();
            shared.apply(&mut st, Input::Stop, &mut out);
            (out, st.generation)
        };
        shared.deliver(generation, events);
    }

    /// Register a handler for status changes and decoded messages.
    ///
    /// Notifications arrive in the order the transport delivered them.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&LiveEvent) + Send + Sync + 'static,
    {
        Subscription {
            guard: self.shared.events.connect_scoped(handler),
        }
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.events.connection_count()
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.shared.state.lock().status
    }

    /// Check if the client is connected.
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// The most recently decoded message, if any.
    pub fn latest(&self) -> Option<Arc<TelemetryMessage>> {
        self.shared.state.lock().latest.clone()
    }

    /// The endpoint the client is targeting; `None` after `stop()`.
    pub fn endpoint(&self) -> Option<String> {
        self.shared.state.lock().endpoint.clone()
    }

    /// Whether a reconnect timer is currently armed.
    pub fn reconnect_pending(&self) -> bool {
        self.shared.state.lock().retry.is_some()
    }

    /// Snapshot of the diagnostic counters.
    pub fn stats(&self) -> ClientStats {
        self.shared.state.lock().stats.clone()
    }

    /// Serialize `message` as JSON text and send it on the open transport.
    ///
    /// Returns `Ok(false)` without sending when the connection is not open.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<bool> {
        let text = serde_json::to_string(message)?;
        let st = self.shared.state.lock();
        match (&st.transport, st.status) {
            (Some(transport), ConnectionStatus::Connected) => {
                Ok(transport.outbound.send(Outbound::Text(text)).is_ok())
            }
            _ => {
                tracing::trace!(
                    target: "telemetry_link::live",
                    status = %st.status,
                    "send skipped, not connected"
                );
                Ok(false)
            }
        }
    }
}

impl ClientShared {
    /// Feed one input through the state machine and perform its effects.
    fn apply(self: &Arc<Self>, st: &mut ClientState, input: Input, out: &mut Vec<LiveEvent>) {
        let Some(transition) = machine::transition(st.status, input) else {
            tracing::trace!(
                target: "telemetry_link::live",
                status = %st.status,
                ?input,
                "input ignored"
            );
            return;
        };

        Self::set_status(st, transition.next, out);

        for effect in transition.effects {
            match *effect {
                Effect::CloseTransport => {
                    if let Some(transport) = st.transport.take() {
                        transport.close();
                    }
                }
                Effect::CancelRetry => {
                    if let Some(retry) = st.retry.take() {
                        retry.task.abort();
                        tracing::debug!(
                            target: "telemetry_link::live",
                            "pending reconnect cancelled"
                        );
                    }
                }
                Effect::ResetAttempts => st.reconnect_attempts = 0,
                Effect::OpenTransport => self.open_transport(st, out),
                Effect::ScheduleRetry(cause) => self.schedule_retry(st, cause, out),
            }
        }
    }

    fn set_status(st: &mut ClientState, next: ConnectionStatus, out: &mut Vec<LiveEvent>) {
        if st.status != next {
            tracing::debug!(
                target: "telemetry_link::live",
                from = %st.status,
                to = %next,
                "status changed"
            );
            st.status = next;
            out.push(LiveEvent::StatusChanged(next));
        }
    }

    fn open_transport(self: &Arc<Self>, st: &mut ClientState, out: &mut Vec<LiveEvent>) {
        let (Some(url), Some(runtime)) = (st.endpoint.clone(), st.runtime.clone()) else {
            return;
        };

        st.generation += 1;
        st.stats.connection_attempts += 1;
        let generation = st.generation;

        let request = ConnectRequest {
            url,
            headers: self.config.headers.clone(),
        };

        match self.connector.open(&request) {
            Ok(handle) => {
                let (events, outbound) = handle.into_parts();
                st.transport = Some(ActiveTransport {
                    generation,
                    outbound,
                });
                self.spawn_pump(&runtime, generation, events);
            }
            Err(e) => {
                tracing::warn!(
                    target: "telemetry_link::live",
                    url = %request.url,
                    error = %e,
                    "could not open transport"
                );
                self.apply(st, Input::ConnectFailed, out);
            }
        }
    }

    fn spawn_pump(
        self: &Arc<Self>,
        runtime: &Handle,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let client: Weak<Self> = Arc::downgrade(self);
        runtime.spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(client) = client.upgrade() else {
                    return;
                };
                if !client.on_transport_event(generation, event) {
                    return;
                }
            }
            // Sender dropped without a close event.
            if let Some(client) = client.upgrade() {
                client.on_transport_event(generation, TransportEvent::Closed(None));
            }
        });
    }

    fn schedule_retry(
        self: &Arc<Self>,
        st: &mut ClientState,
        cause: RetryCause,
        out: &mut Vec<LiveEvent>,
    ) {
        let Some(policy) = self.config.reconnect.as_ref() else {
            tracing::debug!(target: "telemetry_link::live", "auto-reconnect disabled");
            return;
        };
        if st.retry.is_some() {
            tracing::trace!(target: "telemetry_link::live", "reconnect already pending");
            return;
        }
        if policy.is_exhausted(st.reconnect_attempts) {
            tracing::warn!(
                target: "telemetry_link::live",
                attempts = st.reconnect_attempts,
                "reconnect attempts exhausted, giving up"
            );
            if let Some(transport) = st.transport.take() {
                transport.close();
            }
            Self::set_status(st, ConnectionStatus::Disconnected, out);
            return;
        }
        let Some(runtime) = st.runtime.clone() else {
            return;
        };

        let delay = policy.delay_for(cause);
        let generation = st.generation;
        st.stats.reconnects_scheduled += 1;
        tracing::info!(
            target: "telemetry_link::live",
            delay_ms = delay.as_millis() as u64,
            ?cause,
            attempt = st.reconnect_attempts + 1,
            "scheduling reconnect"
        );

        let client: Weak<Self> = Arc::downgrade(self);
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(client) = client.upgrade() {
                client.on_retry_elapsed(generation);
            }
        });
        st.retry = Some(PendingRetry { generation, task });
    }

    /// Handle one event from the transport tagged `generation`.
    ///
    /// Returns `false` once the pump for that transport should exit.
    fn on_transport_event(self: &Arc<Self>, generation: u64, event: TransportEvent) -> bool {
        let _dispatch = self.dispatch.lock();
        let is_close = matches!(event, TransportEvent::Closed(_));

        let (events, current) = {
            let mut st = self.state.lock();
            if st.transport.as_ref().map(|t| t.generation) != Some(generation) {
                tracing::trace!(
                    target: "telemetry_link::live",
                    generation,
                    "ignoring event from stale transport"
                );
                return false;
            }

            let mut out = Vec::new();
            match event {
                TransportEvent::Opened => {
                    tracing::info!(target: "telemetry_link::live", url = ?st.endpoint, "connected");
                    self.apply(&mut st, Input::Opened, &mut out);
                }
                TransportEvent::Frame(frame) => Self::handle_frame(&mut st, &frame, &mut out),
                TransportEvent::Error(message) => {
                    tracing::warn!(
                        target: "telemetry_link::live",
                        error = %message,
                        "transport error"
                    );
                    self.apply(&mut st, Input::TransportError, &mut out);
                }
                TransportEvent::Closed(info) => {
                    tracing::info!(
                        target: "telemetry_link::live",
                        close = ?info,
                        "transport closed"
                    );
                    self.apply(&mut st, Input::TransportClosed, &mut out);
                }
            }
            (out, st.generation)
        };

        self.deliver(current, events);
        !is_close
    }

    fn handle_frame(st: &mut ClientState, frame: &Frame, out: &mut Vec<LiveEvent>) {
        st.stats.frames_received += 1;
        if st.status != ConnectionStatus::Connected {
            tracing::trace!(
                target: "telemetry_link::live",
                status = %st.status,
                "dropping frame received while not connected"
            );
            return;
        }

        match TelemetryMessage::decode_frame(frame) {
            Ok(message) => {
                let message = Arc::new(message);
                tracing::trace!(
                    target: "telemetry_link::live",
                    fields = message.len(),
                    "message decoded"
                );
                st.latest = Some(message.clone());
                st.stats.messages_decoded += 1;
                out.push(LiveEvent::Message {
                    status: ConnectionStatus::Connected,
                    message,
                });
            }
            Err(e) => {
                tracing::warn!(
                    target: "telemetry_link::live",
                    error = %e,
                    "dropping undecodable frame"
                );
                st.stats.decode_errors += 1;
                st.stats.last_decode_error = Some(e);
            }
        }
    }

    fn on_retry_elapsed(self: &Arc<Self>, generation: u64) {
        let _dispatch = self.dispatch.lock();
        let (events, current) = {
            let mut st = self.state.lock();
            match &st.retry {
                Some(retry) if retry.generation == generation => {}
                _ => return,
            }
            st.retry = None;
            st.reconnect_attempts += 1;

            let mut out = Vec::new();
            self.apply(&mut st, Input::RetryElapsed, &mut out);
            (out, st.generation)
        };
        self.deliver(current, events);
    }

    /// Emit queued notifications, stopping as soon as a subscriber's call to
    /// `stop()`/`start()` supersedes them.
    fn deliver(&self, generation: u64, events: Vec<LiveEvent>) {
        for event in events {
            if self.state.lock().generation != generation {
                tracing::trace!(
                    target: "telemetry_link::live",
                    "dropping superseded notifications"
                );
                break;
            }
            self.events.emit(event);
        }
    }
}

impl std::fmt::Debug for LiveDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.shared.state.lock();
        f.debug_struct("LiveDataClient")
            .field("endpoint", &st.endpoint)
            .field("status", &st.status)
            .field("reconnect_pending", &st.retry.is_some())
            .finish()
    }
}

/// Check that `endpoint_url` is a `ws://` or `wss://` URL.
fn validate_endpoint(endpoint_url: &str) -> Result<()> {
    let url = url::Url::parse(endpoint_url)?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(NetworkError::InvalidUrl(format!(
            "unsupported scheme '{other}' in {endpoint_url}, expected ws or wss"
        ))),
    }
}
