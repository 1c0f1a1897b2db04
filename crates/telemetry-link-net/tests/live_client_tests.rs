//! Live data client tests.
//!
//! These drive the client through an in-memory connector so every transport
//! event is scripted, and use tokio's paused clock for reconnect timing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use telemetry_link_net::live::{
    ConnectionStatus, LiveClientConfig, LiveDataClient, LiveEvent, ReconnectPolicy, Subscription,
};
use telemetry_link_net::{
    CloseInfo, ConnectRequest, Connector, Frame, NetworkError, Outbound, Result, TransportEndpoint,
    TransportEvent, TransportHandle,
};

const URL: &str = "ws://localhost:8000/ws";

#[derive(Default)]
struct FakeState {
    requests: Vec<ConnectRequest>,
    endpoints: Vec<Option<TransportEndpoint>>,
    failures_remaining: usize,
}

/// Connector that hands out in-memory transports the test controls.
#[derive(Clone, Default)]
struct FakeConnector {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConnector {
    fn failing(times: usize) -> Self {
        let fake = Self::default();
        fake.state.lock().failures_remaining = times;
        fake
    }

    fn open_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    fn transport_count(&self) -> usize {
        self.state.lock().endpoints.len()
    }

    fn requests(&self) -> Vec<ConnectRequest> {
        self.state.lock().requests.clone()
    }

    fn emit(&self, transport: usize, event: TransportEvent) {
        let state = self.state.lock();
        if let Some(endpoint) = &state.endpoints[transport] {
            let _ = endpoint.events.send(event);
        }
    }

    fn text(&self, transport: usize, text: &str) {
        self.emit(transport, TransportEvent::Frame(Frame::Text(text.to_string())));
    }

    fn drop_transport(&self, transport: usize) {
        self.state.lock().endpoints[transport] = None;
    }

    fn outbound(&self, transport: usize) -> Vec<Outbound> {
        let mut state = self.state.lock();
        let mut commands = Vec::new();
        if let Some(endpoint) = state.endpoints[transport].as_mut() {
            while let Ok(command) = endpoint.outbound.try_recv() {
                commands.push(command);
            }
        }
        commands
    }
}

impl Connector for FakeConnector {
    fn open(&self, request: &ConnectRequest) -> Result<TransportHandle> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(NetworkError::Connection("connection refused".into()));
        }
        let (handle, endpoint) = TransportHandle::channel();
        state.endpoints.push(Some(endpoint));
        Ok(handle)
    }
}

fn client_with(fake: &FakeConnector, config: LiveClientConfig) -> LiveDataClient {
    LiveDataClient::with_connector(fake.clone(), config)
}

fn record(client: &LiveDataClient) -> (Subscription, Arc<Mutex<Vec<LiveEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    let subscription = client.subscribe(move |event| events_clone.lock().push(event.clone()));
    (subscription, events)
}

fn statuses(events: &Mutex<Vec<LiveEvent>>) -> Vec<ConnectionStatus> {
    events
        .lock()
        .iter()
        .filter_map(|event| match event {
            LiveEvent::StatusChanged(status) => Some(*status),
            LiveEvent::Message { .. } => None,
        })
        .collect()
}

fn messages(events: &Mutex<Vec<LiveEvent>>) -> Vec<serde_json::Value> {
    events
        .lock()
        .iter()
        .filter_map(|event| event.message().map(|m| m.as_ref().clone().into_value()))
        .collect()
}

/// Let spawned tasks drain their channels without advancing the clock.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

async fn advance(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn test_stream_scenario_with_reconnect() {
    let fake = FakeConnector::default();
    let client = client_with(&fake, LiveClientConfig::default());
    let (_sub, events) = record(&client);

    client.start(URL).unwrap();
    assert_eq!(client.status(), ConnectionStatus::Connecting);

    fake.emit(0, TransportEvent::Opened);
    settle().await;
    assert_eq!(client.status(), ConnectionStatus::Connected);

    fake.text(0, r#"{"battery":80}"#);
    settle().await;
    assert_eq!(client.latest().unwrap().get("battery"), Some(&json!(80)));

    fake.text(0, "{bad");
    settle().await;
    assert_eq!(client.latest().unwrap().get("battery"), Some(&json!(80)));
    assert_eq!(client.status(), ConnectionStatus::Connected);
    assert_eq!(client.stats().decode_errors, 1);

    fake.emit(0, TransportEvent::Closed(Some(CloseInfo {
        code: 1006,
        reason: String::new(),
    })));
    settle().await;
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert!(client.reconnect_pending());

    advance(2999).await;
    assert_eq!(fake.transport_count(), 1);

    advance(1).await;
    assert_eq!(client.status(), ConnectionStatus::Connecting);
    assert_eq!(fake.transport_count(), 2);

    assert_eq!(
        statuses(&events),
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting,
        ]
    );
    assert_eq!(messages(&events), vec![json!({"battery": 80})]);

    // Message notifications carry the connected status.
    let message_status = events
        .lock()
        .iter()
        .find(|event| event.message().is_some())
        .map(LiveEvent::status);
    assert_eq!(message_status, Some(ConnectionStatus::Connected));

    client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_latest_tracks_every_valid_frame() {
    let fake = FakeConnector::default();
    let client = client_with(&fake, LiveClientConfig::default());

    client.start(URL).unwrap();
    fake.emit(0, TransportEvent::Opened);
    fake.text(0, r#"{"speed":10}"#);
    fake.text(0, "[1,2,3]");
    fake.text(0, r#"{"speed":20,"gear":3}"#);
    fake.emit(0, TransportEvent::Frame(Frame::Binary(br#"{"speed":30}"#.to_vec())));
    settle().await;

    let latest = client.latest().unwrap();
    assert_eq!(latest.get("speed"), Some(&json!(30)));
    assert!(!latest.contains_key("gear"));

    let stats = client.stats();
    assert_eq!(stats.frames_received, 4);
    assert_eq!(stats.messages_decoded, 3);
    assert_eq!(stats.decode_errors, 1);
    assert!(stats.last_decode_error.is_some());

    client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_then_start_ignores_old_transport() {
    let fake = FakeConnector::default();
    let client = client_with(&fake, LiveClientConfig::default());

    client.start(URL).unwrap();
    fake.emit(0, TransportEvent::Opened);
    settle().await;

    client.stop();
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert!(client.endpoint().is_none());
    assert_eq!(fake.outbound(0), vec![Outbound::Close]);

    client.start(URL).unwrap();
    let (_sub, events) = record(&client);

    // The stopped transport keeps talking; none of it may surface.
    fake.text(0, r#"{"stale":true}"#);
    fake.emit(0, TransportEvent::Closed(None));
    settle().await;

    assert!(events.lock().is_empty());
    assert!(client.latest().is_none());
    assert_eq!(client.status(), ConnectionStatus::Connecting);
    assert!(!client.reconnect_pending());

    fake.emit(1, TransportEvent::Opened);
    fake.text(1, r#"{"fresh":true}"#);
    settle().await;

    assert_eq!(statuses(&events), vec![ConnectionStatus::Connected]);
    assert_eq!(messages(&events), vec![json!({"fresh": true})]);

    client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_reconnect() {
    let fake = FakeConnector::default();
    let client = client_with(&fake, LiveClientConfig::default());

    client.start(URL).unwrap();
    fake.emit(0, TransportEvent::Opened);
    fake.emit(0, TransportEvent::Closed(None));
    settle().await;
    assert!(client.reconnect_pending());

    client.stop();
    client.stop();
    assert!(!client.reconnect_pending());

    advance(10_000).await;
    assert_eq!(fake.open_count(), 1);
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_error_then_close_schedules_one_reconnect() {
    let fake = FakeConnector::default();
    let client = client_with(&fake, LiveClientConfig::default());

    client.start(URL).unwrap();
    fake.emit(0, TransportEvent::Opened);
    fake.emit(0, TransportEvent::Error("connection reset".into()));
    settle().await;
    assert_eq!(client.status(), ConnectionStatus::Error);

    fake.emit(0, TransportEvent::Closed(None));
    settle().await;
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert_eq!(client.stats().reconnects_scheduled, 1);

    advance(3000).await;
    assert_eq!(fake.open_count(), 2);
    assert_eq!(client.status(), ConnectionStatus::Connecting);

    client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_dropped_transport_counts_as_close() {
    let fake = FakeConnector::default();
    let client = client_with(&fake, LiveClientConfig::default());

    client.start(URL).unwrap();
    fake.emit(0, TransportEvent::Opened);
    settle().await;

    fake.drop_transport(0);
    settle().await;
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert!(client.reconnect_pending());

    client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_uses_longer_delay() {
    let fake = FakeConnector::failing(1);
    let client = client_with(&fake, LiveClientConfig::default());
    let (_sub, events) = record(&client);

    client.start(URL).unwrap();
    settle().await;
    assert_eq!(client.status(), ConnectionStatus::Error);
    assert_eq!(
        statuses(&events),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Error]
    );

    advance(4999).await;
    assert_eq!(fake.open_count(), 1);

    advance(1).await;
    assert_eq!(fake.open_count(), 2);
    assert_eq!(client.status(), ConnectionStatus::Connecting);

    client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_max_attempts_gives_up() {
    let fake = FakeConnector::failing(usize::MAX);
    let config = LiveClientConfig::new().reconnect_policy(
        ReconnectPolicy::new()
            .max_attempts(2)
            .connect_failure_delay(Duration::from_millis(100)),
    );
    let client = client_with(&fake, config);

    client.start(URL).unwrap();
    settle().await;
    advance(100).await;
    advance(100).await;
    assert_eq!(fake.open_count(), 3);
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert!(!client.reconnect_pending());

    advance(10_000).await;
    assert_eq!(fake.open_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_without_reconnect() {
    let fake = FakeConnector::default();
    let client = client_with(&fake, LiveClientConfig::new().without_reconnect());

    client.start(URL).unwrap();
    fake.emit(0, TransportEvent::Opened);
    fake.emit(0, TransportEvent::Closed(None));
    settle().await;

    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert!(!client.reconnect_pending());
    advance(10_000).await;
    assert_eq!(fake.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_receive_in_order_until_unsubscribed() {
    let fake = FakeConnector::default();
    let client = client_with(&fake, LiveClientConfig::default());
    let (first, first_events) = record(&client);
    let (_second, second_events) = record(&client);
    assert_eq!(client.subscriber_count(), 2);

    client.start(URL).unwrap();
    fake.emit(0, TransportEvent::Opened);
    fake.text(0, r#"{"n":1}"#);
    fake.text(0, r#"{"n":2}"#);
    settle().await;

    assert_eq!(*first_events.lock(), *second_events.lock());
    assert_eq!(messages(&first_events), vec![json!({"n": 1}), json!({"n": 2})]);

    assert!(first.unsubscribe());
    assert_eq!(client.subscriber_count(), 1);

    fake.text(0, r#"{"n":3}"#);
    settle().await;

    assert_eq!(messages(&first_events).len(), 2);
    assert_eq!(messages(&second_events).len(), 3);

    client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_detached_subscriber_keeps_receiving() {
    let fake = FakeConnector::default();
    let client = client_with(&fake, LiveClientConfig::default());
    let (subscription, events) = record(&client);
    subscription.detach();
    assert_eq!(client.subscriber_count(), 1);

    client.start(URL).unwrap();
    fake.emit(0, TransportEvent::Opened);
    fake.text(0, r#"{"n":1}"#);
    settle().await;

    assert_eq!(
        statuses(&events),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]
    );
    assert_eq!(messages(&events), vec![json!({"n": 1})]);

    client.stop();
    assert_eq!(client.subscriber_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_from_callback_drops_rest_of_batch() {
    let fake = FakeConnector::failing(1);
    let client = client_with(&fake, LiveClientConfig::default());
    let (_sub, events) = record(&client);

    let stopped = Arc::new(AtomicBool::new(false));
    let stopper = client.clone();
    let stopped_clone = stopped.clone();
    let _stop_sub = client.subscribe(move |event| {
        if *event == LiveEvent::StatusChanged(ConnectionStatus::Connecting)
            && !stopped_clone.swap(true, Ordering::SeqCst)
        {
            stopper.stop();
        }
    });

    // Start fails synchronously: Connecting and Error are queued together.
    client.start(URL).unwrap();

    assert!(stopped.load(Ordering::SeqCst));
    assert_eq!(
        statuses(&events),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Disconnected]
    );
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert!(!client.reconnect_pending());
}

#[tokio::test(start_paused = true)]
async fn test_start_same_url_is_noop() {
    let fake = FakeConnector::default();
    let client = client_with(&fake, LiveClientConfig::default());
    let (_sub, events) = record(&client);

    client.start(URL).unwrap();
    client.start(URL).unwrap();
    fake.emit(0, TransportEvent::Opened);
    settle().await;
    client.start(URL).unwrap();

    assert_eq!(fake.open_count(), 1);
    assert_eq!(
        statuses(&events),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]
    );

    client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_start_new_url_replaces_transport() {
    let fake = FakeConnector::default();
    let client = client_with(&fake, LiveClientConfig::default());

    client.start(URL).unwrap();
    fake.emit(0, TransportEvent::Opened);
    settle().await;

    client.start("ws://localhost:9000/ws").unwrap();
    assert_eq!(fake.open_count(), 2);
    assert_eq!(fake.outbound(0), vec![Outbound::Close]);
    assert_eq!(client.endpoint().as_deref(), Some("ws://localhost:9000/ws"));
    assert_eq!(fake.requests()[1].url, "ws://localhost:9000/ws");

    fake.text(0, r#"{"old":true}"#);
    settle().await;
    assert!(client.latest().is_none());

    client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_invalid_url_leaves_client_untouched() {
    let fake = FakeConnector::default();
    let client = client_with(&fake, LiveClientConfig::default());

    let err = client.start("http://localhost:8000/ws").unwrap_err();
    assert!(matches!(err, NetworkError::InvalidUrl(_)));
    assert!(matches!(
        client.start("not a url"),
        Err(NetworkError::InvalidUrl(_))
    ));

    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert_eq!(fake.open_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_send_only_when_connected() {
    let fake = FakeConnector::default();
    let config = LiveClientConfig::new().header("X-Dashboard", "fleet");
    let client = client_with(&fake, config);

    assert_eq!(client.send(&json!({"cmd": "ping"})), Ok(false));

    client.start(URL).unwrap();
    assert_eq!(client.send(&json!({"cmd": "ping"})), Ok(false));
    assert_eq!(
        fake.requests()[0].headers.get("X-Dashboard"),
        Some(&"fleet".to_string())
    );

    fake.emit(0, TransportEvent::Opened);
    settle().await;
    assert_eq!(client.send(&json!({"cmd": "ping"})), Ok(true));
    assert_eq!(
        fake.outbound(0),
        vec![Outbound::Text(r#"{"cmd":"ping"}"#.to_string())]
    );

    client.stop();
    assert_eq!(client.send(&json!({"cmd": "ping"})), Ok(false));
}

/// Spawn a thread that pushes `count` frames into transport 0.
fn flood(fake: &FakeConnector, count: usize) -> std::thread::JoinHandle<()> {
    let fake = fake.clone();
    std::thread::spawn(move || {
        for n in 0..count {
            fake.text(0, &format!(r#"{{"n":{n}}}"#));
        }
    })
}

async fn wait_until_received(received: &AtomicUsize) {
    while received.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_on_other_thread_ends_notifications() {
    for _ in 0..100 {
        let fake = FakeConnector::default();
        let client = client_with(&fake, LiveClientConfig::new().without_reconnect());

        let stopped = Arc::new(AtomicBool::new(false));
        let received = Arc::new(AtomicUsize::new(0));
        let late = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let (stopped, received, late) = (stopped.clone(), received.clone(), late.clone());
            client.subscribe(move |event| {
                if event.message().is_some() {
                    received.fetch_add(1, Ordering::SeqCst);
                    if stopped.load(Ordering::SeqCst) {
                        late.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        };

        client.start(URL).unwrap();
        fake.emit(0, TransportEvent::Opened);
        let flooder = flood(&fake, 200);
        wait_until_received(&received).await;

        let stopper = client.clone();
        let stopped_clone = stopped.clone();
        tokio::task::spawn_blocking(move || {
            stopper.stop();
            stopped_clone.store(true, Ordering::SeqCst);
        })
        .await
        .unwrap();

        flooder.join().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(late.load(Ordering::SeqCst), 0);
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unsubscribe_on_other_thread_ends_notifications() {
    for _ in 0..100 {
        let fake = FakeConnector::default();
        let client = client_with(&fake, LiveClientConfig::new().without_reconnect());

        let unsubscribed = Arc::new(AtomicBool::new(false));
        let received = Arc::new(AtomicUsize::new(0));
        let late = Arc::new(AtomicUsize::new(0));
        let subscription = {
            let (unsubscribed, received, late) =
                (unsubscribed.clone(), received.clone(), late.clone());
            client.subscribe(move |event| {
                if event.message().is_some() {
                    received.fetch_add(1, Ordering::SeqCst);
                    if unsubscribed.load(Ordering::SeqCst) {
                        late.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        };
        let (_other, other_events) = record(&client);

        client.start(URL).unwrap();
        fake.emit(0, TransportEvent::Opened);
        let flooder = flood(&fake, 200);
        wait_until_received(&received).await;

        let unsubscribed_clone = unsubscribed.clone();
        let removed = tokio::task::spawn_blocking(move || {
            let removed = subscription.unsubscribe();
            unsubscribed_clone.store(true, Ordering::SeqCst);
            removed
        })
        .await
        .unwrap();
        assert!(removed);

        flooder.join().unwrap();
        // The remaining subscriber sees the whole flood.
        tokio::time::timeout(Duration::from_secs(5), async {
            while messages(&other_events).len() < 200 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(late.load(Ordering::SeqCst), 0);

        client.stop();
    }
}
