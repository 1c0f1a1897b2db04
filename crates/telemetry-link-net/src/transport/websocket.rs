//! WebSocket transport built on `tokio-tungstenite`.

use futures_util::{SinkExt, StreamExt};
use telemetry_link_core::logging::span_names;
use tokio::runtime::Handle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::Instrument;

use super::{
    CloseInfo, ConnectRequest, Connector, Frame, Outbound, TransportEndpoint, TransportEvent,
    TransportHandle,
};
use crate::error::{NetworkError, Result};

/// Opens WebSocket transports (`ws://` and `wss://`).
///
/// Each opened transport runs as one task on the current tokio runtime. The
/// task performs the handshake, pumps frames to the client and outbound
/// commands to the socket, and reports a final [`TransportEvent::Closed`].
/// It never reconnects on its own; that is the client's job.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a new connector.
    pub fn new() -> Self {
        Self
    }

    /// Build the WebSocket request with custom headers.
    fn build_request(request: &ConnectRequest) -> Result<Request> {
        let mut ws_request = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| NetworkError::WebSocket(e.to_string()))?;

        let headers = ws_request.headers_mut();
        for (name, value) in &request.headers {
            let header_name = http::header::HeaderName::try_from(name.as_str())?;
            let header_value = http::header::HeaderValue::try_from(value.as_str())?;
            headers.insert(header_name, header_value);
        }

        Ok(ws_request)
    }
}

impl Connector for WebSocketConnector {
    fn open(&self, request: &ConnectRequest) -> Result<TransportHandle> {
        let runtime = Handle::try_current().map_err(|_| NetworkError::NoRuntime)?;
        let ws_request = Self::build_request(request)?;
        let (handle, endpoint) = TransportHandle::channel();

        let span = tracing::debug_span!(
            target: "telemetry_link::transport",
            span_names::SOCKET_SESSION,
            url = %request.url
        );
        runtime.spawn(run_session(ws_request, endpoint).instrument(span));
        Ok(handle)
    }
}

/// Drive one socket from handshake to close.
async fn run_session(request: Request, endpoint: TransportEndpoint) {
    let TransportEndpoint { events, mut outbound } = endpoint;

    let ws_stream = match tokio_tungstenite::connect_async(request).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            tracing::warn!(target: "telemetry_link::transport", error = %e, "handshake failed");
            let _ = events.send(TransportEvent::Error(e.to_string()));
            let _ = events.send(TransportEvent::Closed(None));
            return;
        }
    };

    tracing::debug!(target: "telemetry_link::transport", "socket open");
    if events.send(TransportEvent::Opened).is_err() {
        // Client already let go of this transport.
        return;
    }

    let (mut write, mut read) = ws_stream.split();
    let mut close_info = None;

    loop {
        tokio::select! {
            cmd = outbound.recv() => {
                match cmd {
                    Some(Outbound::Text(text)) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            tracing::warn!(
                                target: "telemetry_link::transport",
                                error = %e,
                                "send failed"
                            );
                            let _ = events.send(TransportEvent::Error(e.to_string()));
                            break;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        };
                        let _ = write.send(Message::Close(Some(frame))).await;
                        tracing::debug!(target: "telemetry_link::transport", "closed by client");
                        break;
                    }
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::trace!(
                            target: "telemetry_link::transport",
                            len = text.len(),
                            "text frame"
                        );
                        let frame = Frame::Text(text.as_str().to_owned());
                        if events.send(TransportEvent::Frame(frame)).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::trace!(
                            target: "telemetry_link::transport",
                            len = data.len(),
                            "binary frame"
                        );
                        let frame = Frame::Binary(data.to_vec());
                        if events.send(TransportEvent::Frame(frame)).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // Pong is sent automatically by tungstenite
                    }
                    Some(Ok(Message::Close(frame))) => {
                        close_info = frame.map(|f| CloseInfo {
                            code: u16::from(f.code),
                            reason: f.reason.as_str().to_owned(),
                        });
                        tracing::debug!(
                            target: "telemetry_link::transport",
                            ?close_info,
                            "closed by server"
                        );
                        break;
                    }
                    Some(Ok(Message::Frame(_))) => {
                        // Raw frame, ignore
                    }
                    Some(Err(e)) => {
                        tracing::warn!(
                            target: "telemetry_link::transport",
                            error = %e,
                            "read failed"
                        );
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                    None => {
                        tracing::debug!(target: "telemetry_link::transport", "stream ended");
                        break;
                    }
                }
            }
        }
    }

    let _ = events.send(TransportEvent::Closed(close_info));
}
