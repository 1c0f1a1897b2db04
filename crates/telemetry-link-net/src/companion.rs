//! Companion REST client.
//!
//! Telemetry backends usually pair the live stream with a handful of JSON
//! endpoints for device metadata and one-off diagnostics. [`CompanionClient`]
//! is a thin wrapper over `reqwest` for those endpoints. Response bodies are
//! returned as opaque [`serde_json::Value`]s or deserialized into caller types.
//!
//! # Example
//!
//! ```ignore
//! use telemetry_link_net::companion::CompanionClient;
//!
//! let api = CompanionClient::builder("http://localhost:8000").build()?;
//! let info = api.device_info().await?;
//! println!("model: {:?}", info["model"]);
//! ```

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{NetworkError, Result};

/// Default base URL of the companion API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Readiness checks made by [`CompanionClient::wait_until_ready`] by default.
pub const DEFAULT_READY_ATTEMPTS: u32 = 30;

/// Pause between readiness checks by default.
pub const DEFAULT_READY_INTERVAL: Duration = Duration::from_secs(1);

/// Timeout for a single readiness check.
const READY_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for [`CompanionClient`].
#[derive(Debug)]
pub struct CompanionClientBuilder {
    base_url: String,
    timeout: Option<Duration>,
    user_agent: String,
    default_headers: http::HeaderMap,
}

impl CompanionClientBuilder {
    /// Create a builder for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Some(DEFAULT_TIMEOUT),
            user_agent: format!("TelemetryLink/{} (Rust)", env!("CARGO_PKG_VERSION")),
            default_headers: http::HeaderMap::new(),
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disable request timeout.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a header sent with every request.
    pub fn default_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self> {
        let name = http::header::HeaderName::from_bytes(name.as_ref().as_bytes())?;
        let value = http::header::HeaderValue::from_str(value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Build the client.
    pub fn build(self) -> Result<CompanionClient> {
        let base_url = normalize_base_url(&self.base_url)?;

        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .default_headers(self.default_headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| NetworkError::Request(e.to_string()))?;

        Ok(CompanionClient { http, base_url })
    }
}

/// JSON client for the companion REST API.
#[derive(Clone, Debug)]
pub struct CompanionClient {
    http: reqwest::Client,
    base_url: String,
}

impl CompanionClient {
    /// Create a client with default settings.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder(base_url).build()
    }

    /// Create a builder.
    pub fn builder(base_url: impl Into<String>) -> CompanionClientBuilder {
        CompanionClientBuilder::new(base_url)
    }

    /// The normalized base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join `path` onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET path` and deserialize the JSON response.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        tracing::debug!(target: "telemetry_link::companion", %url, "GET");
        let response = self.http.get(&url).send().await?;
        Self::read_json(response).await
    }

    /// `POST path` with an optional JSON body and deserialize the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        tracing::debug!(target: "telemetry_link::companion", %url, "POST");
        let mut request = self.http.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        Self::read_json(response).await
    }

    /// Static device description (`GET /api/device-info`).
    pub async fn device_info(&self) -> Result<Value> {
        self.get_json("/api/device-info").await
    }

    /// Live device description (`GET /api/dynamic/device-info`).
    pub async fn dynamic_device_info(&self) -> Result<Value> {
        self.get_json("/api/dynamic/device-info").await
    }

    /// Detected hardware (`GET /api/device-detection`).
    pub async fn device_detection(&self) -> Result<Value> {
        self.get_json("/api/device-detection").await
    }

    /// Capability flags (`GET /api/device-capabilities`).
    pub async fn device_capabilities(&self) -> Result<Value> {
        self.get_json("/api/device-capabilities").await
    }

    /// System analysis report (`GET /api/system-analysis`).
    pub async fn system_analysis(&self) -> Result<Value> {
        self.get_json("/api/system-analysis").await
    }

    /// Health analysis report (`GET /api/health-analysis`).
    pub async fn health_analysis(&self) -> Result<Value> {
        self.get_json("/api/health-analysis").await
    }

    /// Current monitoring mode (`GET /api/monitoring-mode`).
    pub async fn monitoring_mode(&self) -> Result<Value> {
        self.get_json("/api/monitoring-mode").await
    }

    /// Run a stress test (`POST /api/device-stress-test`).
    pub async fn device_stress_test(&self, options: Option<&Value>) -> Result<Value> {
        self.post_json("/api/device-stress-test", options).await
    }

    /// Run the host stress test with server defaults (`GET /api/stress-test`).
    pub async fn stress_test(&self) -> Result<Value> {
        self.get_json("/api/stress-test").await
    }

    /// Ask the backend to begin streaming (`POST /startup`).
    pub async fn startup(&self) -> Result<Value> {
        self.post_json::<Value, _>("/startup", None).await
    }

    /// Ask the backend to launch its bundled dashboard (`POST /api/start-frontend`).
    pub async fn start_frontend(&self) -> Result<Value> {
        self.post_json::<Value, _>("/api/start-frontend", None).await
    }

    /// Wait for the backend to answer readiness checks.
    ///
    /// Checks `GET /api/dynamic/device-info` once. If that fails, sends
    /// `POST /startup` and then checks up to `max_attempts` more times,
    /// `interval` apart. Failures of the startup request are ignored.
    pub async fn wait_until_ready(&self, max_attempts: u32, interval: Duration) -> Result<()> {
        if self.is_ready().await {
            return Ok(());
        }

        tracing::info!(
            target: "telemetry_link::companion",
            "backend not ready, requesting startup"
        );
        let startup = self.http.post(self.url("/startup")).send().await;
        if let Err(e) = startup {
            tracing::debug!(
                target: "telemetry_link::companion",
                error = %e,
                "startup request failed"
            );
        }

        for attempt in 1..=max_attempts {
            tokio::time::sleep(interval).await;
            if self.is_ready().await {
                tracing::info!(target: "telemetry_link::companion", attempt, "backend ready");
                return Ok(());
            }
            tracing::debug!(target: "telemetry_link::companion", attempt, "backend not ready");
        }

        tracing::warn!(
            target: "telemetry_link::companion",
            attempts = max_attempts,
            "backend did not become ready"
        );
        Err(NetworkError::NotReady {
            attempts: max_attempts,
        })
    }

    /// One readiness check: any 2xx from the device-info endpoint.
    async fn is_ready(&self) -> bool {
        let response = self
            .http
            .get(self.url("/api/dynamic/device-info"))
            .timeout(READY_CHECK_TIMEOUT)
            .send()
            .await;
        matches!(response, Ok(response) if response.status().is_success())
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                target: "telemetry_link::companion",
                status = status.as_u16(),
                "request failed"
            );
            return Err(NetworkError::HttpStatus {
                status: status.as_u16(),
                message: (!body.is_empty()).then_some(body),
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn normalize_base_url(base_url: &str) -> Result<String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let url = url::Url::parse(trimmed)?;
    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(NetworkError::InvalidUrl(format!(
            "unsupported scheme '{other}' in {base_url}, expected http or https"
        ))),
    }
}
