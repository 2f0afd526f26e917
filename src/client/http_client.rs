//! HTTP telemetry client
//!
//! Fetches the current-measures endpoint of cloud or local AirGradient
//! monitors with a single GET per call.

use crate::client::{Endpoint, RawTelemetry, TelemetrySource};
use crate::config::HttpConfig;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use tracing::debug;

/// reqwest-backed [`TelemetrySource`]
#[derive(Debug, Clone)]
pub struct HttpTelemetryClient {
    client: Client,
}

impl HttpTelemetryClient {
    /// Create a new HTTP client
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| BridgeError::network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl TelemetrySource for HttpTelemetryClient {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<RawTelemetry> {
        debug!("GET {endpoint}");

        let response = self
            .client
            .get(endpoint.url().clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BridgeError::network(format!("Request to {endpoint} timed out"))
                } else if e.is_connect() {
                    BridgeError::network(format!("Cannot connect to {endpoint}"))
                } else {
                    BridgeError::network(format!("Request to {endpoint} failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::network(format!(
                "HTTP error {status} from {endpoint}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::network(format!("Failed to read response body: {e}")))?;

        debug!("Received {} bytes from {endpoint}", body.len());
        RawTelemetry::decode(&body)
    }
}
