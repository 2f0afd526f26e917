//! Telemetry client for AirGradient monitors
//!
//! A [`TelemetrySource`] performs exactly one fetch of a device's
//! current-measures endpoint per call and returns either decoded
//! [`RawTelemetry`] or a network/decode error. Retrying is the poller's job.

pub mod http_client;

use crate::config::{DeviceConfig, DeviceKind, HttpConfig};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use url::Url;

pub use http_client::HttpTelemetryClient;

/// Decoded current-measures response
///
/// Every field is kept as raw JSON so that validation can report the exact
/// offending value. Unknown fields are ignored and JSON `null` reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTelemetry {
    pub pm01: Option<Value>,
    pub pm02: Option<Value>,
    pub pm10: Option<Value>,
    pub pm003_count: Option<Value>,
    pub atmp: Option<Value>,
    pub rhum: Option<Value>,
    pub rco2: Option<Value>,
    pub tvoc_index: Option<Value>,
    pub nox_index: Option<Value>,
    pub wifi: Option<Value>,
    pub location_id: Option<Value>,
    pub location_name: Option<Value>,
    pub serialno: Option<Value>,
    pub firmware_version: Option<Value>,
    pub timestamp: Option<Value>,
}

impl RawTelemetry {
    /// Decode a response body; anything but a JSON object is a decode error
    pub fn decode(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| BridgeError::decode(format!("Body is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Build telemetry from an already parsed JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(BridgeError::decode(format!(
                "Expected a JSON object, got {}",
                json_type_name(&value)
            )));
        }
        serde_json::from_value(value)
            .map_err(|e| BridgeError::decode(format!("Unexpected telemetry schema: {e}")))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Fully formed current-measures URL of one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Build the endpoint for a configured device
    pub fn for_device(device: &DeviceConfig, http: &HttpConfig) -> Result<Self> {
        match device.kind {
            DeviceKind::Cloud => {
                let token = device.token.as_deref().ok_or_else(|| {
                    BridgeError::config(format!("Cloud device {} has no token", device.key))
                })?;
                Self::cloud(&http.cloud_base_url, device.key.as_str(), token)
            }
            DeviceKind::Local => Self::local(
                &http.local_host_prefix,
                device.key.as_str(),
                device.hostname.as_deref(),
            ),
        }
    }

    /// `<base>/locations/<location_id>/measures/current?token=<token>`
    pub fn cloud(base: &Url, location_id: &str, token: &str) -> Result<Self> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| BridgeError::config(format!("Cloud URL {base} cannot be a base")))?
            .pop_if_empty()
            .extend(["locations", location_id, "measures", "current"]);
        url.set_query(None);
        url.query_pairs_mut().append_pair("token", token);
        Ok(Self { url })
    }

    /// `http://<prefix>_<serial>.local/measures/current`, or `http://<hostname>/measures/current`
    pub fn local(prefix: &str, serial: &str, hostname: Option<&str>) -> Result<Self> {
        let host = match hostname {
            Some(hostname) => hostname.to_string(),
            None => format!("{prefix}_{serial}.local"),
        };
        let url = Url::parse(&format!("http://{host}/measures/current"))
            .map_err(|e| BridgeError::config(format!("Invalid local host {host}: {e}")))?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Prints the URL with the token query value masked
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.url.query().is_none() {
            return write!(f, "{}", self.url);
        }
        let mut masked = self.url.clone();
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == "token" { "***".to_string() } else { v.into_owned() };
                (k.into_owned(), v)
            })
            .collect();
        masked.query_pairs_mut().clear().extend_pairs(pairs);
        write!(f, "{masked}")
    }
}

/// One-shot telemetry fetch
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Fetch the device's current measures; exactly one network attempt
    async fn fetch(&self, endpoint: &Endpoint) -> Result<RawTelemetry>;
}
