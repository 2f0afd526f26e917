//! Configuration management for the AirGradient bridge
//!
//! Configuration is read once at startup from a TOML file and a handful of
//! environment overrides. Everything here is read-only after [`BridgeConfig::validate`].

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::{env, fmt, time::Duration};
use url::Url;
use uuid::Uuid;

/// Polling interval used when a device does not configure one
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(60_000);

/// Public AirGradient cloud API root
pub const DEFAULT_CLOUD_BASE_URL: &str = "https://api.airgradient.com/public/api/v1";

/// Prefix of the mDNS hostname AirGradient monitors announce on the local network
pub const DEFAULT_LOCAL_HOST_PREFIX: &str = "airgradient";

/// Namespace for identity tokens derived from device keys
const IDENTITY_NAMESPACE: Uuid = Uuid::from_u128(0x6ba7b812_9dad_11d1_80b4_00c04fd430c8);

/// Stable key of one physical device: a cloud location id or a hardware serial number
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceKey(String);

impl DeviceKey {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deterministic identity token used to correlate a device across restarts
    pub fn identity_token(&self) -> Uuid {
        Uuid::new_v5(&IDENTITY_NAMESPACE, self.0.as_bytes())
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Where a device's telemetry is fetched from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// AirGradient cloud API, keyed by location id
    #[default]
    Cloud,
    /// Monitor on the local network, keyed by serial number
    Local,
}

/// Per-device configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    /// Location id (cloud) or serial number (local)
    pub key: DeviceKey,

    /// Endpoint flavour
    #[serde(default)]
    pub kind: DeviceKind,

    /// Display name used until telemetry reports a location name
    #[serde(default)]
    pub name: Option<String>,

    /// Time between the end of one poll and the start of the next
    #[serde(default, with = "humantime_serde")]
    pub polling_interval: Option<Duration>,

    /// Cloud API token
    #[serde(default)]
    pub token: Option<String>,

    /// Hostname (optionally with port) overriding the mDNS name of a local monitor
    #[serde(default)]
    pub hostname: Option<String>,
}

impl DeviceConfig {
    /// Cloud device with the given location id and token
    pub fn cloud<K: Into<DeviceKey>, T: Into<String>>(key: K, token: T) -> Self {
        Self {
            key: key.into(),
            kind: DeviceKind::Cloud,
            name: None,
            polling_interval: None,
            token: Some(token.into()),
            hostname: None,
        }
    }

    /// Local-network device with the given serial number
    pub fn local<K: Into<DeviceKey>>(serial: K) -> Self {
        Self {
            key: serial.into(),
            kind: DeviceKind::Local,
            name: None,
            polling_interval: None,
            token: None,
            hostname: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = Some(interval);
        self
    }

    pub fn with_hostname<S: Into<String>>(mut self, hostname: S) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Effective polling interval
    pub fn interval(&self) -> Duration {
        self.polling_interval.unwrap_or(DEFAULT_POLLING_INTERVAL)
    }

    /// Name shown before any telemetry arrives
    pub fn default_display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("AirGradient {}", self.key))
    }
}

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    /// Devices to poll
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Accessory cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Root of the cloud API
    pub cloud_base_url: Url,

    /// Prefix for `<prefix>_<serial>.local` hostnames
    pub local_host_prefix: String,

    /// User agent sent with every request
    pub user_agent: String,
}

/// Accessory cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// JSON file holding known accessories
    pub path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of text
    pub json_format: bool,

    /// Optional log file (rotated daily)
    pub file: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            cloud_base_url: Url::parse(DEFAULT_CLOUD_BASE_URL)
                .expect("DEFAULT_CLOUD_BASE_URL is a valid absolute URL"),
            local_host_prefix: DEFAULT_LOCAL_HOST_PREFIX.to_string(),
            user_agent: format!("airgradient-bridge/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: base.join("airgradient-bridge").join("accessories.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file: None,
        }
    }
}

impl BridgeConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            BridgeError::config(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = env::var("AIRGRADIENT_CLOUD_URL") {
            self.http.cloud_base_url = url
                .parse()
                .map_err(|e| BridgeError::config(format!("Invalid AIRGRADIENT_CLOUD_URL: {e}")))?;
        }

        if let Ok(timeout) = env::var("AIRGRADIENT_TIMEOUT") {
            self.http.timeout = Duration::from_secs(timeout.parse().map_err(|e| {
                BridgeError::config(format!("Invalid AIRGRADIENT_TIMEOUT: {e}"))
            })?);
        }

        if let Ok(path) = env::var("AIRGRADIENT_CACHE_FILE") {
            self.cache.path = PathBuf::from(path);
        }

        if let Ok(level) = env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            return Err(BridgeError::config("At least one device must be configured"));
        }

        let scheme = self.http.cloud_base_url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(BridgeError::config(
                "Cloud base URL must use http or https scheme",
            ));
        }

        if self.http.timeout.is_zero() {
            return Err(BridgeError::config("Timeout must be greater than zero"));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.key.as_str().trim().is_empty() {
                return Err(BridgeError::config("Device key cannot be empty"));
            }
            if !seen.insert(&device.key) {
                return Err(BridgeError::config(format!(
                    "Device key {} is configured more than once",
                    device.key
                )));
            }
            if device.kind == DeviceKind::Cloud
                && device.token.as_deref().map_or(true, str::is_empty)
            {
                return Err(BridgeError::config(format!(
                    "Cloud device {} requires an API token",
                    device.key
                )));
            }
            if device.interval().is_zero() {
                return Err(BridgeError::config(format!(
                    "Polling interval of device {} must be greater than zero",
                    device.key
                )));
            }
        }

        Ok(())
    }
}
