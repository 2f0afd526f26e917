//! Host accessory platform seam
//!
//! The host owns accessory persistence and registration. The bridge asks it
//! for previously known accessories at startup and tells it when a device
//! is new, restored, or has changed its display data.

pub mod accessory_cache;

use crate::config::{DeviceConfig, DeviceKey, DeviceKind};
use crate::error::Result;
use crate::services::validator::DeviceMetadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use accessory_cache::FileAccessoryCache;

/// Host-side record of a device, persisted across restarts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAccessory {
    /// Identity token derived from the device key
    pub identity: Uuid,
    pub device_key: DeviceKey,
    pub display_name: String,
    #[serde(default)]
    pub kind: DeviceKind,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    pub registered_at: DateTime<Utc>,
}

impl CachedAccessory {
    /// Fresh accessory for a configured device
    pub fn for_device(device: &DeviceConfig) -> Self {
        Self {
            identity: device.key.identity_token(),
            device_key: device.key.clone(),
            display_name: device.default_display_name(),
            kind: device.kind,
            serial_number: None,
            firmware_version: None,
            registered_at: Utc::now(),
        }
    }

    /// Merge metadata reported by the device; returns true if anything changed
    pub fn absorb(&mut self, metadata: &DeviceMetadata) -> bool {
        let mut changed = false;
        if let Some(name) = &metadata.location_name {
            if &self.display_name != name {
                self.display_name = name.clone();
                changed = true;
            }
        }
        if metadata.serial_number.is_some() && self.serial_number != metadata.serial_number {
            self.serial_number = metadata.serial_number.clone();
            changed = true;
        }
        if metadata.firmware_version.is_some()
            && self.firmware_version != metadata.firmware_version
        {
            self.firmware_version = metadata.firmware_version.clone();
            changed = true;
        }
        changed
    }
}

/// Accessory registration collaborator
///
/// Hooks are awaited while a reconciliation is in progress. They may call back
/// into the registry (for example `configure_accessory`), but must not start
/// another reconciliation, which would wait for the current one forever.
#[async_trait]
pub trait AccessoryHost: Send + Sync {
    /// Accessories the host already knows from earlier runs
    async fn cached_accessories(&self) -> Result<Vec<CachedAccessory>>;

    /// A device seen for the first time
    async fn register_accessory(&self, accessory: &CachedAccessory) -> Result<()>;

    /// A previously cached device is active again
    async fn restore_accessory(&self, accessory: &CachedAccessory) -> Result<()>;

    /// Display name or device information changed
    async fn update_accessory(&self, accessory: &CachedAccessory) -> Result<()>;
}
