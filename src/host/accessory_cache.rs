//! File-backed accessory host
//!
//! Keeps known accessories in memory and mirrors them to a pretty-printed
//! JSON file after every change, so identities and display names survive
//! restarts.

use crate::error::{BridgeError, Result};
use crate::host::{AccessoryHost, CachedAccessory};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Accessory host persisting to a JSON file
#[derive(Debug)]
pub struct FileAccessoryCache {
    path: PathBuf,
    accessories: RwLock<HashMap<Uuid, CachedAccessory>>,
}

impl FileAccessoryCache {
    /// Open the cache, loading existing entries if the file exists
    ///
    /// A corrupt file is logged and treated as empty; it is overwritten on the next save.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let accessories = match Self::load(&path).await {
            Ok(loaded) => loaded,
            Err(BridgeError::Json(e)) => {
                warn!("Ignoring unreadable accessory cache {}: {e}", path.display());
                HashMap::new()
            }
            Err(e) => return Err(e),
        };

        info!(
            "Loaded {} cached accessories from {}",
            accessories.len(),
            path.display()
        );

        Ok(Self {
            path,
            accessories: RwLock::new(accessories),
        })
    }

    async fn load(path: &Path) -> Result<HashMap<Uuid, CachedAccessory>> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(HashMap::new());
        }
        let contents = tokio::fs::read_to_string(path).await?;
        let list: Vec<CachedAccessory> = serde_json::from_str(&contents)?;
        Ok(list.into_iter().map(|a| (a.identity, a)).collect())
    }

    async fn save(&self, accessories: &HashMap<Uuid, CachedAccessory>) -> Result<()> {
        let mut list: Vec<&CachedAccessory> = accessories.values().collect();
        list.sort_by(|a, b| a.device_key.cmp(&b.device_key));
        let serialized = serde_json::to_string_pretty(&list)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serialized).await?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            BridgeError::cache(format!("Cannot replace {}: {e}", self.path.display()))
        })?;

        debug!("Saved {} accessories to {}", list.len(), self.path.display());
        Ok(())
    }

    async fn upsert(&self, accessory: &CachedAccessory) -> Result<()> {
        let mut accessories = self.accessories.write().await;
        accessories.insert(accessory.identity, accessory.clone());
        self.save(&accessories).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.accessories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accessories.read().await.is_empty()
    }

    pub async fn get(&self, identity: &Uuid) -> Option<CachedAccessory> {
        self.accessories.read().await.get(identity).cloned()
    }
}

#[async_trait]
impl AccessoryHost for FileAccessoryCache {
    async fn cached_accessories(&self) -> Result<Vec<CachedAccessory>> {
        Ok(self.accessories.read().await.values().cloned().collect())
    }

    async fn register_accessory(&self, accessory: &CachedAccessory) -> Result<()> {
        info!(
            device = %accessory.device_key,
            "Registering new accessory {}",
            accessory.display_name
        );
        self.upsert(accessory).await
    }

    async fn restore_accessory(&self, accessory: &CachedAccessory) -> Result<()> {
        info!(
            device = %accessory.device_key,
            "Restoring accessory {} from cache",
            accessory.display_name
        );
        self.upsert(accessory).await
    }

    async fn update_accessory(&self, accessory: &CachedAccessory) -> Result<()> {
        debug!(device = %accessory.device_key, "Updating accessory {}", accessory.display_name);
        self.upsert(accessory).await
    }
}
