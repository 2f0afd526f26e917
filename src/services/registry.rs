//! Device registry and accessory reconciliation
//!
//! Maps identity tokens to long-lived [`DeviceRecord`]s. Configured devices
//! are matched against accessories the host cached in earlier runs: a match
//! is restored, anything else is created and announced to the host. Each
//! identity token gets at most one poller per process.

use crate::client::{Endpoint, TelemetrySource};
use crate::config::{DeviceConfig, DeviceKey, HttpConfig};
use crate::error::Result;
use crate::host::{AccessoryHost, CachedAccessory};
use crate::services::poller::DevicePoller;
use crate::services::publication::PublicationSurface;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a configured device was bound during reconciliation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReconcileOutcome {
    /// Not cached before; registered with the host
    Created,
    /// Found in the host's cache; host-side state preserved
    Restored,
    /// Already bound to a poller in this process
    AlreadyActive,
}

/// A device bound to its poller
#[derive(Debug)]
pub struct DeviceRecord {
    identity: Uuid,
    config: DeviceConfig,
    accessory: RwLock<CachedAccessory>,
    poller: DevicePoller,
}

impl DeviceRecord {
    pub fn identity(&self) -> Uuid {
        self.identity
    }

    pub fn key(&self) -> &DeviceKey {
        &self.config.key
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn poller(&self) -> &DevicePoller {
        &self.poller
    }

    pub fn surface(&self) -> PublicationSurface {
        self.poller.surface()
    }

    /// Current host-side view of the device
    pub async fn accessory(&self) -> CachedAccessory {
        self.accessory.read().await.clone()
    }

    pub async fn display_name(&self) -> String {
        self.accessory.read().await.display_name.clone()
    }
}

/// Result of reconciling one configured device
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub record: Arc<DeviceRecord>,
    pub outcome: ReconcileOutcome,
}

#[derive(Default)]
struct RegistryState {
    /// Accessories pushed by the host and not yet claimed
    cached: HashMap<Uuid, CachedAccessory>,
    /// Devices bound to a poller
    active: HashMap<Uuid, Arc<DeviceRecord>>,
}

/// Registry of active devices
pub struct DeviceRegistry {
    host: Arc<dyn AccessoryHost>,
    source: Arc<dyn TelemetrySource>,
    http: HttpConfig,
    state: Mutex<RegistryState>,
    /// Serializes reconciliations; `state` is never held across host calls
    reconciling: Mutex<()>,
}

impl DeviceRegistry {
    pub fn new(
        host: Arc<dyn AccessoryHost>,
        source: Arc<dyn TelemetrySource>,
        http: HttpConfig,
    ) -> Self {
        Self {
            host,
            source,
            http,
            state: Mutex::new(RegistryState::default()),
            reconciling: Mutex::new(()),
        }
    }

    /// Accept an accessory the host restored from its cache
    ///
    /// Safe to call before or between reconciliations; no poller is created here.
    pub async fn configure_accessory(&self, accessory: CachedAccessory) {
        let mut state = self.state.lock().await;
        if state.active.contains_key(&accessory.identity) {
            debug!(device = %accessory.device_key, "Ignoring cached accessory that is already active");
            return;
        }
        debug!(device = %accessory.device_key, "Configuring cached accessory {}", accessory.display_name);
        state.cached.insert(accessory.identity, accessory);
    }

    /// Pull the host's cached accessories into the registry
    pub async fn load_cached(&self) -> Result<usize> {
        let cached = self.host.cached_accessories().await?;
        let count = cached.len();
        for accessory in cached {
            self.configure_accessory(accessory).await;
        }
        Ok(count)
    }

    /// Bind every configured device to exactly one poller
    pub async fn reconcile(
        &self,
        configs: &[DeviceConfig],
        cached: Vec<CachedAccessory>,
    ) -> Result<Vec<Reconciled>> {
        for accessory in cached {
            self.configure_accessory(accessory).await;
        }

        let _reconciling = self.reconciling.lock().await;
        let mut results = Vec::with_capacity(configs.len());
        let mut seen = HashSet::new();

        for config in configs {
            let identity = config.key.identity_token();
            let repeated = !seen.insert(identity);

            let (active, cached) = {
                let state = self.state.lock().await;
                (
                    state.active.get(&identity).cloned(),
                    state.cached.get(&identity).cloned(),
                )
            };

            if let Some(record) = active {
                if repeated {
                    warn!(device = %config.key, "Device is configured more than once");
                } else {
                    debug!(device = %config.key, "Device already has a poller");
                }
                results.push(Reconciled {
                    record,
                    outcome: ReconcileOutcome::AlreadyActive,
                });
                continue;
            }

            let endpoint = Endpoint::for_device(config, &self.http)?;

            // Host hooks run without the state lock so they may call back into the registry.
            let (accessory, outcome) = match cached {
                Some(mut accessory) => {
                    accessory.device_key = config.key.clone();
                    accessory.kind = config.kind;
                    self.host.restore_accessory(&accessory).await?;
                    info!(device = %config.key, "Restored {} from accessory cache", accessory.display_name);
                    (accessory, ReconcileOutcome::Restored)
                }
                None => {
                    let accessory = CachedAccessory::for_device(config);
                    self.host.register_accessory(&accessory).await?;
                    info!(device = %config.key, "Added new accessory {}", accessory.display_name);
                    (accessory, ReconcileOutcome::Created)
                }
            };

            let poller = DevicePoller::spawn(
                config.key.clone(),
                config.kind,
                endpoint,
                config.interval(),
                Arc::clone(&self.source),
            );

            let record = Arc::new(DeviceRecord {
                identity,
                config: config.clone(),
                accessory: RwLock::new(accessory),
                poller,
            });

            let mut state = self.state.lock().await;
            state.cached.remove(&identity);
            state.active.insert(identity, Arc::clone(&record));
            results.push(Reconciled { record, outcome });
        }

        Ok(results)
    }

    pub async fn record(&self, key: &DeviceKey) -> Option<Arc<DeviceRecord>> {
        let state = self.state.lock().await;
        state.active.get(&key.identity_token()).cloned()
    }

    /// Active records ordered by device key
    pub async fn records(&self) -> Vec<Arc<DeviceRecord>> {
        let state = self.state.lock().await;
        let mut records: Vec<_> = state.active.values().cloned().collect();
        records.sort_by(|a, b| a.key().cmp(b.key()));
        records
    }

    pub async fn active_count(&self) -> usize {
        self.state.lock().await.active.len()
    }

    /// Cached accessories no configured device has claimed
    pub async fn unclaimed_accessories(&self) -> Vec<CachedAccessory> {
        let state = self.state.lock().await;
        state.cached.values().cloned().collect()
    }

    /// Copy reported names and device info into the records, notifying the host of changes
    pub async fn refresh_display_names(&self) -> Result<usize> {
        let mut updated = 0;
        for record in self.records().await {
            let Some(snapshot) = record.surface().snapshot() else {
                continue;
            };

            let changed = {
                let mut accessory = record.accessory.write().await;
                if accessory.absorb(&snapshot.metadata) {
                    Some(accessory.clone())
                } else {
                    None
                }
            };

            if let Some(accessory) = changed {
                self.host.update_accessory(&accessory).await?;
                info!(device = %record.key(), "Display name is now {}", accessory.display_name);
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Stop every poller
    pub async fn shutdown(&self) {
        let records = self.records().await;
        for record in &records {
            record.poller().shutdown().await;
        }
        if !records.is_empty() {
            info!("Stopped {} device pollers", records.len());
        } else {
            warn!("Shutdown requested with no active devices");
        }
    }
}
