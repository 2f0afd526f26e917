//! Per-device polling loop
//!
//! Each [`DevicePoller`] owns one tokio task that cycles through
//! `Idle -> Fetching -> (Publishing | Retaining) -> Idle`. The first fetch
//! starts immediately; every later fetch starts one polling interval after
//! the previous cycle completed, whatever its outcome. A failed cycle never
//! touches the published state.

use crate::client::{Endpoint, RawTelemetry, TelemetrySource};
use crate::config::{DeviceKey, DeviceKind};
use crate::error::{BridgeError, FetchErrorKind};
use crate::services::classifier::{classify, ClassifiedState};
use crate::services::publication::PublicationSurface;
use crate::services::validator::{validate, FieldWarning};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

/// Poller state machine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PollerPhase {
    Idle,
    Fetching,
    Publishing,
    Retaining,
    Stopped,
}

/// Counters and last outcome of a poller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollerStats {
    pub successes: u64,
    pub failures: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_kind: Option<FetchErrorKind>,
    /// Field warnings of the latest successful cycle
    pub last_warnings: Vec<FieldWarning>,
}

impl PollerStats {
    /// Completed cycles, successful or not
    pub fn cycles(&self) -> u64 {
        self.successes + self.failures
    }
}

/// Handle to one device's polling task
#[derive(Debug)]
pub struct DevicePoller {
    key: DeviceKey,
    endpoint: Endpoint,
    interval: Duration,
    surface: PublicationSurface,
    phase: Arc<watch::Sender<PollerPhase>>,
    stats: Arc<watch::Sender<PollerStats>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DevicePoller {
    /// Start polling; the first fetch is issued immediately
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        key: DeviceKey,
        kind: DeviceKind,
        endpoint: Endpoint,
        interval: Duration,
        source: Arc<dyn TelemetrySource>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(None);
        let (phase, _) = watch::channel(PollerPhase::Idle);
        let (stats, _) = watch::channel(PollerStats::default());
        let (phase, stats) = (Arc::new(phase), Arc::new(stats));
        let cancel = CancellationToken::new();

        let poll_loop = PollLoop {
            key: key.clone(),
            endpoint: endpoint.clone(),
            interval,
            source,
            state: state_tx,
            phase: Arc::clone(&phase),
            stats: Arc::clone(&stats),
            cancel: cancel.clone(),
        };

        let span = tracing::info_span!("poller", device = %key);
        let task = tokio::spawn(poll_loop.run().instrument(span));

        info!(device = %key, %endpoint, ?interval, "Started device poller");

        Self {
            key,
            endpoint,
            interval,
            surface: PublicationSurface::new(kind, state_rx),
            phase,
            stats,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn key(&self) -> &DeviceKey {
        &self.key
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Getter surface over this poller's latest state
    pub fn surface(&self) -> PublicationSurface {
        self.surface.clone()
    }

    pub fn phase(&self) -> PollerPhase {
        *self.phase.borrow()
    }

    pub fn stats(&self) -> PollerStats {
        self.stats.borrow().clone()
    }

    /// Watch the stats; changes once per completed cycle
    pub fn subscribe_stats(&self) -> watch::Receiver<PollerStats> {
        self.stats.subscribe()
    }

    /// Wait until at least `cycles` poll cycles have completed
    pub async fn wait_for_cycles(&self, cycles: u64) {
        let mut rx = self.stats.subscribe();
        // The sender lives as long as `self`, so this only errors if we are being torn down.
        let _ = rx.wait_for(|stats| stats.cycles() >= cycles).await;
    }

    pub fn is_stopped(&self) -> bool {
        self.phase() == PollerPhase::Stopped
    }

    /// Cancel the pending timer, abandon an in-flight fetch and join the task
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(device = %self.key, "Poller task ended abnormally: {e}");
            }
            info!(device = %self.key, "Stopped device poller");
        }
        self.phase.send_replace(PollerPhase::Stopped);
    }
}

impl Drop for DevicePoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State owned by the spawned task
struct PollLoop {
    key: DeviceKey,
    endpoint: Endpoint,
    interval: Duration,
    source: Arc<dyn TelemetrySource>,
    state: watch::Sender<Option<Arc<ClassifiedState>>>,
    phase: Arc<watch::Sender<PollerPhase>>,
    stats: Arc<watch::Sender<PollerStats>>,
    cancel: CancellationToken,
}

impl PollLoop {
    async fn run(self) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.cycle() => {}
            }

            // Re-armed on every path out of the cycle.
            self.phase.send_replace(PollerPhase::Idle);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        self.phase.send_replace(PollerPhase::Stopped);
    }

    async fn cycle(&self) {
        self.phase.send_replace(PollerPhase::Fetching);

        let outcome = AssertUnwindSafe(self.source.fetch(&self.endpoint))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(anyhow::anyhow!("telemetry source panicked").into()));

        match outcome {
            Ok(raw) => self.publish(raw),
            Err(e) => self.retain(e),
        }
    }

    fn publish(&self, raw: RawTelemetry) {
        let validation = validate(&raw);
        for warning in &validation.warnings {
            if warning.is_missing() {
                debug!(device = %self.key, measure = %warning.measure, "{warning}");
            } else {
                warn!(device = %self.key, measure = %warning.measure, "{warning}");
            }
        }

        let state = classify(validation.reading, validation.metadata);
        debug!(
            device = %self.key,
            air_quality = ?state.air_quality,
            pm2_5 = ?state.reading.pm2_5,
            "Published new reading"
        );

        self.phase.send_replace(PollerPhase::Publishing);
        self.state.send_replace(Some(Arc::new(state)));
        self.stats.send_modify(|stats| {
            stats.successes += 1;
            stats.last_success_at = Some(Utc::now());
            stats.last_warnings = validation.warnings;
        });
    }

    fn retain(&self, e: BridgeError) {
        let kind = e.kind();
        error!(device = %self.key, %kind, "Error fetching data from AirGradient: {e}");

        self.phase.send_replace(PollerPhase::Retaining);
        self.stats.send_modify(|stats| {
            stats.failures += 1;
            stats.last_failure_at = Some(Utc::now());
            stats.last_error = Some(e.to_string());
            stats.last_error_kind = Some(kind);
        });
    }
}
