//! AirGradient Bridge - Main Entry Point
//!
//! Loads the device list, restores known accessories, starts one poller per
//! device and logs the published values until interrupted.

use airgradient_bridge::{
    client::HttpTelemetryClient,
    config::BridgeConfig,
    host::FileAccessoryCache,
    logging::{init_logging, LogConfig},
    services::{DeviceRecord, DeviceRegistry, Unavailable},
    BridgeError, Result,
};

use clap::Parser;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// AirGradient bridge configuration
#[derive(Parser, Debug)]
#[command(name = "airgradient-bridge")]
#[command(about = "Poll AirGradient monitors and publish classified air-quality readings")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "AIRGRADIENT_CONFIG", default_value = "airgradient.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Accessory cache file (overrides the configuration)
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// How often to log published values
    #[arg(long, default_value = "5m", value_parser = humantime_serde::re::humantime::parse_duration)]
    status_interval: Duration,

    /// Poll every device once, print the published values as JSON and exit
    #[arg(long)]
    once: bool,
}

impl Cli {
    /// Validate command line arguments
    fn validate(&self) -> Result<()> {
        if self.status_interval.is_zero() {
            return Err(BridgeError::config(
                "Status interval must be greater than zero",
            ));
        }
        Ok(())
    }

    async fn load_config(&self) -> Result<BridgeConfig> {
        self.validate()?;
        let mut config = BridgeConfig::load(&self.config).await?;
        config.apply_env()?;
        if let Some(path) = &self.cache_file {
            config.cache.path = path.clone();
        }
        config.validate()?;
        Ok(config)
    }

    fn initialize_logging(&self, config: &BridgeConfig) -> Result<()> {
        let mut log_config = LogConfig::from_config(&config.logging);
        if self.debug {
            log_config = log_config.with_level(tracing::Level::DEBUG);
        }
        init_logging(log_config)
            .map_err(|e| BridgeError::config(format!("Failed to initialize logging: {e}")))
    }
}

/// JSON view of a device's published values
async fn device_status(record: &DeviceRecord) -> Value {
    let surface = record.surface();
    let mut values = Map::new();
    for metric in surface.metrics() {
        let value = match surface.current_value(*metric) {
            Ok(v) => json!(v),
            Err(Unavailable::NoData) => Value::Null,
            Err(e) => json!(e.to_string()),
        };
        values.insert(metric.to_string(), value);
    }

    json!({
        "key": record.key(),
        "identity": record.identity(),
        "name": record.display_name().await,
        "kind": surface.kind(),
        "phase": record.poller().phase(),
        "stats": record.poller().stats(),
        "values": values,
    })
}

async fn log_status(registry: &DeviceRegistry) {
    for record in registry.records().await {
        let surface = record.surface();
        let stats = record.poller().stats();
        match surface.snapshot() {
            Some(state) => info!(
                device = %record.key(),
                air_quality = ?state.air_quality,
                pm2_5 = ?state.reading.pm2_5,
                co2 = ?state.reading.co2,
                successes = stats.successes,
                failures = stats.failures,
                "{}",
                record.display_name().await
            ),
            None => warn!(
                device = %record.key(),
                failures = stats.failures,
                last_error = ?stats.last_error,
                "{} has not reported yet",
                record.display_name().await
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config().await?;
    cli.initialize_logging(&config)?;

    info!(
        "Starting AirGradient bridge v{} with {} devices",
        env!("CARGO_PKG_VERSION"),
        config.devices.len()
    );

    let host = Arc::new(FileAccessoryCache::open(&config.cache.path).await?);
    let source = Arc::new(HttpTelemetryClient::new(&config.http)?);
    let registry = DeviceRegistry::new(host, source, config.http.clone());

    let cached = registry.load_cached().await?;
    info!("Host knows {cached} accessories from earlier runs");

    let reconciled = registry.reconcile(&config.devices, Vec::new()).await?;
    for unclaimed in registry.unclaimed_accessories().await {
        warn!(
            device = %unclaimed.device_key,
            "Cached accessory {} is no longer configured",
            unclaimed.display_name
        );
    }

    if cli.once {
        for entry in &reconciled {
            entry.record.poller().wait_for_cycles(1).await;
        }
        if let Err(e) = registry.refresh_display_names().await {
            warn!("Failed to update accessory names: {e}");
        }

        let mut devices = Vec::with_capacity(reconciled.len());
        for record in registry.records().await {
            devices.push(device_status(&record).await);
        }
        println!("{}", serde_json::to_string_pretty(&devices)?);

        registry.shutdown().await;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(cli.status_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; skip it so pollers get a head start.
    ticker.tick().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for shutdown signal: {e}");
                }
                info!("Shutting down");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = registry.refresh_display_names().await {
                    warn!("Failed to update accessory names: {e}");
                }
                log_status(&registry).await;
            }
        }
    }

    registry.shutdown().await;
    Ok(())
}
