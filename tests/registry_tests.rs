//! Registry reconciliation with cached and new accessories

use airgradient_bridge::config::{DeviceConfig, HttpConfig};
use airgradient_bridge::host::{AccessoryHost, CachedAccessory, FileAccessoryCache};
use airgradient_bridge::mock::{RecordingHost, ScriptedSource};
use airgradient_bridge::services::{DeviceRegistry, ReconcileOutcome};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn source() -> Arc<ScriptedSource> {
    Arc::new(ScriptedSource::repeating(json!({"pm02": 10, "pm10": 12})))
}

#[tokio::test(start_paused = true)]
async fn test_one_restored_one_created() {
    let cached_device = DeviceConfig::local("aaaaaa");
    let new_device = DeviceConfig::cloud("424242", "token");
    let cached = CachedAccessory::for_device(&cached_device);

    let host = Arc::new(RecordingHost::default());
    let source = source();
    let registry = DeviceRegistry::new(host.clone(), source.clone(), HttpConfig::default());

    let configs = vec![cached_device.clone(), new_device.clone()];
    let results = registry.reconcile(&configs, vec![cached.clone()]).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].outcome, ReconcileOutcome::Restored);
    assert_eq!(results[0].record.identity(), cached.identity);
    assert_eq!(results[1].outcome, ReconcileOutcome::Created);
    assert_eq!(results[1].record.identity(), new_device.key.identity_token());

    assert_eq!(host.registered().len(), 1);
    assert_eq!(host.registered()[0].device_key, new_device.key);
    assert_eq!(host.restored().len(), 1);
    assert_eq!(registry.active_count().await, 2);

    // Same inputs again: nothing new is created or registered
    let again = registry.reconcile(&configs, vec![cached]).await.unwrap();
    assert!(again
        .iter()
        .all(|r| r.outcome == ReconcileOutcome::AlreadyActive));
    assert!(Arc::ptr_eq(&again[0].record, &results[0].record));
    assert!(Arc::ptr_eq(&again[1].record, &results[1].record));
    assert_eq!(registry.active_count().await, 2);
    assert_eq!(host.registered().len(), 1);

    // Two pollers, one immediate fetch each
    for result in &results {
        result.record.poller().wait_for_cycles(1).await;
    }
    assert_eq!(source.calls(), 2);

    registry.shutdown().await;
    assert!(results.iter().all(|r| r.record.poller().is_stopped()));
}

#[tokio::test(start_paused = true)]
async fn test_load_cached_from_host() {
    let device = DeviceConfig::local("bbbbbb");
    let mut cached = CachedAccessory::for_device(&device);
    cached.display_name = "Nursery".to_string();

    let host = Arc::new(RecordingHost::with_cached(vec![cached]));
    let registry = DeviceRegistry::new(host.clone(), source(), HttpConfig::default());

    assert_eq!(registry.load_cached().await.unwrap(), 1);
    let results = registry.reconcile(&[device], Vec::new()).await.unwrap();

    assert_eq!(results[0].outcome, ReconcileOutcome::Restored);
    assert_eq!(results[0].record.display_name().await, "Nursery");
    assert!(host.registered().is_empty());

    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_registration_failure_creates_no_poller() {
    let host = Arc::new(RecordingHost::default());
    host.fail_registrations(true);
    let source = source();
    let registry = DeviceRegistry::new(host.clone(), source.clone(), HttpConfig::default());

    let device = DeviceConfig::local("cccccc");
    assert!(registry.reconcile(&[device.clone()], Vec::new()).await.is_err());
    assert_eq!(registry.active_count().await, 0);

    host.fail_registrations(false);
    let results = registry.reconcile(&[device], Vec::new()).await.unwrap();
    assert_eq!(results[0].outcome, ReconcileOutcome::Created);

    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unclaimed_accessories_are_reported() {
    let stale = CachedAccessory::for_device(&DeviceConfig::local("old"));
    let host = Arc::new(RecordingHost::default());
    let registry = DeviceRegistry::new(host, source(), HttpConfig::default());

    registry
        .reconcile(&[DeviceConfig::local("new")], vec![stale.clone()])
        .await
        .unwrap();

    assert_eq!(registry.unclaimed_accessories().await, vec![stale]);
    registry.shutdown().await;
}

#[tokio::test]
async fn test_file_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accessories.json");
    let device = DeviceConfig::local("84fce612f5b8");

    {
        let host = Arc::new(FileAccessoryCache::open(&path).await.unwrap());
        let registry = DeviceRegistry::new(host.clone(), source(), HttpConfig::default());
        let results = registry.reconcile(&[device.clone()], Vec::new()).await.unwrap();
        assert_eq!(results[0].outcome, ReconcileOutcome::Created);
        registry.shutdown().await;
    }

    let host = Arc::new(FileAccessoryCache::open(&path).await.unwrap());
    assert_eq!(host.cached_accessories().await.unwrap().len(), 1);

    let registry = DeviceRegistry::new(host.clone(), source(), HttpConfig::default());
    registry.load_cached().await.unwrap();
    let results = registry.reconcile(&[device], Vec::new()).await.unwrap();
    assert_eq!(results[0].outcome, ReconcileOutcome::Restored);
    assert_eq!(host.len().await, 1);

    registry.shutdown().await;
}
