//! Poller behavior against a mock local monitor

use airgradient_bridge::client::{Endpoint, HttpTelemetryClient};
use airgradient_bridge::config::{DeviceKey, DeviceKind, HttpConfig};
use airgradient_bridge::services::{
    AirQuality, Co2Status, DevicePoller, Metric, PollerPhase, Unavailable,
};
use airgradient_bridge::FetchErrorKind;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::ResponseTemplate;

mod common;
use common::{current_measures, http_config, MockAirGradient};

async fn local_poller(mock: &MockAirGradient) -> DevicePoller {
    let client = HttpTelemetryClient::new(&http_config(mock)).unwrap();
    let endpoint =
        Endpoint::local("airgradient", "84fce612f5b8", Some(mock.local_hostname().as_str()))
            .unwrap();
    DevicePoller::spawn(
        DeviceKey::new("84fce612f5b8"),
        DeviceKind::Local,
        endpoint,
        Duration::from_millis(50),
        Arc::new(client),
    )
}

#[tokio::test]
async fn test_failed_fetch_retains_previous_state() {
    let mock = MockAirGradient::start().await;
    mock.mock_local(
        ResponseTemplate::new(200).set_body_json(json!({"pm02": 8, "pm10": 20})),
        Some(1),
    )
    .await;
    mock.mock_local(ResponseTemplate::new(503), Some(1)).await;
    mock.mock_local(
        ResponseTemplate::new(200).set_body_json(json!({"pm02": 40, "pm10": 45})),
        None,
    )
    .await;

    let poller = local_poller(&mock).await;
    let surface = poller.surface();

    poller.wait_for_cycles(1).await;
    assert_eq!(surface.pm2_5_density(), Ok(8.0));
    assert_eq!(surface.air_quality(), Ok(AirQuality::Excellent));

    poller.wait_for_cycles(2).await;
    let stats = poller.stats();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.last_error_kind, Some(FetchErrorKind::NetworkError));
    assert_eq!(surface.pm2_5_density(), Ok(8.0));
    assert_eq!(surface.pm10_density(), Ok(20.0));

    poller.wait_for_cycles(3).await;
    assert_eq!(surface.pm2_5_density(), Ok(40.0));
    assert_eq!(surface.pm10_density(), Ok(45.0));
    assert_eq!(surface.air_quality(), Ok(AirQuality::Fair));

    poller.shutdown().await;
}

#[tokio::test]
async fn test_local_device_publishes_all_metrics() {
    let mock = MockAirGradient::start().await;
    mock.mock_local_json(current_measures()).await;

    let poller = local_poller(&mock).await;
    let surface = poller.surface();
    poller.wait_for_cycles(1).await;

    assert_eq!(surface.metrics().len(), 9);
    assert_eq!(surface.voc_density(), Ok(50.0));
    assert_eq!(surface.nitrogen_dioxide_density(), Ok(5.0));
    assert_eq!(surface.current_temperature(), Ok(22.4));
    assert_eq!(surface.carbon_dioxide_level(), Ok(612.0));
    assert_eq!(surface.carbon_dioxide_detected(), Ok(Co2Status::Normal));
    assert_eq!(surface.current_relative_humidity(), Ok(41.0));

    let state = surface.snapshot().unwrap();
    assert_eq!(state.metadata.location_name.as_deref(), Some("Office"));
    assert_eq!(state.metadata.firmware_version.as_deref(), Some("3.1.3"));

    poller.shutdown().await;
}

#[tokio::test]
async fn test_high_co2_is_abnormal() {
    let mock = MockAirGradient::start().await;
    mock.mock_local_json(json!({"pm02": 3, "rco2": 1250})).await;

    let poller = local_poller(&mock).await;
    poller.wait_for_cycles(1).await;

    let surface = poller.surface();
    assert_eq!(surface.carbon_dioxide_detected(), Ok(Co2Status::Abnormal));
    assert_eq!(surface.current_value(Metric::CarbonDioxideDetected), Ok(1.0));
    assert_eq!(
        surface.current_temperature(),
        Err(Unavailable::MetricAbsent(Metric::CurrentTemperature))
    );

    poller.shutdown().await;
}

#[tokio::test]
async fn test_no_data_until_first_success() {
    let mock = MockAirGradient::start().await;
    mock.mock_local(ResponseTemplate::new(500), None).await;

    let poller = local_poller(&mock).await;
    poller.wait_for_cycles(2).await;

    let surface = poller.surface();
    assert!(!surface.has_data());
    assert_eq!(surface.air_quality(), Err(Unavailable::NoData));
    assert_eq!(surface.pm2_5_density(), Err(Unavailable::NoData));
    assert_eq!(poller.stats().successes, 0);

    poller.shutdown().await;
    let requests = mock.request_count().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(mock.request_count().await, requests);
}

#[tokio::test]
async fn test_shutdown_during_slow_response() {
    let mock = MockAirGradient::start().await;
    mock.mock_local(
        ResponseTemplate::new(200).set_body_json(json!({"pm02": 8})),
        Some(1),
    )
    .await;
    mock.mock_local(
        ResponseTemplate::new(200)
            .set_body_json(json!({"pm02": 90}))
            .set_delay(Duration::from_secs(5)),
        None,
    )
    .await;

    let http = HttpConfig {
        timeout: Duration::from_secs(30),
        ..http_config(&mock)
    };
    let client = HttpTelemetryClient::new(&http).unwrap();
    let endpoint =
        Endpoint::local("airgradient", "84fce612f5b8", Some(mock.local_hostname().as_str()))
            .unwrap();
    let poller = DevicePoller::spawn(
        DeviceKey::new("84fce612f5b8"),
        DeviceKind::Local,
        endpoint,
        Duration::from_millis(50),
        Arc::new(client),
    );

    poller.wait_for_cycles(1).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(poller.phase(), PollerPhase::Fetching);

    tokio::time::timeout(Duration::from_secs(1), poller.shutdown())
        .await
        .expect("shutdown must not wait for the slow response");
    assert_eq!(poller.phase(), PollerPhase::Stopped);
    assert_eq!(poller.stats().cycles(), 1);
    assert_eq!(poller.surface().pm2_5_density(), Ok(8.0));

    let requests = mock.request_count().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(mock.request_count().await, requests);
}
