//! Common test utilities

#![allow(dead_code, unused_imports)]

pub mod airgradient_mock;

pub use airgradient_mock::{current_measures, MockAirGradient};

use airgradient_bridge::config::HttpConfig;
use std::time::Duration;

/// HTTP settings pointing at a mock server, with a short timeout
pub fn http_config(mock: &MockAirGradient) -> HttpConfig {
    HttpConfig {
        timeout: Duration::from_millis(500),
        cloud_base_url: mock.cloud_base_url(),
        ..HttpConfig::default()
    }
}
