//! AirGradient bridge
//!
//! Polls AirGradient air-quality monitors over HTTP, either through the
//! AirGradient cloud API or directly on the local network, validates and
//! classifies each reading, and exposes the latest values to a home
//! automation host.
//!
//! # Features
//!
//! - One independent polling task per device with a configurable interval
//! - Field-level validation that keeps partial readings usable
//! - PM2.5 air-quality category and CO2 abnormal-level detection
//! - Last-known-good retention across network and decode failures
//! - Stable accessory identities persisted across restarts

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod services;

// Test support modules - available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use config::{BridgeConfig, DeviceConfig, DeviceKey, DeviceKind};
pub use error::{BridgeError, FetchErrorKind, Result};
pub use services::{DeviceRegistry, PublicationSurface};
