//! Pull-based read surface of a device
//!
//! Getters are synchronous and never block on a poll: they read the last
//! whole [`ClassifiedState`] the poller published. Staleness is unbounded;
//! a device that never completed a successful poll reports
//! [`Unavailable::NoData`] instead of a default value.

use crate::config::DeviceKind;
use crate::services::classifier::{AirQuality, ClassifiedState, Co2Status};
use crate::services::validator::Measure;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Values published per device, named after their HomeKit characteristics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Metric {
    AirQuality,
    Pm2_5Density,
    Pm10Density,
    VocDensity,
    NitrogenDioxideDensity,
    CurrentTemperature,
    CarbonDioxideDetected,
    CarbonDioxideLevel,
    CurrentRelativeHumidity,
}

const CLOUD_METRICS: &[Metric] = &[
    Metric::AirQuality,
    Metric::Pm2_5Density,
    Metric::Pm10Density,
    Metric::VocDensity,
    Metric::NitrogenDioxideDensity,
];

const LOCAL_METRICS: &[Metric] = &[
    Metric::AirQuality,
    Metric::Pm2_5Density,
    Metric::Pm10Density,
    Metric::VocDensity,
    Metric::NitrogenDioxideDensity,
    Metric::CurrentTemperature,
    Metric::CarbonDioxideDetected,
    Metric::CarbonDioxideLevel,
    Metric::CurrentRelativeHumidity,
];

impl Metric {
    /// Metrics a device of this kind publishes
    pub fn exposed_by(kind: DeviceKind) -> &'static [Metric] {
        match kind {
            DeviceKind::Cloud => CLOUD_METRICS,
            DeviceKind::Local => LOCAL_METRICS,
        }
    }

    /// Validated measure this metric is read from or derived from
    pub fn source(self) -> Measure {
        match self {
            Metric::AirQuality | Metric::Pm2_5Density => Measure::Pm2_5,
            Metric::Pm10Density => Measure::Pm10,
            Metric::VocDensity => Measure::TvocIndex,
            Metric::NitrogenDioxideDensity => Measure::NoxIndex,
            Metric::CurrentTemperature => Measure::Temperature,
            Metric::CarbonDioxideDetected | Metric::CarbonDioxideLevel => Measure::Co2,
            Metric::CurrentRelativeHumidity => Measure::RelativeHumidity,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a getter has no value
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// No poll of this device has succeeded yet
    #[error("no data available yet")]
    NoData,

    /// The latest successful poll did not carry a valid value for this metric
    #[error("{0} is absent from the latest reading")]
    MetricAbsent(Metric),

    /// This kind of device does not publish the metric
    #[error("{0} is not published by this device")]
    NotExposed(Metric),
}

/// Latest-value getters of one device
#[derive(Debug, Clone)]
pub struct PublicationSurface {
    kind: DeviceKind,
    state: watch::Receiver<Option<Arc<ClassifiedState>>>,
}

impl PublicationSurface {
    pub(crate) fn new(kind: DeviceKind, state: watch::Receiver<Option<Arc<ClassifiedState>>>) -> Self {
        Self { kind, state }
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Metrics this surface answers for
    pub fn metrics(&self) -> &'static [Metric] {
        Metric::exposed_by(self.kind)
    }

    /// The whole latest state, if any poll has succeeded
    pub fn snapshot(&self) -> Option<Arc<ClassifiedState>> {
        self.state.borrow().clone()
    }

    pub fn has_data(&self) -> bool {
        self.state.borrow().is_some()
    }

    fn exposed(&self, metric: Metric) -> Result<Arc<ClassifiedState>, Unavailable> {
        if !self.metrics().contains(&metric) {
            return Err(Unavailable::NotExposed(metric));
        }
        self.snapshot().ok_or(Unavailable::NoData)
    }

    fn measure(&self, metric: Metric) -> Result<f64, Unavailable> {
        let state = self.exposed(metric)?;
        state
            .reading
            .get(metric.source())
            .ok_or(Unavailable::MetricAbsent(metric))
    }

    pub fn air_quality(&self) -> Result<AirQuality, Unavailable> {
        let state = self.exposed(Metric::AirQuality)?;
        state
            .air_quality
            .ok_or(Unavailable::MetricAbsent(Metric::AirQuality))
    }

    pub fn pm2_5_density(&self) -> Result<f64, Unavailable> {
        self.measure(Metric::Pm2_5Density)
    }

    pub fn pm10_density(&self) -> Result<f64, Unavailable> {
        self.measure(Metric::Pm10Density)
    }

    /// TVOC index
    pub fn voc_density(&self) -> Result<f64, Unavailable> {
        self.measure(Metric::VocDensity)
    }

    /// NOx index
    pub fn nitrogen_dioxide_density(&self) -> Result<f64, Unavailable> {
        self.measure(Metric::NitrogenDioxideDensity)
    }

    pub fn current_temperature(&self) -> Result<f64, Unavailable> {
        self.measure(Metric::CurrentTemperature)
    }

    pub fn carbon_dioxide_detected(&self) -> Result<Co2Status, Unavailable> {
        let state = self.exposed(Metric::CarbonDioxideDetected)?;
        state
            .co2
            .ok_or(Unavailable::MetricAbsent(Metric::CarbonDioxideDetected))
    }

    pub fn carbon_dioxide_level(&self) -> Result<f64, Unavailable> {
        self.measure(Metric::CarbonDioxideLevel)
    }

    pub fn current_relative_humidity(&self) -> Result<f64, Unavailable> {
        self.measure(Metric::CurrentRelativeHumidity)
    }

    /// Numeric value of any metric; categories use their HomeKit codes
    pub fn current_value(&self, metric: Metric) -> Result<f64, Unavailable> {
        match metric {
            Metric::AirQuality => self.air_quality().map(|q| f64::from(q.code())),
            Metric::CarbonDioxideDetected => {
                self.carbon_dioxide_detected().map(|c| f64::from(c.code()))
            }
            other => self.measure(other),
        }
    }
}
