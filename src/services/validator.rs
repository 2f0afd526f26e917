//! Per-field validation of raw telemetry
//!
//! A tracked measure is accepted only when its raw value is a JSON number
//! with a finite `f64` representation. Anything else leaves the measure
//! absent and records a [`FieldWarning`]. Validation never fails as a whole.

use crate::client::RawTelemetry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Measures tracked from the current-measures payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Measure {
    Pm2_5,
    Pm10,
    TvocIndex,
    NoxIndex,
    Temperature,
    Co2,
    RelativeHumidity,
}

impl Measure {
    pub const ALL: [Measure; 7] = [
        Measure::Pm2_5,
        Measure::Pm10,
        Measure::TvocIndex,
        Measure::NoxIndex,
        Measure::Temperature,
        Measure::Co2,
        Measure::RelativeHumidity,
    ];

    /// Field name in the AirGradient payload
    pub fn field_name(self) -> &'static str {
        match self {
            Measure::Pm2_5 => "pm02",
            Measure::Pm10 => "pm10",
            Measure::TvocIndex => "tvocIndex",
            Measure::NoxIndex => "noxIndex",
            Measure::Temperature => "atmp",
            Measure::Co2 => "rco2",
            Measure::RelativeHumidity => "rhum",
        }
    }

    fn raw_value(self, raw: &RawTelemetry) -> Option<&Value> {
        match self {
            Measure::Pm2_5 => raw.pm02.as_ref(),
            Measure::Pm10 => raw.pm10.as_ref(),
            Measure::TvocIndex => raw.tvoc_index.as_ref(),
            Measure::NoxIndex => raw.nox_index.as_ref(),
            Measure::Temperature => raw.atmp.as_ref(),
            Measure::Co2 => raw.rco2.as_ref(),
            Measure::RelativeHumidity => raw.rhum.as_ref(),
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Sanitized numeric snapshot; `None` means absent or invalid this cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatedReading {
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub tvoc_index: Option<f64>,
    pub nox_index: Option<f64>,
    pub temperature: Option<f64>,
    pub co2: Option<f64>,
    pub relative_humidity: Option<f64>,
}

impl ValidatedReading {
    pub fn get(&self, measure: Measure) -> Option<f64> {
        match measure {
            Measure::Pm2_5 => self.pm2_5,
            Measure::Pm10 => self.pm10,
            Measure::TvocIndex => self.tvoc_index,
            Measure::NoxIndex => self.nox_index,
            Measure::Temperature => self.temperature,
            Measure::Co2 => self.co2,
            Measure::RelativeHumidity => self.relative_humidity,
        }
    }

    fn slot(&mut self, measure: Measure) -> &mut Option<f64> {
        match measure {
            Measure::Pm2_5 => &mut self.pm2_5,
            Measure::Pm10 => &mut self.pm10,
            Measure::TvocIndex => &mut self.tvoc_index,
            Measure::NoxIndex => &mut self.nox_index,
            Measure::Temperature => &mut self.temperature,
            Measure::Co2 => &mut self.co2,
            Measure::RelativeHumidity => &mut self.relative_humidity,
        }
    }
}

/// Identity and housekeeping fields reported alongside the measures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub wifi_rssi: Option<i64>,
}

/// A measure that was missing or not a finite number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWarning {
    pub measure: Measure,
    /// The offending raw value; `None` when the field was missing
    pub raw: Option<Value>,
}

impl FieldWarning {
    pub fn is_missing(&self) -> bool {
        self.raw.is_none()
    }
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw {
            Some(raw) => write!(f, "{} has invalid value {raw}", self.measure),
            None => write!(f, "{} is missing", self.measure),
        }
    }
}

/// Result of validating one telemetry record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    pub reading: ValidatedReading,
    pub metadata: DeviceMetadata,
    pub warnings: Vec<FieldWarning>,
}

/// Validate every tracked measure and extract metadata
pub fn validate(raw: &RawTelemetry) -> Validation {
    let mut validation = Validation {
        metadata: extract_metadata(raw),
        ..Default::default()
    };

    for measure in Measure::ALL {
        match measure.raw_value(raw) {
            Some(value) => match finite_number(value) {
                Some(number) => *validation.reading.slot(measure) = Some(number),
                None => validation.warnings.push(FieldWarning {
                    measure,
                    raw: Some(value.clone()),
                }),
            },
            None => validation.warnings.push(FieldWarning { measure, raw: None }),
        }
    }

    validation
}

fn finite_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite())
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn extract_metadata(raw: &RawTelemetry) -> DeviceMetadata {
    DeviceMetadata {
        location_id: text(raw.location_id.as_ref()),
        location_name: text(raw.location_name.as_ref()),
        serial_number: text(raw.serialno.as_ref()),
        firmware_version: text(raw.firmware_version.as_ref()),
        wifi_rssi: raw.wifi.as_ref().and_then(Value::as_i64),
    }
}
