//! Threshold classification of validated readings
//!
//! The PM2.5 breakpoints follow the US EPA AQI bands; the CO2 limit is the
//! usual 800 ppm indoor comfort threshold. Both are external contracts.

use crate::services::validator::{DeviceMetadata, ValidatedReading};
use serde::{Deserialize, Serialize};

/// Inclusive upper PM2.5 bounds (µg/m³) for Excellent, Good, Fair and Inferior
pub const PM2_5_BREAKPOINTS: [f64; 4] = [12.0, 35.4, 55.4, 150.4];

/// Highest CO2 concentration (ppm) still reported as normal
pub const CO2_ABNORMAL_ABOVE_PPM: f64 = 800.0;

/// Ordinal air-quality category derived from PM2.5
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AirQuality {
    Excellent,
    Good,
    Fair,
    Inferior,
    Poor,
}

impl AirQuality {
    /// HomeKit `AirQuality` characteristic value (0 is reserved for unknown)
    pub fn code(self) -> u8 {
        match self {
            AirQuality::Excellent => 1,
            AirQuality::Good => 2,
            AirQuality::Fair => 3,
            AirQuality::Inferior => 4,
            AirQuality::Poor => 5,
        }
    }
}

/// CO2 detection state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Co2Status {
    Normal,
    Abnormal,
}

impl Co2Status {
    /// HomeKit `CarbonDioxideDetected` characteristic value
    pub fn code(self) -> u8 {
        match self {
            Co2Status::Normal => 0,
            Co2Status::Abnormal => 1,
        }
    }
}

/// Map a PM2.5 density to its air-quality category
pub fn air_quality_category(pm2_5: f64) -> AirQuality {
    if pm2_5 <= PM2_5_BREAKPOINTS[0] {
        AirQuality::Excellent
    } else if pm2_5 <= PM2_5_BREAKPOINTS[1] {
        AirQuality::Good
    } else if pm2_5 <= PM2_5_BREAKPOINTS[2] {
        AirQuality::Fair
    } else if pm2_5 <= PM2_5_BREAKPOINTS[3] {
        AirQuality::Inferior
    } else {
        AirQuality::Poor
    }
}

/// Map a CO2 concentration to its detection state
pub fn co2_detected(co2_ppm: f64) -> Co2Status {
    if co2_ppm <= CO2_ABNORMAL_ABOVE_PPM {
        Co2Status::Normal
    } else {
        Co2Status::Abnormal
    }
}

/// A validated reading plus its derived categories
///
/// This is the record a poller publishes; it is only ever replaced whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedState {
    pub reading: ValidatedReading,
    pub metadata: DeviceMetadata,
    /// Absent when PM2.5 was absent
    pub air_quality: Option<AirQuality>,
    /// Absent when CO2 was absent
    pub co2: Option<Co2Status>,
}

/// Derive categories for a reading
pub fn classify(reading: ValidatedReading, metadata: DeviceMetadata) -> ClassifiedState {
    ClassifiedState {
        air_quality: reading.pm2_5.map(air_quality_category),
        co2: reading.co2.map(co2_detected),
        reading,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, AirQuality::Excellent)]
    #[case(8.0, AirQuality::Excellent)]
    #[case(12.0, AirQuality::Excellent)]
    #[case(12.01, AirQuality::Good)]
    #[case(35.4, AirQuality::Good)]
    #[case(35.5, AirQuality::Fair)]
    #[case(55.4, AirQuality::Fair)]
    #[case(60.0, AirQuality::Inferior)]
    #[case(150.4, AirQuality::Inferior)]
    #[case(150.41, AirQuality::Poor)]
    #[case(500.0, AirQuality::Poor)]
    fn test_air_quality_breakpoints(#[case] pm2_5: f64, #[case] expected: AirQuality) {
        assert_eq!(air_quality_category(pm2_5), expected);
    }

    #[rstest]
    #[case(400.0, Co2Status::Normal)]
    #[case(800.0, Co2Status::Normal)]
    #[case(800.5, Co2Status::Abnormal)]
    #[case(2500.0, Co2Status::Abnormal)]
    fn test_co2_threshold(#[case] ppm: f64, #[case] expected: Co2Status) {
        assert_eq!(co2_detected(ppm), expected);
    }

    #[test]
    fn test_negative_readings_are_still_classified() {
        assert_eq!(air_quality_category(-3.0), AirQuality::Excellent);
        assert_eq!(co2_detected(-1.0), Co2Status::Normal);
    }

    #[test]
    fn test_homekit_codes() {
        assert_eq!(AirQuality::Excellent.code(), 1);
        assert_eq!(AirQuality::Poor.code(), 5);
        assert_eq!(Co2Status::Abnormal.code(), 1);
    }

    #[test]
    fn test_classify_is_idempotent() {
        let reading = ValidatedReading {
            pm2_5: Some(40.0),
            co2: Some(900.0),
            ..Default::default()
        };
        let first = classify(reading.clone(), DeviceMetadata::default());
        let second = classify(reading, DeviceMetadata::default());
        assert_eq!(first, second);
        assert_eq!(first.air_quality, Some(AirQuality::Fair));
        assert_eq!(first.co2, Some(Co2Status::Abnormal));
    }

    #[test]
    fn test_absent_inputs_give_absent_categories() {
        let state = classify(ValidatedReading::default(), DeviceMetadata::default());
        assert_eq!(state.air_quality, None);
        assert_eq!(state.co2, None);
    }
}
