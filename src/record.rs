// AgriSim - Sensor records
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! The emitted record type and its output schema.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Output columns, in order.
pub const SCHEMA: [&str; 12] = [
    "sensor_id",
    "timestamp",
    "soil_moisture",
    "soil_pH",
    "temperature",
    "rainfall",
    "humidity",
    "sunlight_intensity",
    "pesticide_usage_ml",
    "farm_id",
    "region",
    "crop_type",
];

/// Timestamp layout used in every output format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Numeric measurement fields of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    SoilMoisture,
    SoilPh,
    Temperature,
    Rainfall,
    Humidity,
    SunlightIntensity,
    PesticideUsage,
}

impl Field {
    /// All numeric fields, in schema order.
    pub const ALL: [Field; 7] = [
        Field::SoilMoisture,
        Field::SoilPh,
        Field::Temperature,
        Field::Rainfall,
        Field::Humidity,
        Field::SunlightIntensity,
        Field::PesticideUsage,
    ];

    /// Fields subject to sensor-failure nulls, in draw order.
    pub const FAULT_ELIGIBLE: [Field; 5] = [
        Field::SoilMoisture,
        Field::SoilPh,
        Field::Temperature,
        Field::Humidity,
        Field::SunlightIntensity,
    ];

    /// Column name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::SoilMoisture => "soil_moisture",
            Field::SoilPh => "soil_pH",
            Field::Temperature => "temperature",
            Field::Rainfall => "rainfall",
            Field::Humidity => "humidity",
            Field::SunlightIntensity => "sunlight_intensity",
            Field::PesticideUsage => "pesticide_usage_ml",
        }
    }

    /// Whether the field may be reported missing.
    pub fn is_fault_eligible(&self) -> bool {
        !matches!(self, Field::Rainfall | Field::PesticideUsage)
    }
}

/// One reading for one farm at one time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub sensor_id: String,
    #[serde(with = "iso_seconds")]
    pub timestamp: NaiveDateTime,
    pub soil_moisture: Option<f64>,
    #[serde(rename = "soil_pH")]
    pub soil_ph: Option<f64>,
    pub temperature: Option<f64>,
    pub rainfall: f64,
    pub humidity: Option<f64>,
    pub sunlight_intensity: Option<f64>,
    pub pesticide_usage_ml: f64,
    pub farm_id: String,
    pub region: String,
    pub crop_type: String,
}

impl SensorRecord {
    /// Value of a numeric field, `None` when the sensor failed.
    pub fn value(&self, field: Field) -> Option<f64> {
        match field {
            Field::SoilMoisture => self.soil_moisture,
            Field::SoilPh => self.soil_ph,
            Field::Temperature => self.temperature,
            Field::Rainfall => Some(self.rainfall),
            Field::Humidity => self.humidity,
            Field::SunlightIntensity => self.sunlight_intensity,
            Field::PesticideUsage => Some(self.pesticide_usage_ml),
        }
    }

    /// Number of fields reported missing.
    pub fn missing_count(&self) -> usize {
        Field::FAULT_ELIGIBLE
            .iter()
            .filter(|f| self.value(**f).is_none())
            .count()
    }
}

/// Serde adapter writing timestamps as `YYYY-MM-DDTHH:MM:SS`.
pub mod iso_seconds {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(de::Error::custom)
    }
}
