// AgriSim - Configuration
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Generation configuration and model parameters.
//!
//! [`GenerationConfig`] selects the roster, horizon and seed. [`ModelParams`]
//! holds every physical constant of the simulation so a driver can tune the
//! model from a JSON file without touching the engine.

use crate::error::{Result, SimError};
use crate::farm::Roster;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Default random seed.
pub const DEFAULT_SEED: u64 = 42;

/// Default step size (one minute).
pub const DEFAULT_STEP_SECS: u64 = 60;

/// Minutes in a 365-day year.
pub const MINUTES_PER_YEAR: usize = 365 * 24 * 60;

/// Default number of farms in the generated roster.
pub const DEFAULT_FARM_COUNT: usize = 5;

/// Longest accepted step (one year).
const MAX_STEP_SECS: u64 = 366 * 24 * 3600;

/// Accepted textual timestamp layouts, tried in order.
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a horizon start such as `2024-01-01T00:00` or `2024-01-01`.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| SimError::config(format!("malformed start time: {:?}", s)))
}

/// Config files accept the same start layouts as [`parse_timestamp`].
fn deserialize_start<'de, D>(d: D) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(d)?;
    parse_timestamp(&raw).map_err(de::Error::custom)
}

fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("2024-01-01T00:00:00 is a valid timestamp")
}

/// Generation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Farms to simulate, in emission order.
    pub roster: Roster,
    /// Horizon start. The first record is stamped one step later.
    #[serde(deserialize_with = "deserialize_start")]
    pub start: NaiveDateTime,
    /// Number of time steps.
    pub step_count: usize,
    /// Step size in seconds.
    pub step_secs: u64,
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Physical model parameters.
    pub params: ModelParams,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            roster: Roster::default_farms(DEFAULT_FARM_COUNT),
            start: default_start(),
            step_count: MINUTES_PER_YEAR,
            step_secs: DEFAULT_STEP_SECS,
            seed: DEFAULT_SEED,
            params: ModelParams::default(),
        }
    }
}

impl GenerationConfig {
    /// Create a new generation config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the roster.
    pub fn with_roster(mut self, roster: Roster) -> Self {
        self.roster = roster;
        self
    }

    /// Set the horizon start.
    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start = start;
        self
    }

    /// Set the horizon start from text.
    pub fn with_start_str(mut self, start: &str) -> Result<Self> {
        self.start = parse_timestamp(start)?;
        Ok(self)
    }

    /// Set number of steps.
    pub fn with_step_count(mut self, n: usize) -> Self {
        self.step_count = n;
        self
    }

    /// Set step size in seconds.
    pub fn with_step_secs(mut self, secs: u64) -> Self {
        self.step_secs = secs;
        self
    }

    /// Set duration in days (calculates step_count from step size).
    pub fn with_duration_days(mut self, days: f64) -> Self {
        let total_secs = days * 86_400.0;
        self.step_count = (total_secs / self.step_secs.max(1) as f64).ceil() as usize;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set model parameters.
    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    /// Step size as a duration.
    pub fn step_size(&self) -> Duration {
        Duration::seconds(self.step_secs.min(MAX_STEP_SECS) as i64)
    }

    /// Total number of records a run produces.
    pub fn expected_records(&self) -> usize {
        self.roster.len() * self.step_count
    }

    /// Timestamp of the last record, if the horizon fits the calendar.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        let total = self.step_secs.checked_mul(self.step_count as u64)?;
        let total = i64::try_from(total).ok().filter(|s| *s <= i64::MAX / 1000)?;
        self.start.checked_add_signed(Duration::seconds(total))
    }

    /// Validate roster, horizon and parameters.
    pub fn validate(&self) -> Result<()> {
        self.roster.validate()?;

        if self.step_count == 0 {
            return Err(SimError::config("step_count must be positive"));
        }
        if self.step_secs == 0 {
            return Err(SimError::config("step size must be positive"));
        }
        if self.step_secs > MAX_STEP_SECS {
            return Err(SimError::config(format!(
                "step size {}s exceeds maximum {}s",
                self.step_secs, MAX_STEP_SECS
            )));
        }
        if self.end_time().is_none() {
            return Err(SimError::config("horizon end is out of the calendar range"));
        }

        self.params.validate()
    }

    /// Load a config from a JSON file. Missing keys take default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            SimError::config(format!("cannot open config {}: {}", path.display(), e))
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            SimError::config(format!("invalid config {}: {}", path.display(), e))
        })
    }
}

/// Initial value ranges drawn once per farm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialRanges {
    pub soil_moisture: (f64, f64),
    pub soil_ph: (f64, f64),
    pub temperature: (f64, f64),
    /// Not drawn; every farm starts at this humidity.
    pub humidity: f64,
}

impl Default for InitialRanges {
    fn default() -> Self {
        Self {
            soil_moisture: (30.0, 45.0),
            soil_ph: (6.0, 7.0),
            temperature: (20.0, 30.0),
            humidity: 60.0,
        }
    }
}

/// Sunlight forcing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SunlightParams {
    /// First daylight hour (inclusive).
    pub day_start_hour: f64,
    /// End of daylight (exclusive).
    pub day_end_hour: f64,
    /// Intensity at solar noon before seasonal scaling (W/m²).
    pub peak: f64,
    /// Width of the bell curve in hours.
    pub spread_hours: f64,
    /// Seasonal scaling amplitude (0.2 = ±20%).
    pub seasonal_amplitude: f64,
}

impl Default for SunlightParams {
    fn default() -> Self {
        Self {
            day_start_hour: 6.0,
            day_end_hour: 18.0,
            peak: 1000.0,
            spread_hours: 3.0,
            seasonal_amplitude: 0.2,
        }
    }
}

/// Temperature dynamics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureParams {
    /// Annual mean (°C).
    pub base: f64,
    /// Seasonal swing around the base (°C).
    pub seasonal_amplitude: f64,
    /// Degrees added per W/m² of sunlight.
    pub sunlight_coefficient: f64,
    /// Half-width of the uniform perturbation (°C).
    pub noise: f64,
    /// Share of the previous temperature kept each step.
    pub inertia: f64,
}

impl Default for TemperatureParams {
    fn default() -> Self {
        Self {
            base: 25.0,
            seasonal_amplitude: 5.0,
            sunlight_coefficient: 0.005,
            noise: 0.3,
            inertia: 0.7,
        }
    }
}

/// Rain events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainParams {
    /// Per-step probability of a rain event.
    pub probability: f64,
    /// Rain amount range (mm).
    pub amount_mm: (f64, f64),
}

impl Default for RainParams {
    fn default() -> Self {
        Self {
            probability: 0.014,
            amount_mm: (10.0, 80.0),
        }
    }
}

/// Soil moisture balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoistureParams {
    /// Moisture lost per °C above the baseline, per step.
    pub evaporation_rate: f64,
    /// Temperature above which evaporation starts (°C).
    pub evaporation_baseline: f64,
    /// Share of rainfall absorbed by the soil.
    pub rain_absorption: f64,
    /// Moisture below which auto-irrigation kicks in (%).
    pub irrigation_threshold: f64,
    /// Irrigation boost range (%).
    pub irrigation_boost: (f64, f64),
}

impl Default for MoistureParams {
    fn default() -> Self {
        Self {
            evaporation_rate: 0.02,
            evaporation_baseline: 20.0,
            rain_absorption: 0.6,
            irrigation_threshold: 20.0,
            irrigation_boost: (10.0, 20.0),
        }
    }
}

/// Air humidity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HumidityParams {
    /// Humidity when temperature sits on its seasonal midpoint (%).
    pub midpoint: f64,
    /// Change per °C of temperature deviation from the midpoint.
    pub temperature_coefficient: f64,
    /// Change per mm of rainfall this step.
    pub rain_coefficient: f64,
    /// Half-width of the uniform noise (%).
    pub noise: f64,
    /// Hard lower bound (%).
    pub min: f64,
    /// Hard upper bound (%).
    pub max: f64,
}

impl Default for HumidityParams {
    fn default() -> Self {
        Self {
            midpoint: 60.0,
            temperature_coefficient: -0.8,
            rain_coefficient: 0.25,
            noise: 3.0,
            min: 10.0,
            max: 100.0,
        }
    }
}

/// Soil pH chemistry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhParams {
    /// Half-width of the uniform drift per step.
    pub drift: f64,
    /// pH lost per mm of rainfall.
    pub rain_acidification: f64,
    /// Moisture above which the soil alkalinizes (%).
    pub alkaline_moisture_threshold: f64,
    /// pH gained per step above the moisture threshold.
    pub alkalinization: f64,
    /// pH lost on a pesticide application.
    pub pesticide_offset: f64,
}

impl Default for PhParams {
    fn default() -> Self {
        Self {
            drift: 0.02,
            rain_acidification: 0.002,
            alkaline_moisture_threshold: 70.0,
            alkalinization: 0.005,
            pesticide_offset: 0.2,
        }
    }
}

/// Pesticide application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PesticideParams {
    /// Probability of an application right after rain.
    pub post_rain_probability: f64,
    /// Scheduled application interval in seconds (weekly).
    pub schedule_interval_secs: u64,
    /// Application amount range (ml).
    pub amount_ml: (f64, f64),
}

impl Default for PesticideParams {
    fn default() -> Self {
        Self {
            post_rain_probability: 0.7,
            schedule_interval_secs: 7 * 24 * 3600,
            amount_ml: (5.0, 20.0),
        }
    }
}

/// Band outside of which a value is pulled back toward its midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low: f64,
    pub high: f64,
    pub midpoint: f64,
}

impl Band {
    /// Create a band.
    pub const fn new(low: f64, high: f64, midpoint: f64) -> Self {
        Self {
            low,
            high,
            midpoint,
        }
    }

    /// Check if a value lies outside the band.
    pub fn is_extreme(&self, value: f64) -> bool {
        value < self.low || value > self.high
    }
}

/// Mean reversion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationParams {
    /// Fraction of the distance to the midpoint recovered per step.
    pub reversion: f64,
    pub temperature: Band,
    pub soil_moisture: Band,
    pub humidity: Band,
    pub soil_ph: Band,
}

impl Default for StabilizationParams {
    fn default() -> Self {
        Self {
            reversion: 0.3,
            temperature: Band::new(10.0, 40.0, 25.0),
            soil_moisture: Band::new(10.0, 90.0, 50.0),
            humidity: Band::new(15.0, 90.0, 60.0),
            soil_ph: Band::new(5.0, 8.0, 6.5),
        }
    }
}

/// Every physical constant of the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub initial: InitialRanges,
    pub sunlight: SunlightParams,
    pub temperature: TemperatureParams,
    pub rain: RainParams,
    pub moisture: MoistureParams,
    pub humidity: HumidityParams,
    pub ph: PhParams,
    pub pesticide: PesticideParams,
    pub stabilization: StabilizationParams,
    /// Per-field probability that a reading is reported missing.
    pub fault_probability: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            initial: InitialRanges::default(),
            sunlight: SunlightParams::default(),
            temperature: TemperatureParams::default(),
            rain: RainParams::default(),
            moisture: MoistureParams::default(),
            humidity: HumidityParams::default(),
            ph: PhParams::default(),
            pesticide: PesticideParams::default(),
            stabilization: StabilizationParams::default(),
            fault_probability: 0.03,
        }
    }
}

fn check_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::config(format!("{} must be finite, got {}", name, value)))
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    check_finite(name, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

fn check_range(name: &str, (min, max): (f64, f64)) -> Result<()> {
    check_finite(name, min)?;
    check_finite(name, max)?;
    if min > max {
        return Err(SimError::config(format!(
            "{} range is inverted: [{}, {}]",
            name, min, max
        )));
    }
    // Sampling scales the span up slightly, so leave headroom
    if !((max - min) * 2.0).is_finite() {
        return Err(SimError::config(format!(
            "{} range [{}, {}] is too wide",
            name, min, max
        )));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    check_finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(SimError::config(format!(
            "{} must not be negative, got {}",
            name, value
        )))
    }
}

/// Half-width of a symmetric noise term drawn from `[-w, w]`.
fn check_half_width(name: &str, value: f64) -> Result<()> {
    check_non_negative(name, value)?;
    check_range(name, (-value, value))
}

fn check_band(name: &str, band: &Band) -> Result<()> {
    check_range(name, (band.low, band.high))?;
    check_finite(name, band.midpoint)?;
    if band.low <= band.midpoint && band.midpoint <= band.high {
        Ok(())
    } else {
        Err(SimError::config(format!(
            "{} midpoint {} lies outside [{}, {}]",
            name, band.midpoint, band.low, band.high
        )))
    }
}

impl ModelParams {
    /// Reject parameters that would make a draw panic or a formula diverge.
    pub fn validate(&self) -> Result<()> {
        let i = &self.initial;
        check_range("initial.soil_moisture", i.soil_moisture)?;
        check_range("initial.soil_ph", i.soil_ph)?;
        check_range("initial.temperature", i.temperature)?;
        check_finite("initial.humidity", i.humidity)?;
        if i.soil_moisture.0 < 0.0 || i.soil_moisture.1 > 100.0 {
            return Err(SimError::config("initial.soil_moisture must lie within [0, 100]"));
        }

        let s = &self.sunlight;
        check_finite("sunlight.day_start_hour", s.day_start_hour)?;
        check_finite("sunlight.day_end_hour", s.day_end_hour)?;
        if !(0.0 <= s.day_start_hour && s.day_start_hour < s.day_end_hour && s.day_end_hour <= 24.0)
        {
            return Err(SimError::config(
                "sunlight daylight window must satisfy 0 <= start < end <= 24",
            ));
        }
        check_non_negative("sunlight.peak", s.peak)?;
        check_finite("sunlight.spread_hours", s.spread_hours)?;
        if s.spread_hours <= 0.0 {
            return Err(SimError::config("sunlight.spread_hours must be positive"));
        }
        check_fraction("sunlight.seasonal_amplitude", s.seasonal_amplitude)?;

        let t = &self.temperature;
        check_finite("temperature.base", t.base)?;
        check_finite("temperature.seasonal_amplitude", t.seasonal_amplitude)?;
        check_finite("temperature.sunlight_coefficient", t.sunlight_coefficient)?;
        check_half_width("temperature.noise", t.noise)?;
        check_fraction("temperature.inertia", t.inertia)?;

        check_fraction("rain.probability", self.rain.probability)?;
        check_range("rain.amount_mm", self.rain.amount_mm)?;
        if self.rain.amount_mm.0 < 0.0 {
            return Err(SimError::config("rain.amount_mm must not be negative"));
        }

        let m = &self.moisture;
        check_non_negative("moisture.evaporation_rate", m.evaporation_rate)?;
        check_finite("moisture.evaporation_baseline", m.evaporation_baseline)?;
        check_non_negative("moisture.rain_absorption", m.rain_absorption)?;
        check_finite("moisture.irrigation_threshold", m.irrigation_threshold)?;
        check_range("moisture.irrigation_boost", m.irrigation_boost)?;

        let h = &self.humidity;
        check_finite("humidity.midpoint", h.midpoint)?;
        check_finite("humidity.temperature_coefficient", h.temperature_coefficient)?;
        check_finite("humidity.rain_coefficient", h.rain_coefficient)?;
        check_half_width("humidity.noise", h.noise)?;
        check_range("humidity.min/max", (h.min, h.max))?;

        let p = &self.ph;
        check_half_width("ph.drift", p.drift)?;
        check_finite("ph.rain_acidification", p.rain_acidification)?;
        check_finite("ph.alkaline_moisture_threshold", p.alkaline_moisture_threshold)?;
        check_finite("ph.alkalinization", p.alkalinization)?;
        check_finite("ph.pesticide_offset", p.pesticide_offset)?;

        let pe = &self.pesticide;
        check_fraction("pesticide.post_rain_probability", pe.post_rain_probability)?;
        check_range("pesticide.amount_ml", pe.amount_ml)?;
        if pe.amount_ml.0 <= 0.0 {
            return Err(SimError::config("pesticide.amount_ml must be positive"));
        }
        if pe.schedule_interval_secs == 0 || pe.schedule_interval_secs > i64::MAX as u64 / 1000 {
            return Err(SimError::config(
                "pesticide.schedule_interval_secs must be positive",
            ));
        }

        let st = &self.stabilization;
        check_fraction("stabilization.reversion", st.reversion)?;
        check_band("stabilization.temperature", &st.temperature)?;
        check_band("stabilization.soil_moisture", &st.soil_moisture)?;
        check_band("stabilization.humidity", &st.humidity)?;
        check_band("stabilization.soil_ph", &st.soil_ph)?;
        if st.soil_moisture.midpoint < 0.0 || st.soil_moisture.midpoint > 100.0 {
            return Err(SimError::config(
                "stabilization.soil_moisture midpoint must lie within [0, 100]",
            ));
        }
        if st.humidity.midpoint < h.min || st.humidity.midpoint > h.max {
            return Err(SimError::config(
                "stabilization.humidity midpoint must lie within the humidity bounds",
            ));
        }

        check_fraction("fault_probability", self.fault_probability)
    }
}
