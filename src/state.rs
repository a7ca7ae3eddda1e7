// AgriSim - Farm state dynamics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Per-farm state and the per-step update rules.
//!
//! Each step runs, in order: sunlight, temperature, rainfall, soil moisture
//! (with auto-irrigation), humidity, soil pH, pesticide, stabilization.
//! Every random draw goes through the caller's generator, so the order of
//! draws below is part of the reproducibility contract:
//!
//! 1. temperature perturbation
//! 2. rain trial, then the rain amount if it rained
//! 3. irrigation boost if moisture fell below the threshold
//! 4. humidity noise
//! 5. pH drift
//! 6. post-rain pesticide trial (only if it rained), then the amount if applied

use crate::config::{Band, ModelParams};
use crate::error::{Result, SimError};
use crate::farm::Farm;
use crate::forcing;
use chrono::{Duration, NaiveDateTime};
use log::trace;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Uniform};
use serde::Serialize;

/// What caused a pesticide application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PesticideTrigger {
    /// Applied right after rain.
    PostRain,
    /// Weekly schedule came due.
    Scheduled,
    /// Both fired in the same step; a single application is made.
    Both,
}

impl PesticideTrigger {
    fn from_flags(post_rain: bool, scheduled: bool) -> Option<Self> {
        match (post_rain, scheduled) {
            (true, true) => Some(PesticideTrigger::Both),
            (true, false) => Some(PesticideTrigger::PostRain),
            (false, true) => Some(PesticideTrigger::Scheduled),
            (false, false) => None,
        }
    }

    /// Whether the post-rain path fired.
    pub fn includes_post_rain(&self) -> bool {
        matches!(self, PesticideTrigger::PostRain | PesticideTrigger::Both)
    }
}

/// Model parameters resolved into ready-to-sample distributions.
#[derive(Debug, Clone)]
pub struct Dynamics {
    params: ModelParams,
    initial_moisture: Uniform<f64>,
    initial_ph: Uniform<f64>,
    initial_temperature: Uniform<f64>,
    temperature_noise: Uniform<f64>,
    rain: Bernoulli,
    rain_amount: Uniform<f64>,
    irrigation_boost: Uniform<f64>,
    humidity_noise: Uniform<f64>,
    ph_drift: Uniform<f64>,
    post_rain_pesticide: Bernoulli,
    pesticide_amount: Uniform<f64>,
    fault: Bernoulli,
    schedule_interval: Duration,
}

fn uniform((min, max): (f64, f64)) -> Uniform<f64> {
    Uniform::new_inclusive(min, max)
}

fn symmetric(half_width: f64) -> Uniform<f64> {
    Uniform::new_inclusive(-half_width, half_width)
}

fn bernoulli(name: &str, p: f64) -> Result<Bernoulli> {
    Bernoulli::new(p).map_err(|e| SimError::config(format!("{}: {}", name, e)))
}

impl Dynamics {
    /// Validate parameters and build the distributions.
    pub fn new(params: &ModelParams) -> Result<Self> {
        params.validate()?;

        Ok(Self {
            initial_moisture: uniform(params.initial.soil_moisture),
            initial_ph: uniform(params.initial.soil_ph),
            initial_temperature: uniform(params.initial.temperature),
            temperature_noise: symmetric(params.temperature.noise),
            rain: bernoulli("rain.probability", params.rain.probability)?,
            rain_amount: uniform(params.rain.amount_mm),
            irrigation_boost: uniform(params.moisture.irrigation_boost),
            humidity_noise: symmetric(params.humidity.noise),
            ph_drift: symmetric(params.ph.drift),
            post_rain_pesticide: bernoulli(
                "pesticide.post_rain_probability",
                params.pesticide.post_rain_probability,
            )?,
            pesticide_amount: uniform(params.pesticide.amount_ml),
            fault: bernoulli("fault_probability", params.fault_probability)?,
            schedule_interval: Duration::seconds(params.pesticide.schedule_interval_secs as i64),
            params: params.clone(),
        })
    }

    /// Parameters these dynamics were built from.
    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Weekly pesticide cadence.
    pub fn schedule_interval(&self) -> Duration {
        self.schedule_interval
    }

    /// Report a value, or `None` if the sensor fails this time.
    pub fn observe<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> Option<f64> {
        if self.fault.sample(rng) {
            None
        } else {
            Some(value)
        }
    }
}

/// Instantaneous values produced by one step for one farm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReading {
    pub sunlight_intensity: f64,
    pub temperature: f64,
    pub rainfall: f64,
    pub soil_moisture: f64,
    pub humidity: f64,
    pub soil_ph: f64,
    pub pesticide_usage_ml: f64,
    /// Auto-irrigation fired this step. Not part of the output schema.
    pub irrigated: bool,
    pub pesticide_trigger: Option<PesticideTrigger>,
}

/// Mutable state of one farm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FarmState {
    pub farm: Farm,
    pub soil_moisture: f64,
    pub soil_ph: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub last_pesticide_application: NaiveDateTime,
}

/// Pull a value part of the way back toward its midpoint when it leaves its band.
fn revert(value: f64, band: &Band, rate: f64) -> f64 {
    if band.is_extreme(value) {
        value + (band.midpoint - value) * rate
    } else {
        value
    }
}

impl FarmState {
    /// Draw initial soil moisture, pH and temperature, in that order.
    pub fn initialize<R: Rng + ?Sized>(
        farm: Farm,
        start: NaiveDateTime,
        dynamics: &Dynamics,
        rng: &mut R,
    ) -> Self {
        let soil_moisture = dynamics.initial_moisture.sample(rng);
        let soil_ph = dynamics.initial_ph.sample(rng);
        let temperature = dynamics.initial_temperature.sample(rng);

        Self {
            farm,
            soil_moisture,
            soil_ph,
            temperature,
            humidity: dynamics.params.initial.humidity,
            last_pesticide_application: start,
        }
    }

    /// Farm identifier.
    pub fn farm_id(&self) -> &str {
        &self.farm.farm_id
    }

    /// Advance the state to `at` and return this step's readings.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        at: NaiveDateTime,
        dynamics: &Dynamics,
        rng: &mut R,
    ) -> Result<StepReading> {
        let p = &dynamics.params;

        let sunlight = forcing::sunlight_intensity(at, &p.sunlight);

        let midpoint = forcing::temperature_midpoint(at, &p.temperature);
        let target = midpoint
            + p.temperature.sunlight_coefficient * sunlight
            + dynamics.temperature_noise.sample(rng);
        let inertia = p.temperature.inertia;
        self.temperature = inertia * self.temperature + (1.0 - inertia) * target;

        let rainfall = if dynamics.rain.sample(rng) {
            dynamics.rain_amount.sample(rng)
        } else {
            0.0
        };

        let m = &p.moisture;
        let excess = (self.temperature - m.evaporation_baseline).max(0.0);
        let mut moisture =
            self.soil_moisture - m.evaporation_rate * excess + m.rain_absorption * rainfall;
        let irrigated = moisture < m.irrigation_threshold;
        if irrigated {
            moisture += dynamics.irrigation_boost.sample(rng);
        }
        self.soil_moisture = moisture.clamp(0.0, 100.0);

        let h = &p.humidity;
        let humidity = h.midpoint
            + h.temperature_coefficient * (self.temperature - midpoint)
            + h.rain_coefficient * rainfall
            + dynamics.humidity_noise.sample(rng);
        self.humidity = humidity.clamp(h.min, h.max);

        self.soil_ph += dynamics.ph_drift.sample(rng) - p.ph.rain_acidification * rainfall;
        if self.soil_moisture > p.ph.alkaline_moisture_threshold {
            self.soil_ph += p.ph.alkalinization;
        }

        // Only a rainy step gets the post-rain trial, so a dry step never
        // consumes that draw.
        let post_rain = rainfall > 0.0 && dynamics.post_rain_pesticide.sample(rng);
        let scheduled =
            at.signed_duration_since(self.last_pesticide_application) >= dynamics.schedule_interval;
        let pesticide_trigger = PesticideTrigger::from_flags(post_rain, scheduled);
        let pesticide_usage_ml = match pesticide_trigger {
            Some(trigger) => {
                let amount = dynamics.pesticide_amount.sample(rng);
                self.last_pesticide_application = at;
                self.soil_ph -= p.ph.pesticide_offset;
                trace!(
                    "{}: pesticide {:.2} ml at {} ({:?})",
                    self.farm.farm_id,
                    amount,
                    at,
                    trigger
                );
                amount
            }
            None => 0.0,
        };

        if rainfall > 0.0 {
            trace!("{}: rain {:.2} mm at {}", self.farm.farm_id, rainfall, at);
        }
        if irrigated {
            trace!("{}: auto-irrigation at {}", self.farm.farm_id, at);
        }

        self.stabilize(p);

        let reading = StepReading {
            sunlight_intensity: sunlight,
            temperature: self.temperature,
            rainfall,
            soil_moisture: self.soil_moisture,
            humidity: self.humidity,
            soil_ph: self.soil_ph,
            pesticide_usage_ml,
            irrigated,
            pesticide_trigger,
        };

        self.check_integrity(&reading, at, p)?;
        Ok(reading)
    }

    fn stabilize(&mut self, p: &ModelParams) {
        let s = &p.stabilization;
        self.temperature = revert(self.temperature, &s.temperature, s.reversion);
        self.soil_moisture = revert(self.soil_moisture, &s.soil_moisture, s.reversion);
        self.humidity = revert(self.humidity, &s.humidity, s.reversion);
        self.soil_ph = revert(self.soil_ph, &s.soil_ph, s.reversion);
    }

    fn check_integrity(
        &self,
        reading: &StepReading,
        at: NaiveDateTime,
        p: &ModelParams,
    ) -> Result<()> {
        let fields = [
            ("sunlight_intensity", reading.sunlight_intensity),
            ("temperature", reading.temperature),
            ("rainfall", reading.rainfall),
            ("soil_moisture", reading.soil_moisture),
            ("humidity", reading.humidity),
            ("soil_pH", reading.soil_ph),
            ("pesticide_usage_ml", reading.pesticide_usage_ml),
        ];

        for (field, value) in fields {
            if !value.is_finite() {
                return Err(self.integrity_error(field, value, at));
            }
        }
        if !(0.0..=100.0).contains(&reading.soil_moisture) {
            return Err(self.integrity_error("soil_moisture", reading.soil_moisture, at));
        }
        if !(p.humidity.min..=p.humidity.max).contains(&reading.humidity) {
            return Err(self.integrity_error("humidity", reading.humidity, at));
        }
        Ok(())
    }

    fn integrity_error(&self, field: &'static str, value: f64, at: NaiveDateTime) -> SimError {
        SimError::NumericIntegrity {
            farm_id: self.farm.farm_id.clone(),
            field,
            value,
            timestamp: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn midnight() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn state_with(params: &ModelParams, seed: u64) -> (FarmState, Dynamics, ChaCha8Rng) {
        let dynamics = Dynamics::new(params).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let state = FarmState::initialize(
            Farm::new("farm_1", "North", "Wheat"),
            midnight(),
            &dynamics,
            &mut rng,
        );
        (state, dynamics, rng)
    }

    #[test]
    fn test_initial_ranges() {
        let params = ModelParams::default();
        for seed in 0..50 {
            let (state, _, _) = state_with(&params, seed);
            assert!((30.0..=45.0).contains(&state.soil_moisture));
            assert!((6.0..=7.0).contains(&state.soil_ph));
            assert!((20.0..=30.0).contains(&state.temperature));
            assert_eq!(state.humidity, 60.0);
            assert_eq!(state.last_pesticide_application, midnight());
        }
    }

    #[test]
    fn test_temperature_inertia() {
        // No noise, no sunlight: temperature moves 30% toward the midpoint.
        let mut params = ModelParams::default();
        params.temperature.noise = 0.0;
        params.rain.probability = 0.0;
        let (mut state, dynamics, mut rng) = state_with(&params, 1);
        state.temperature = 30.0;

        let at = midnight() + Duration::minutes(1);
        let midpoint = forcing::temperature_midpoint(at, &params.temperature);
        let reading = state.advance(at, &dynamics, &mut rng).unwrap();

        assert_relative_eq!(
            reading.temperature,
            0.7 * 30.0 + 0.3 * midpoint,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_rain_wets_soil_and_acidifies() {
        let mut params = ModelParams::default();
        params.rain.probability = 1.0;
        params.rain.amount_mm = (50.0, 50.0);
        params.ph.drift = 0.0;
        params.pesticide.post_rain_probability = 0.0;
        params.moisture.evaporation_rate = 0.0;
        let (mut state, dynamics, mut rng) = state_with(&params, 2);
        state.soil_moisture = 40.0;
        state.soil_ph = 6.5;

        let at = midnight() + Duration::minutes(1);
        let reading = state.advance(at, &dynamics, &mut rng).unwrap();

        assert_eq!(reading.rainfall, 50.0);
        // 0.6 * 50 mm absorbed
        assert_relative_eq!(reading.soil_moisture, 70.0, epsilon = 1e-9);
        // 0.002 * 50 acidification, no alkalinization at exactly 70%
        assert_relative_eq!(reading.soil_ph, 6.4, epsilon = 1e-9);
        assert_eq!(reading.pesticide_trigger, None);
    }

    #[test]
    fn test_auto_irrigation() {
        let mut params = ModelParams::default();
        params.rain.probability = 0.0;
        params.moisture.irrigation_boost = (15.0, 15.0);
        let (mut state, dynamics, mut rng) = state_with(&params, 3);
        state.soil_moisture = 12.0;

        let reading = state
            .advance(midnight() + Duration::minutes(1), &dynamics, &mut rng)
            .unwrap();

        assert!(reading.irrigated);
        assert!(reading.soil_moisture >= 20.0);
        assert!(reading.soil_moisture <= 27.0);
    }

    #[test]
    fn test_moisture_clamped() {
        let mut params = ModelParams::default();
        params.rain.probability = 1.0;
        params.rain.amount_mm = (80.0, 80.0);
        params.stabilization.reversion = 0.0;
        let (mut state, dynamics, mut rng) = state_with(&params, 4);
        state.soil_moisture = 95.0;

        let reading = state
            .advance(midnight() + Duration::minutes(1), &dynamics, &mut rng)
            .unwrap();
        assert_eq!(reading.soil_moisture, 100.0);
    }

    #[test]
    fn test_humidity_clamped() {
        let mut params = ModelParams::default();
        params.rain.probability = 1.0;
        params.rain.amount_mm = (80.0, 80.0);
        params.humidity.rain_coefficient = 5.0;
        params.stabilization.reversion = 0.0;
        let (mut state, dynamics, mut rng) = state_with(&params, 5);

        let reading = state
            .advance(midnight() + Duration::minutes(1), &dynamics, &mut rng)
            .unwrap();
        assert_eq!(reading.humidity, 100.0);
    }

    #[test]
    fn test_scheduled_pesticide_weekly() {
        let mut params = ModelParams::default();
        params.rain.probability = 0.0;
        let (mut state, dynamics, mut rng) = state_with(&params, 6);

        let before = midnight() + Duration::days(7) - Duration::minutes(1);
        let reading = state.advance(before, &dynamics, &mut rng).unwrap();
        assert_eq!(reading.pesticide_usage_ml, 0.0);

        let due = midnight() + Duration::days(7);
        let ph_before = state.soil_ph;
        let reading = state.advance(due, &dynamics, &mut rng).unwrap();
        assert_eq!(reading.pesticide_trigger, Some(PesticideTrigger::Scheduled));
        assert!((5.0..=20.0).contains(&reading.pesticide_usage_ml));
        assert_eq!(state.last_pesticide_application, due);
        // pH offset of 0.2 dominates the ±0.02 drift
        assert!(reading.soil_ph < ph_before - 0.15);

        let next = due + Duration::minutes(1);
        let reading = state.advance(next, &dynamics, &mut rng).unwrap();
        assert_eq!(reading.pesticide_usage_ml, 0.0);
    }

    #[test]
    fn test_both_triggers_single_application() {
        let mut params = ModelParams::default();
        params.rain.probability = 1.0;
        params.pesticide.post_rain_probability = 1.0;
        let (mut state, dynamics, mut rng) = state_with(&params, 7);

        let at = midnight() + Duration::days(8);
        let reading = state.advance(at, &dynamics, &mut rng).unwrap();
        assert_eq!(reading.pesticide_trigger, Some(PesticideTrigger::Both));
        assert!((5.0..=20.0).contains(&reading.pesticide_usage_ml));
    }

    #[test]
    fn test_no_post_rain_trigger_without_rain() {
        let mut params = ModelParams::default();
        params.pesticide.post_rain_probability = 1.0;
        let (mut state, dynamics, mut rng) = state_with(&params, 8);

        let mut at = midnight();
        for _ in 0..5_000 {
            at += Duration::minutes(1);
            let reading = state.advance(at, &dynamics, &mut rng).unwrap();
            if reading.rainfall == 0.0 {
                assert!(!reading
                    .pesticide_trigger
                    .map(|t| t.includes_post_rain())
                    .unwrap_or(false));
            } else {
                assert!(reading.pesticide_trigger.unwrap().includes_post_rain());
            }
        }
    }

    #[test]
    fn test_stabilization_pulls_back() {
        let band = Band::new(10.0, 40.0, 25.0);
        assert_relative_eq!(revert(45.0, &band, 0.3), 39.0);
        assert_relative_eq!(revert(4.0, &band, 0.3), 10.3);
        assert_eq!(revert(30.0, &band, 0.3), 30.0);
    }

    #[test]
    fn test_extreme_ph_reverts() {
        let mut params = ModelParams::default();
        params.rain.probability = 0.0;
        let (mut state, dynamics, mut rng) = state_with(&params, 9);
        state.soil_ph = 9.0;

        let reading = state
            .advance(midnight() + Duration::minutes(1), &dynamics, &mut rng)
            .unwrap();
        // 30% of the way back toward 6.5, not clamped to 8.0
        assert!(reading.soil_ph < 8.3);
        assert!(reading.soil_ph > 8.0);
    }

    #[test]
    fn test_non_finite_fails_fast() {
        let params = ModelParams::default();
        let (mut state, dynamics, mut rng) = state_with(&params, 10);
        state.soil_ph = f64::NAN;

        let err = state
            .advance(midnight() + Duration::minutes(1), &dynamics, &mut rng)
            .unwrap_err();
        match err {
            SimError::NumericIntegrity { farm_id, field, .. } => {
                assert_eq!(farm_id, "farm_1");
                assert_eq!(field, "soil_pH");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_observe_fault_probability_extremes() {
        let mut params = ModelParams::default();
        params.fault_probability = 1.0;
        let dynamics = Dynamics::new(&params).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(dynamics.observe(1.0, &mut rng), None);

        params.fault_probability = 0.0;
        let dynamics = Dynamics::new(&params).unwrap();
        assert_eq!(dynamics.observe(1.0, &mut rng), Some(1.0));
    }
}
