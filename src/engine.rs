// AgriSim - Simulation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! The simulation engine.
//!
//! [`Simulator`] owns one [`FarmState`] per farm and a single random source.
//! It is a lazy iterator: each call to `next` advances one farm by one step
//! and yields its record. Records come out time-major, farm-minor: all farms
//! for step 1 in roster order, then all farms for step 2, and so on.
//!
//! Per record, the random source is consumed in this order: sensor id,
//! the state update draws (see [`crate::state`]), then one fault trial for
//! each of soil moisture, soil pH, temperature, humidity and sunlight.

use crate::config::GenerationConfig;
use crate::error::{Result, SimError};
use crate::farm::Roster;
use crate::record::SensorRecord;
use crate::state::{Dynamics, FarmState, StepReading};
use chrono::{Duration, NaiveDateTime};
use log::{debug, error};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::iter::FusedIterator;

/// Build a seeded simulator over `roster`.
pub fn generate(
    roster: Roster,
    start: NaiveDateTime,
    step_count: usize,
    step_size: Duration,
    seed: u64,
) -> Result<Simulator> {
    if step_size <= Duration::zero() {
        return Err(SimError::config("step size must be positive"));
    }
    if step_size.num_milliseconds() % 1000 != 0 {
        return Err(SimError::config("step size must be a whole number of seconds"));
    }

    let config = GenerationConfig::new()
        .with_roster(roster)
        .with_start(start)
        .with_step_count(step_count)
        .with_step_secs(step_size.num_seconds() as u64)
        .with_seed(seed);
    Simulator::new(&config)
}

/// Deterministic UUID-shaped identifier drawn from the run's random source.
fn sensor_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let hi: u64 = rng.gen();
    let lo: u64 = rng.gen();
    format!(
        "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
        hi >> 32,
        (hi >> 16) & 0xffff,
        hi & 0x0fff,
        ((lo >> 48) & 0x3fff) | 0x8000,
        lo & 0xffff_ffff_ffff
    )
}

/// Stateful generator of sensor records.
#[derive(Debug)]
pub struct Simulator<R = ChaCha8Rng> {
    farms: Vec<FarmState>,
    dynamics: Dynamics,
    rng: R,
    step_size: Duration,
    step_count: usize,
    /// Index of the step being emitted.
    step: usize,
    /// Next farm to emit within the current step.
    cursor: usize,
    /// Timestamp of the current step.
    now: NaiveDateTime,
    emitted: u64,
    failed: bool,
}

impl Simulator<ChaCha8Rng> {
    /// Create a simulator seeded from `config.seed`.
    ///
    /// ChaCha8 output is fixed for a given seed on every platform, so a seed
    /// names one dataset.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Self::with_rng(config, ChaCha8Rng::seed_from_u64(config.seed))
    }
}

impl<R: Rng> Simulator<R> {
    /// Create a simulator drawing from an explicit random source.
    ///
    /// `config.seed` is ignored; the caller owns seeding.
    pub fn with_rng(config: &GenerationConfig, mut rng: R) -> Result<Self> {
        config.validate()?;
        let dynamics = Dynamics::new(&config.params)?;

        let farms: Vec<FarmState> = config
            .roster
            .farms()
            .iter()
            .cloned()
            .map(|farm| FarmState::initialize(farm, config.start, &dynamics, &mut rng))
            .collect();

        debug!(
            "Initialized {} farms, {} steps of {}s from {}",
            farms.len(),
            config.step_count,
            config.step_secs,
            config.start
        );

        Ok(Self {
            farms,
            dynamics,
            rng,
            step_size: config.step_size(),
            step_count: config.step_count,
            step: 0,
            cursor: 0,
            now: config.start,
            emitted: 0,
            failed: false,
        })
    }

    /// Current per-farm state, in roster order.
    pub fn farm_states(&self) -> &[FarmState] {
        &self.farms
    }

    /// Step size.
    pub fn step_size(&self) -> Duration {
        self.step_size
    }

    /// Records emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Records still to come if the run does not fail.
    pub fn remaining(&self) -> usize {
        if self.failed {
            return 0;
        }
        let total = self.farms.len() * self.step_count;
        total - (self.step * self.farms.len() + self.cursor)
    }

    /// Check if the run is over, either completed or aborted.
    pub fn is_finished(&self) -> bool {
        self.failed || self.step >= self.step_count
    }

    fn emit(&mut self) -> Result<SensorRecord> {
        if self.cursor == 0 {
            self.now += self.step_size;
        }
        let at = self.now;

        let sensor_id = sensor_id(&mut self.rng);
        let state = &mut self.farms[self.cursor];
        let reading = state.advance(at, &self.dynamics, &mut self.rng)?;
        let record = report(sensor_id, at, state, &reading, &self.dynamics, &mut self.rng);

        self.cursor += 1;
        if self.cursor == self.farms.len() {
            self.cursor = 0;
            self.step += 1;
        }
        self.emitted += 1;
        Ok(record)
    }
}

/// Assemble the emitted record, injecting sensor failures.
///
/// The state keeps its true values; only the report goes missing.
fn report<R: Rng + ?Sized>(
    sensor_id: String,
    at: NaiveDateTime,
    state: &FarmState,
    reading: &StepReading,
    dynamics: &Dynamics,
    rng: &mut R,
) -> SensorRecord {
    let soil_moisture = dynamics.observe(reading.soil_moisture, rng);
    let soil_ph = dynamics.observe(reading.soil_ph, rng);
    let temperature = dynamics.observe(reading.temperature, rng);
    let humidity = dynamics.observe(reading.humidity, rng);
    let sunlight_intensity = dynamics.observe(reading.sunlight_intensity, rng);

    SensorRecord {
        sensor_id,
        timestamp: at,
        soil_moisture,
        soil_ph,
        temperature,
        rainfall: reading.rainfall,
        humidity,
        sunlight_intensity,
        pesticide_usage_ml: reading.pesticide_usage_ml,
        farm_id: state.farm.farm_id.clone(),
        region: state.farm.region.clone(),
        crop_type: state.farm.crop_type.clone(),
    }
}

impl<R: Rng> Iterator for Simulator<R> {
    type Item = Result<SensorRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_finished() {
            return None;
        }

        match self.emit() {
            Ok(record) => Some(Ok(record)),
            Err(e) => {
                error!("Run aborted after {} records: {}", self.emitted, e);
                self.failed = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining.min(1), Some(remaining))
    }
}

impl<R: Rng> FusedIterator for Simulator<R> {}
