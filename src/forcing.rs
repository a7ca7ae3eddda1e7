// AgriSim - Seasonal and diurnal forcing
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Stateless forcing functions of simulated time.
//!
//! The seasonal phase is derived from the timestamp every time it is needed;
//! nothing here keeps state between steps.

use crate::config::{SunlightParams, TemperatureParams};
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::f64::consts::PI;

/// Days per simulated year.
const DAYS_PER_YEAR: f64 = 365.0;

/// Day of year on which the seasonal sine crosses zero going up (spring equinox).
const SPRING_EQUINOX_DAY: f64 = 80.0;

/// Hour of day including minutes and seconds.
pub fn fractional_hour(at: NaiveDateTime) -> f64 {
    at.hour() as f64 + at.minute() as f64 / 60.0 + at.second() as f64 / 3600.0
}

/// Seasonal phase in [-1, 1]: peaks near the June solstice, troughs in December.
pub fn seasonal_phase(at: NaiveDateTime) -> f64 {
    let day = at.ordinal() as f64;
    (2.0 * PI * (day - SPRING_EQUINOX_DAY) / DAYS_PER_YEAR).sin()
}

/// Seasonally shifted temperature midpoint (°C).
pub fn temperature_midpoint(at: NaiveDateTime, params: &TemperatureParams) -> f64 {
    params.base + params.seasonal_amplitude * seasonal_phase(at)
}

/// Sunlight intensity (W/m²).
///
/// Zero outside the daylight window, otherwise a bell curve centred on solar
/// noon scaled by the seasonal factor.
pub fn sunlight_intensity(at: NaiveDateTime, params: &SunlightParams) -> f64 {
    let hour = fractional_hour(at);
    if hour < params.day_start_hour || hour >= params.day_end_hour {
        return 0.0;
    }

    let noon = (params.day_start_hour + params.day_end_hour) / 2.0;
    let offset = hour - noon;
    let bell = (-(offset * offset) / (2.0 * params.spread_hours * params.spread_hours)).exp();
    let season = 1.0 + params.seasonal_amplitude * seasonal_phase(at);

    params.peak * bell * season
}
