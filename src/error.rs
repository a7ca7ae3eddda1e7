// AgriSim - Synthetic farm telemetry generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for AgriSim
//!
//! Configuration problems are reported before a run starts. Numeric
//! integrity failures abort the run. Sink failures are passed back to the
//! driver untouched; the engine never retries.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Result type alias for AgriSim operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Main error type for AgriSim operations
#[derive(Error, Debug)]
pub enum SimError {
    /// Invalid roster, horizon, or model parameters
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// A computed field became non-finite or left a hard bound
    #[error("Numeric integrity error on farm {farm_id} at {timestamp}: {field} = {value}")]
    NumericIntegrity {
        farm_id: String,
        field: &'static str,
        value: f64,
        timestamp: NaiveDateTime,
    },

    /// Downstream sink rejected a record
    #[error("Output sink error: {0}")]
    OutputSink(#[from] SinkError),
}

impl SimError {
    /// Shorthand for a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        SimError::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether this error was raised before any record was produced
    pub fn is_configuration(&self) -> bool {
        matches!(self, SimError::Configuration { .. })
    }
}

/// Errors raised by record sinks
#[derive(Error, Debug)]
pub enum SinkError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sink no longer accepts records
    #[error("Sink closed after {written} records")]
    Closed { written: u64 },
}
