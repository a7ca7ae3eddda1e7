// AgriSim - Synthetic farm telemetry generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # AgriSim
//!
//! Stateful, reproducible generator of agricultural sensor telemetry.
//!
//! Each farm carries its own soil and air state, advanced step by step with
//! seasonal and diurnal forcing, random rain and pesticide events, automatic
//! irrigation and mean reversion. Every step emits one [`SensorRecord`] per
//! farm, with occasional sensor failures reported as missing values.
//!
//! ## Quick Start
//!
//! ```rust
//! use agrisim::{GenerationConfig, Roster, Simulator};
//!
//! let config = GenerationConfig::new()
//!     .with_roster(Roster::default_farms(2))
//!     .with_step_count(60)
//!     .with_seed(42);
//!
//! let records: Vec<_> = Simulator::new(&config)
//!     .unwrap()
//!     .collect::<agrisim::Result<_>>()
//!     .unwrap();
//! assert_eq!(records.len(), 120);
//! ```
//!
//! ## Writing to a sink
//!
//! ```rust,no_run
//! use agrisim::{drive, CsvSink, GenerationConfig, Simulator};
//!
//! let config = GenerationConfig::default(); // 5 farms, one year of minutes
//! let mut sink = CsvSink::create("farm_telemetry.csv").unwrap();
//! let summary = drive(Simulator::new(&config).unwrap(), &mut sink).unwrap();
//! println!("{} records", summary.total_records);
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: The record-producing simulator
//! - [`state`]: Per-farm state and update rules
//! - [`forcing`]: Seasonal and diurnal forcing functions
//! - [`config`]: Horizon, roster and model parameters
//! - [`record`]: Output record and schema
//! - [`sink`]: CSV, JSON Lines and in-memory sinks
//! - [`summary`]: Streaming statistics and dataset manifest

pub mod config;
pub mod engine;
pub mod error;
pub mod farm;
pub mod forcing;
pub mod record;
pub mod sink;
pub mod state;
pub mod summary;

// Re-exports for convenient access
pub use config::{parse_timestamp, GenerationConfig, ModelParams};
pub use engine::{generate, Simulator};
pub use error::{Result, SimError, SinkError};
pub use farm::{Farm, Roster};
pub use record::{Field, SensorRecord, SCHEMA};
pub use sink::{drive, CsvSink, JsonLinesSink, MemorySink, RecordSink};
pub use state::{FarmState, PesticideTrigger, StepReading};
pub use summary::{FieldStats, RunManifest, RunSummary};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
