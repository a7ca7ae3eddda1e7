// AgriSim - Run summary and manifest
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Streaming statistics over emitted records, and the manifest describing a
//! generated dataset.
//!
//! Statistics are accumulated online so a full-year run never has to be
//! held in memory.

use crate::config::GenerationConfig;
use crate::farm::Roster;
use crate::record::{Field, SensorRecord};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running statistics for one numeric field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    /// Non-null values seen.
    pub count: u64,
    /// Null values seen.
    pub missing: u64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Sum of squared deviations from the mean; lets reloaded stats keep accumulating.
    #[serde(default)]
    m2: f64,
}

impl FieldStats {
    /// Add one observation.
    pub fn push(&mut self, value: Option<f64>) {
        let Some(v) = value else {
            self.missing += 1;
            return;
        };

        self.count += 1;
        let delta = v - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (v - self.mean);
        self.std_dev = (self.m2 / self.count as f64).sqrt();
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    /// Share of observations that were null.
    pub fn null_rate(&self) -> f64 {
        let total = self.count + self.missing;
        if total == 0 {
            0.0
        } else {
            self.missing as f64 / total as f64
        }
    }
}

/// Aggregate view of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_records: u64,
    pub records_per_farm: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_timestamp: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<NaiveDateTime>,
    /// Records with rainfall > 0.
    pub rain_events: u64,
    /// Records with a pesticide application.
    pub pesticide_applications: u64,
    /// Statistics keyed by column name.
    pub fields: BTreeMap<String, FieldStats>,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSummary {
    /// Create an empty summary.
    pub fn new() -> Self {
        let fields = Field::ALL
            .iter()
            .map(|f| (f.as_str().to_string(), FieldStats::default()))
            .collect();
        Self {
            total_records: 0,
            records_per_farm: BTreeMap::new(),
            first_timestamp: None,
            last_timestamp: None,
            rain_events: 0,
            pesticide_applications: 0,
            fields,
        }
    }

    /// Fold one record into the summary.
    pub fn observe(&mut self, record: &SensorRecord) {
        self.total_records += 1;
        *self
            .records_per_farm
            .entry(record.farm_id.clone())
            .or_insert(0) += 1;

        if self.first_timestamp.is_none() {
            self.first_timestamp = Some(record.timestamp);
        }
        self.last_timestamp = Some(record.timestamp);

        if record.rainfall > 0.0 {
            self.rain_events += 1;
        }
        if record.pesticide_usage_ml > 0.0 {
            self.pesticide_applications += 1;
        }

        for field in Field::ALL {
            if let Some(stats) = self.fields.get_mut(field.as_str()) {
                stats.push(record.value(field));
            }
        }
    }

    /// Statistics for a field.
    pub fn stats(&self, field: Field) -> Option<&FieldStats> {
        self.fields.get(field.as_str())
    }

    /// Null rate for a field (0 when nothing was observed).
    pub fn null_rate(&self, field: Field) -> f64 {
        self.stats(field).map(FieldStats::null_rate).unwrap_or(0.0)
    }
}

/// Manifest written next to a generated dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Dataset name (matches the data file stem).
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    pub seed: u64,
    pub start: NaiveDateTime,
    pub step_secs: u64,
    pub step_count: usize,
    pub roster: Roster,
    pub summary: RunSummary,
    /// Generation timestamp.
    pub generated_at: DateTime<Utc>,
    /// Version of the generator that produced the data.
    pub generator_version: String,
}

impl RunManifest {
    /// Describe a finished run.
    pub fn new(name: &str, config: &GenerationConfig, summary: RunSummary) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            seed: config.seed,
            start: config.start,
            step_secs: config.step_secs,
            step_count: config.step_count,
            roster: config.roster.clone(),
            summary,
            generated_at: Utc::now(),
            generator_version: crate::VERSION.to_string(),
        }
    }

    /// Set description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to JSON file.
    pub fn to_json_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), std::io::Error> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from JSON file.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
