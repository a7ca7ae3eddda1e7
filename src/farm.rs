// AgriSim - Farm roster
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Farm descriptors and the roster of farms a run simulates.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Regions cycled through by [`Roster::default_farms`].
pub const DEFAULT_REGIONS: [&str; 5] = ["North", "South", "East", "West", "Central"];

/// Crop types cycled through by [`Roster::default_farms`].
pub const DEFAULT_CROPS: [&str; 5] = ["Wheat", "Corn", "Rice", "Soybean", "Cotton"];

/// Descriptive attributes of one farm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farm {
    /// Stable identifier.
    pub farm_id: String,
    /// Region name.
    pub region: String,
    /// Crop grown on the farm.
    pub crop_type: String,
}

impl Farm {
    /// Create a farm descriptor.
    pub fn new(farm_id: &str, region: &str, crop_type: &str) -> Self {
        Self {
            farm_id: farm_id.to_string(),
            region: region.to_string(),
            crop_type: crop_type.to_string(),
        }
    }
}

/// Ordered list of farms. Order defines the farm-minor emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    farms: Vec<Farm>,
}

impl Roster {
    /// Create a roster from farms, keeping their order.
    pub fn new(farms: Vec<Farm>) -> Self {
        Self { farms }
    }

    /// `farm_1..farm_n`, cycling through the default regions and crops.
    pub fn default_farms(n: usize) -> Self {
        let farms = (0..n)
            .map(|i| {
                Farm::new(
                    &format!("farm_{}", i + 1),
                    DEFAULT_REGIONS[i % DEFAULT_REGIONS.len()],
                    DEFAULT_CROPS[i % DEFAULT_CROPS.len()],
                )
            })
            .collect();
        Self { farms }
    }

    /// Append a farm.
    pub fn with_farm(mut self, farm: Farm) -> Self {
        self.farms.push(farm);
        self
    }

    /// Farms in emission order.
    pub fn farms(&self) -> &[Farm] {
        &self.farms
    }

    /// Number of farms.
    pub fn len(&self) -> usize {
        self.farms.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.farms.is_empty()
    }

    /// Reject empty rosters, blank ids and duplicate ids.
    pub fn validate(&self) -> Result<()> {
        if self.farms.is_empty() {
            return Err(SimError::config("roster must contain at least one farm"));
        }

        let mut seen = HashSet::new();
        for farm in &self.farms {
            if farm.farm_id.trim().is_empty() {
                return Err(SimError::config("farm_id must not be empty"));
            }
            if !seen.insert(farm.farm_id.as_str()) {
                return Err(SimError::config(format!(
                    "duplicate farm_id in roster: {}",
                    farm.farm_id
                )));
            }
        }
        Ok(())
    }
}

impl FromIterator<Farm> for Roster {
    fn from_iter<I: IntoIterator<Item = Farm>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
