//! Area and topology type definitions.
//!
//! This file contains the per-area records produced by topology derivation
//! together with the stable area identifiers used throughout the plan.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::IndegreeProfile;

/// Stable area identifier; the index is the creation order of the area
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaId(pub usize);

impl AreaId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "area_{}", self.0)
    }
}

/// Derived parameters of a single area
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaSpec {
    pub id: AreaId,
    /// Number of neurons in the area, always above its own in-degree
    pub total_neurons: u64,
    /// Number of neurons to record spikes from
    pub record_count: u64,
}

/// Result of topology derivation: every area plus the shared in-degree budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologyParams {
    /// Areas in creation order
    pub areas: Vec<AreaSpec>,
    /// Baseline population `N0` before any perturbation
    pub baseline_population: u64,
    /// Baseline within-area in-degree `K0`
    pub base_indegree: u64,
    /// In-degree of every ordered inter-area pair, absent for a single area
    pub inter_indegree: Option<u64>,
    pub profile: IndegreeProfile,
}

impl TopologyParams {
    pub fn num_areas(&self) -> usize {
        self.areas.len()
    }

    /// In-degree an area receives from its own population
    pub fn within_indegree(&self, area: &AreaSpec) -> u64 {
        self.profile.within_indegree(area.total_neurons)
    }

    /// Largest population of any area
    pub fn max_area_population(&self) -> u64 {
        self.areas.iter().map(|a| a.total_neurons).max().unwrap_or(0)
    }

    /// Total number of neurons over all areas, `None` if it overflows
    pub fn total_neurons(&self) -> Option<u64> {
        self.areas
            .iter()
            .try_fold(0u64, |total, a| total.checked_add(a.total_neurons))
    }
}
