use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed within-area in-degree of the reference multi-area network: half of
/// the mean in-degree, the other half arriving from the remaining areas.
pub const REFERENCE_WITHIN_INDEGREE: u64 = 2921;

/// Fraction of an area's population each neuron receives input from under the
/// uniform density rule.
pub const DEFAULT_CONNECTION_DENSITY: f64 = 0.05;

/// Mean area size of the macaque multi-area model.
pub const MULTI_AREA_SIZE: u64 = 129_068;

/// Reference area size of the ignore-and-fire benchmark.
pub const IGNORE_AND_FIRE_AREA_SIZE: u64 = 80_000;

/// Rule used to obtain the within-area in-degree `K0`
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndegreeProfile {
    /// `K0` is a constant of the reference network, independent of area size
    Fixed { indegree: u64 },
    /// `K0 = round(fraction * N)`, recomputed per area from its population
    Density { fraction: f64 },
}

impl IndegreeProfile {
    /// In-degree an area of `total_neurons` neurons receives from itself.
    pub fn within_indegree(&self, total_neurons: u64) -> u64 {
        match *self {
            IndegreeProfile::Fixed { indegree } => indegree,
            IndegreeProfile::Density { fraction } => (fraction * total_neurons as f64).round() as u64,
        }
    }

    /// Whether the in-degree tracks the population of each individual area
    pub fn is_density(&self) -> bool {
        matches!(self, IndegreeProfile::Density { .. })
    }
}

/// Fixed population size for one area, bypassing the random draw
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AreaOverride {
    pub area: usize,
    pub total_neurons: u64,
}

/// Inter-area delay mean for one ordered pair of areas
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PairDelayMean {
    pub pre: usize,
    pub post: usize,
    pub mean: f64,
}

/// Top-level configuration file
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub network: GlobalConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Config {
    /// Validate every section of the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(level) = &self.general.log_level {
            if level.parse::<log::LevelFilter>().is_err() {
                return Err(ValidationError::InvalidGeneral(format!(
                    "unknown log_level '{}'",
                    level
                )));
            }
        }
        self.network.validate()?;
        self.simulation.validate()?;
        Ok(())
    }
}

/// Shared general configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GeneralConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

/// Global network knobs from which every area and connection is derived.
///
/// This is the flat key-value record handed in by the user; once validated it
/// is never mutated. Missing keys fall back to the multi-area preset.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GlobalConfig {
    /// Scaling factor of the network size
    pub scale: f64,
    pub num_areas: usize,
    /// Reference population size of one area before scaling
    pub area_size: u64,
    /// Explicit in-degree rule; derived from `morph_distribution` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indegree_profile: Option<IndegreeProfile>,
    /// Relative standard deviation of area sizes (0 gives identical areas)
    pub unbalanced_network_sigma: f64,
    pub min_delay: f64,
    pub max_delay: f64,
    /// Delay separating local from long-range connections
    pub threshold_delay: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_mean_intra: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_mean_inter: Option<f64>,
    /// Delay standard deviation relative to the mean
    pub delay_rel_std: f64,
    pub morph_distribution: bool,
    /// Seed of the generator used for drawing area sizes
    pub rng_seed: u64,
    /// Maximum number of neurons to record spikes from per area
    pub record_cap: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub area_overrides: Vec<AreaOverride>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pair_delay_means: Vec<PairDelayMean>,
}

impl GlobalConfig {
    /// Parameters of the macaque-sized multi-area benchmark.
    pub fn multi_area() -> Self {
        Self {
            scale: 1.0,
            num_areas: 32,
            area_size: MULTI_AREA_SIZE,
            indegree_profile: None,
            unbalanced_network_sigma: 0.15,
            min_delay: 0.1,
            max_delay: 2.0,
            threshold_delay: 1.0,
            delay_mean_intra: Some(0.5),
            delay_mean_inter: Some(1.5),
            delay_rel_std: 0.5,
            morph_distribution: true,
            rng_seed: 20,
            record_cap: 10_000,
            area_overrides: Vec::new(),
            pair_delay_means: Vec::new(),
        }
    }

    /// Parameters of the balanced ignore-and-fire benchmark.
    pub fn ignore_and_fire() -> Self {
        Self {
            scale: 1.0,
            num_areas: 1,
            area_size: IGNORE_AND_FIRE_AREA_SIZE,
            indegree_profile: None,
            unbalanced_network_sigma: 0.0,
            min_delay: 0.1,
            max_delay: 2.0,
            threshold_delay: 1.0,
            delay_mean_intra: None,
            delay_mean_inter: None,
            delay_rel_std: 0.5,
            morph_distribution: false,
            rng_seed: 12,
            record_cap: 1_000,
            area_overrides: Vec::new(),
            pair_delay_means: Vec::new(),
        }
    }

    /// Baseline within-area population `N0 = round(area_size * scale)`
    pub fn baseline_population(&self) -> u64 {
        (self.area_size as f64 * self.scale).round() as u64
    }

    /// Largest area population for which every network-wide count still fits
    /// in a `u64`
    pub fn population_limit(&self) -> u64 {
        u64::MAX / self.num_areas.max(1) as u64
    }

    /// The in-degree rule in effect for this run.
    ///
    /// Without an explicit profile, morphological runs use the fixed reference
    /// in-degree and all other runs use the uniform density rule.
    pub fn effective_indegree_profile(&self) -> IndegreeProfile {
        match self.indegree_profile {
            Some(profile) => profile,
            None if self.morph_distribution => IndegreeProfile::Fixed {
                indegree: REFERENCE_WITHIN_INDEGREE,
            },
            None => IndegreeProfile::Density {
                fraction: DEFAULT_CONNECTION_DENSITY,
            },
        }
    }

    /// Validate the network configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.num_areas < 1 {
            return Err(ValidationError::InvalidNetwork(
                "num_areas must be at least 1".to_string(),
            ));
        }

        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ValidationError::InvalidNetwork(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }

        // Compared in floating point: the integer conversion saturates
        let limit = self.population_limit();
        let scaled = (self.area_size as f64 * self.scale).round();
        if scaled >= limit as f64 {
            return Err(ValidationError::InvalidNetwork(format!(
                "area_size {} at scale {} gives {:e} neurons per area, {} areas allow at most {}",
                self.area_size, self.scale, scaled, self.num_areas, limit
            )));
        }

        if self.baseline_population() == 0 {
            return Err(ValidationError::InvalidNetwork(format!(
                "area_size {} at scale {} rounds to an empty area",
                self.area_size, self.scale
            )));
        }

        if !(self.unbalanced_network_sigma.is_finite() && self.unbalanced_network_sigma >= 0.0) {
            return Err(ValidationError::InvalidNetwork(format!(
                "unbalanced_network_sigma must be non-negative, got {}",
                self.unbalanced_network_sigma
            )));
        }

        match self.effective_indegree_profile() {
            IndegreeProfile::Density { fraction } if !(fraction > 0.0 && fraction <= 1.0) => {
                return Err(ValidationError::InvalidNetwork(format!(
                    "connection density must be in (0, 1], got {}",
                    fraction
                )));
            }
            _ => {}
        }

        if self.record_cap == 0 {
            return Err(ValidationError::InvalidNetwork(
                "record_cap must be greater than 0".to_string(),
            ));
        }

        self.validate_delays()?;

        for area_override in &self.area_overrides {
            if area_override.area >= self.num_areas {
                return Err(ValidationError::InvalidNetwork(format!(
                    "area override refers to area_{} but only {} areas exist",
                    area_override.area, self.num_areas
                )));
            }
            if area_override.total_neurons >= self.population_limit() {
                return Err(ValidationError::InvalidNetwork(format!(
                    "area override gives area_{} {} neurons, {} areas allow at most {}",
                    area_override.area,
                    area_override.total_neurons,
                    self.num_areas,
                    self.population_limit()
                )));
            }
        }

        for pair in &self.pair_delay_means {
            if pair.pre >= self.num_areas || pair.post >= self.num_areas {
                return Err(ValidationError::InvalidDelays(format!(
                    "pair delay mean refers to area_{} -> area_{} but only {} areas exist",
                    pair.pre, pair.post, self.num_areas
                )));
            }
            if pair.pre == pair.post {
                return Err(ValidationError::InvalidDelays(format!(
                    "pair delay mean for area_{} targets itself; use delay_mean_intra",
                    pair.pre
                )));
            }
        }

        Ok(())
    }

    fn validate_delays(&self) -> Result<(), ValidationError> {
        for (name, value) in [
            ("min_delay", self.min_delay),
            ("threshold_delay", self.threshold_delay),
            ("max_delay", self.max_delay),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ValidationError::InvalidDelays(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        let ordered = if self.morph_distribution {
            self.min_delay < self.threshold_delay && self.threshold_delay < self.max_delay
        } else {
            self.min_delay <= self.threshold_delay && self.threshold_delay <= self.max_delay
        };
        if !ordered {
            return Err(ValidationError::InvalidDelays(format!(
                "expected min_delay {} threshold_delay {} max_delay {} (morph_distribution = {})",
                self.min_delay,
                if self.morph_distribution { "<" } else { "<=" },
                if self.morph_distribution { "<" } else { "<=" },
                self.morph_distribution
            )));
        }

        if !(self.delay_rel_std.is_finite() && self.delay_rel_std >= 0.0) {
            return Err(ValidationError::InvalidDelays(format!(
                "delay_rel_std must be non-negative, got {}",
                self.delay_rel_std
            )));
        }

        Ok(())
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self::multi_area()
    }
}

/// Engine-facing simulation settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulation time until the network reaches equilibrium
    #[serde(with = "humantime_serde")]
    pub presimtime: Duration,
    #[serde(with = "humantime_serde")]
    pub simtime: Duration,
    /// Simulation resolution in ms
    pub dt: f64,
    pub num_processes: usize,
    pub threads_per_task: usize,
    /// Seed handed to the engine kernel
    pub engine_seed: u64,
    pub record_spikes: bool,
    pub neuron_model: String,
    /// Firing rate of the ignore-and-fire neurons in spikes/s
    pub rate: f64,
}

impl SimulationConfig {
    /// Total number of virtual processes requested from the engine
    pub fn num_virtual_procs(&self) -> usize {
        self.num_processes * self.threads_per_task
    }

    pub fn presimtime_ms(&self) -> f64 {
        self.presimtime.as_secs_f64() * 1e3
    }

    pub fn simtime_ms(&self) -> f64 {
        self.simtime.as_secs_f64() * 1e3
    }

    /// Validate the simulation configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ValidationError::InvalidSimulation(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        if self.num_processes == 0 || self.threads_per_task == 0 {
            return Err(ValidationError::InvalidSimulation(
                "num_processes and threads_per_task must be greater than 0".to_string(),
            ));
        }
        if self.simtime.is_zero() {
            return Err(ValidationError::InvalidSimulation(
                "simtime cannot be zero".to_string(),
            ));
        }
        if self.neuron_model.is_empty() {
            return Err(ValidationError::InvalidSimulation(
                "neuron_model cannot be empty".to_string(),
            ));
        }
        if !(self.rate.is_finite() && self.rate >= 0.0) {
            return Err(ValidationError::InvalidSimulation(format!(
                "rate must be non-negative, got {}",
                self.rate
            )));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            presimtime: Duration::from_millis(1_000),
            simtime: Duration::from_millis(10_000),
            dt: 0.1,
            num_processes: 1,
            threads_per_task: 1,
            engine_seed: 12,
            record_spikes: false,
            neuron_model: "ignore_and_fire".to_string(),
            rate: 2.5,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),
    #[error("Invalid delay configuration: {0}")]
    InvalidDelays(String),
    #[error("Invalid simulation configuration: {0}")]
    InvalidSimulation(String),
}
