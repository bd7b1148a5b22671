//! # Simulation Engine Boundary
//!
//! The neuron dynamics, spike exchange and parallel execution all live in an
//! external simulation engine. This module describes the calls the driver
//! issues against that engine and nothing more.
//!
//! ## Calls
//!
//! - **Kernel setup**: resolution, delay extrema, virtual processes, seed
//! - **Create**: a population of `count` neurons of one model
//! - **Freeze / slice**: used by the morphological pool layout
//! - **Connect**: a fixed in-degree rule with a static synapse whose delay is
//!   a bounded random variable
//! - **Record**: attach a spike recorder to the first neurons of a population
//! - **Simulate**: advance the engine by a duration in ms
//!
//! ## Implementations
//!
//! - `manifest.rs`: [`ManifestEngine`], which records every call into a
//!   manifest for a downstream runner and tracks node ids the way the engine
//!   assigns them

use serde::Serialize;

use crate::delay::DelaySpec;

pub mod manifest;

pub use manifest::{EngineCall, ManifestEngine};

/// Opaque handle to a population created by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PopulationHandle(pub usize);

/// Kernel-wide settings applied before any node is created
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelSettings {
    pub total_num_virtual_procs: usize,
    /// Simulation step in ms
    pub resolution: f64,
    pub min_delay: f64,
    pub max_delay: f64,
    pub rng_seed: u64,
    /// Only set for morphological runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_delay: Option<f64>,
}

/// Initial phase of the ignore-and-fire neurons
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseSpec {
    Uniform { low: f64, high: f64 },
}

/// Neuron model parameters passed to population creation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelParams {
    pub rate: f64,
    pub phase: PhaseSpec,
}

/// Connection rule understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleSpec {
    FixedIndegree { indegree: u64, long_range: bool },
}

/// Synapse created by a connection call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynapseSpec {
    pub synapse_model: String,
    pub weight: f64,
    pub delay: DelaySpec,
}

impl SynapseSpec {
    /// Zero-weight static synapse: connectivity without influence on the dynamics
    pub fn silent(delay: DelaySpec) -> Self {
        Self {
            synapse_model: "static_synapse".to_string(),
            weight: 0.0,
            delay,
        }
    }
}

/// Errors reported by an engine
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EngineError {
    #[error("Engine kernel has not been configured")]
    KernelNotConfigured,

    #[error("Unknown population handle {0:?}")]
    UnknownPopulation(PopulationHandle),

    #[error("Slice {offset}:{stop}:{stride} exceeds population of {size} neurons")]
    InvalidSlice {
        offset: u64,
        stop: u64,
        stride: u64,
        size: u64,
    },

    #[error("Spikes can only be recorded from local neurons, but {area} has {local} local neurons and {requested} were requested; aborting the simulation")]
    InsufficientLocalPopulation {
        area: String,
        local: u64,
        requested: u64,
    },

    #[error("Engine call failed: {0}")]
    Call(String),
}

/// Calls the driver issues against the external simulation engine
pub trait SimulationEngine {
    fn configure_kernel(&mut self, settings: &KernelSettings) -> Result<(), EngineError>;

    fn create(
        &mut self,
        model: &str,
        count: u64,
        params: &ModelParams,
    ) -> Result<PopulationHandle, EngineError>;

    /// Exclude (or re-include) every neuron of a population from updates
    fn set_frozen(&mut self, population: PopulationHandle, frozen: bool) -> Result<(), EngineError>;

    /// Strided view `offset, offset + stride, ...` of `count` neurons
    fn slice(
        &mut self,
        population: PopulationHandle,
        offset: u64,
        stride: u64,
        count: u64,
    ) -> Result<PopulationHandle, EngineError>;

    fn connect(
        &mut self,
        source: PopulationHandle,
        target: PopulationHandle,
        rule: &RuleSpec,
        synapse: &SynapseSpec,
    ) -> Result<(), EngineError>;

    fn create_recorder(&mut self) -> Result<PopulationHandle, EngineError>;

    /// Record spikes of the first `count` local neurons of a population
    fn record(
        &mut self,
        population: PopulationHandle,
        count: u64,
        recorder: PopulationHandle,
    ) -> Result<(), EngineError>;

    /// Number of neurons of a population hosted by this process
    fn local_population(&self, population: PopulationHandle) -> Result<u64, EngineError>;

    fn simulate(&mut self, duration_ms: f64) -> Result<(), EngineError>;

    /// Number of nodes created so far
    fn network_size(&self) -> u64;

    /// Number of synapses created so far
    fn num_connections(&self) -> u64;
}
