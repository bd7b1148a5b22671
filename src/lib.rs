//! # Multiarea - Parameter derivation for multi-area spiking network benchmarks
//!
//! This library derives everything a spiking network simulation engine needs
//! to build a multi-area benchmark network from a handful of global knobs.
//!
//! ## Overview
//!
//! A run starts from a flat configuration (number of areas, scale, delay
//! extrema, seed). From it the library derives per-area population sizes and
//! in-degrees, builds the truncated-normal delay distributions of local and
//! long-range connections, and assembles an ordered list of fixed in-degree
//! connection rules. A thin driver then hands that plan to an engine.
//!
//! ## Key Features
//!
//! - **Reproducible**: area sizes come from a seeded, platform-stable generator
//! - **Unbalanced networks**: area sizes drawn from a truncated normal
//! - **Morphological distribution**: one shared neuron pool, sliced per area
//! - **Pathological input detection**: resampling loops are bounded and
//!   checked for acceptance up front
//!
//! ## Architecture
//!
//! - `config`: Type-safe configuration structures and validation
//! - `config_loader`: YAML and flat JSON loading, CLI overrides, migration
//! - `topology`: Area sizes, in-degree budget, neuron pool layout
//! - `delay`: Delay distribution builder and sampler
//! - `plan`: Connectivity plan assembly
//! - `engine`: Simulation engine boundary and the manifest engine
//! - `driver`: Run orchestration and timing report
//! - `registry`: Parameter dictionary and summaries written for audit
//! - `utils`: Normal distribution helpers and plan validation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use multiarea::{config_loader, driver, engine::ManifestEngine, plan};
//! use std::path::Path;
//!
//! let config = config_loader::load_config(Path::new("config.yaml"))?;
//! let plan = plan::build_plan(&config.network)?;
//!
//! let mut engine = ManifestEngine::single_process();
//! let report = driver::run_simulation(&config, &plan, &mut engine)?;
//! println!("{} connections", report.num_connections);
//! # Ok::<(), color_eyre::Report>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   log_level: info
//!
//! network:
//!   num_areas: 32
//!   scale: 1.0
//!   unbalanced_network_sigma: 0.15
//!   min_delay: 0.1
//!   threshold_delay: 1.0
//!   max_delay: 2.0
//!   morph_distribution: true
//!   rng_seed: 20
//!
//! simulation:
//!   presimtime: "1s"
//!   simtime: "10s"
//!   num_processes: 32
//!   threads_per_task: 64
//!   record_spikes: true
//! ```

pub mod config;
pub mod config_loader;
pub mod delay;
pub mod driver;
pub mod engine;
pub mod plan;
pub mod registry;
pub mod topology;
pub mod utils;

/// Smallest acceptance probability a truncated-normal resampling loop may
/// have; below it the inputs are reported as pathological.
pub const MIN_ACCEPTANCE: f64 = 1e-3;

/// Upper bound on redraws of a single truncated-normal value
pub const MAX_REDRAW_ATTEMPTS: usize = 100_000;

pub use config::{Config, GlobalConfig, IndegreeProfile, SimulationConfig, ValidationError};
pub use plan::{build_plan, ConnectivityPlan};
