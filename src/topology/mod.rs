//! Network topology module.
//!
//! This module derives the per-area populations and in-degree budget from the
//! global configuration, and lays out the shared neuron pool used by the
//! morphological distribution mode.

pub mod types;
pub mod derivation;
pub mod pool;

// Re-export key types and functions for easier access
pub use types::{AreaId, AreaSpec, TopologyParams};
pub use derivation::{derive_topology, derive_topology_with_rng, inter_area_indegree, DerivationError};
pub use pool::{pool_index, NeuronPool, PoolSlice};
