//! Area size and in-degree derivation.
//!
//! Turns the global network knobs into one [`AreaSpec`] per area plus the
//! in-degree budget shared by all areas. Every area receives `K0` connections
//! from its own population and `K0` more spread evenly over the other areas,
//! so the incoming budget per neuron stays at `2 * K0` whatever the number of
//! areas.
//!
//! Area sizes of unbalanced networks are drawn from
//! `Normal(N0, sigma * N0)` with one explicit generator, advanced in
//! area-index order. Two runs with the same configuration therefore produce
//! identical areas.

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::config::{GlobalConfig, ValidationError};
use crate::topology::types::{AreaId, AreaSpec, TopologyParams};
use crate::utils::stats::normal_sf;
use crate::{MAX_REDRAW_ATTEMPTS, MIN_ACCEPTANCE};

/// Errors raised while deriving the topology
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DerivationError {
    #[error(transparent)]
    Config(#[from] ValidationError),

    #[error("Invalid area size distribution: {0}")]
    InvalidDistribution(String),

    #[error("Area sizes drawn from Normal({mean}, {std}) exceed the in-degree {indegree} with probability {acceptance:.3e}; increase area_size or scale, or reduce the in-degree")]
    PathologicalResampling {
        mean: f64,
        std: f64,
        indegree: u64,
        acceptance: f64,
    },

    #[error("Gave up drawing a size for {area} after {attempts} attempts")]
    ResamplingExhausted { area: AreaId, attempts: usize },

    #[error("Drew {size:e} neurons for {area}, more than the limit of {limit}; reduce unbalanced_network_sigma")]
    PopulationOverflow { area: AreaId, size: f64, limit: u64 },

    #[error("{area} has {total_neurons} neurons, too few to support its in-degree {indegree}")]
    PopulationTooSmall {
        area: AreaId,
        total_neurons: u64,
        indegree: u64,
    },
}

/// Derive the topology with a generator seeded from `config.rng_seed`.
pub fn derive_topology(config: &GlobalConfig) -> Result<TopologyParams, DerivationError> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
    derive_topology_with_rng(config, &mut rng)
}

/// Derive the topology, drawing area sizes from `rng`.
///
/// The generator is advanced only for areas whose size is drawn: once per
/// attempt, in area-index order. Overridden areas and balanced networks
/// (`unbalanced_network_sigma == 0`) consume no draws.
///
/// # Arguments
/// * `config` - The global network configuration
/// * `rng` - Generator used for area size sampling
///
/// # Returns
/// * `Ok(TopologyParams)` with exactly `num_areas` areas
/// * `Err(DerivationError)` if the configuration is invalid or a population
///   cannot support its own in-degree
pub fn derive_topology_with_rng<R: Rng + ?Sized>(
    config: &GlobalConfig,
    rng: &mut R,
) -> Result<TopologyParams, DerivationError> {
    config.validate()?;

    let baseline_population = config.baseline_population();
    let profile = config.effective_indegree_profile();
    let base_indegree = profile.within_indegree(baseline_population);
    let inter_indegree = inter_area_indegree(base_indegree, config.num_areas);

    info!(
        "Deriving {} areas: N0 = {}, K0 = {} ({:?}), inter-area in-degree = {:?}",
        config.num_areas, baseline_population, base_indegree, profile, inter_indegree
    );

    let sampler = if config.unbalanced_network_sigma > 0.0 {
        Some(AreaSizeSampler::new(
            baseline_population,
            config.unbalanced_network_sigma,
            base_indegree,
            config.population_limit(),
        )?)
    } else {
        None
    };

    let mut areas = Vec::with_capacity(config.num_areas);
    for index in 0..config.num_areas {
        let id = AreaId(index);
        let overridden = config
            .area_overrides
            .iter()
            .rev()
            .find(|o| o.area == index)
            .map(|o| o.total_neurons);

        let total_neurons = match (overridden, &sampler) {
            (Some(total), _) => {
                debug!("{} uses a fixed size of {}", id, total);
                total
            }
            (None, Some(sampler)) => sampler.sample(id, rng)?,
            (None, None) => baseline_population,
        };

        let indegree = profile.within_indegree(total_neurons);
        if total_neurons <= indegree {
            return Err(DerivationError::PopulationTooSmall {
                area: id,
                total_neurons,
                indegree,
            });
        }

        info!("{} has size {}", id, total_neurons);
        areas.push(AreaSpec {
            id,
            total_neurons,
            record_count: total_neurons.min(config.record_cap),
        });
    }

    Ok(TopologyParams {
        areas,
        baseline_population,
        base_indegree,
        inter_indegree,
        profile,
    })
}

/// In-degree of each ordered inter-area pair, `K0 / (num_areas - 1)`.
///
/// Only defined when there is more than one area.
pub fn inter_area_indegree(base_indegree: u64, num_areas: usize) -> Option<u64> {
    if num_areas > 1 {
        Some(base_indegree / (num_areas as u64 - 1))
    } else {
        None
    }
}

/// Draws area sizes, redrawing values that cannot support the in-degree.
///
/// Draws at or above `limit` are an error rather than a saturated cast.
#[derive(Debug)]
struct AreaSizeSampler {
    normal: Normal<f64>,
    indegree: u64,
    limit: u64,
}

impl AreaSizeSampler {
    fn new(
        baseline_population: u64,
        sigma: f64,
        indegree: u64,
        limit: u64,
    ) -> Result<Self, DerivationError> {
        let mean = baseline_population as f64;
        let std = sigma * mean;
        let normal = Normal::new(mean, std)
            .map_err(|e| DerivationError::InvalidDistribution(e.to_string()))?;

        // A draw is kept once its integer part exceeds the in-degree
        let acceptance = normal_sf(indegree as f64 + 1.0, mean, std);
        if acceptance < MIN_ACCEPTANCE {
            return Err(DerivationError::PathologicalResampling {
                mean,
                std,
                indegree,
                acceptance,
            });
        }

        Ok(Self { normal, indegree, limit })
    }

    fn sample<R: Rng + ?Sized>(&self, area: AreaId, rng: &mut R) -> Result<u64, DerivationError> {
        for _ in 0..MAX_REDRAW_ATTEMPTS {
            let size = self.normal.sample(rng).trunc();
            if size >= self.limit as f64 {
                return Err(DerivationError::PopulationOverflow {
                    area,
                    size,
                    limit: self.limit,
                });
            }
            if size > self.indegree as f64 {
                return Ok(size as u64);
            }
            debug!(
                "Redrawing size of {}: {} does not exceed in-degree {}",
                area, size, self.indegree
            );
        }
        Err(DerivationError::ResamplingExhausted {
            area,
            attempts: MAX_REDRAW_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AreaOverride, IndegreeProfile};

    fn balanced_config(num_areas: usize) -> GlobalConfig {
        GlobalConfig {
            num_areas,
            unbalanced_network_sigma: 0.0,
            indegree_profile: Some(IndegreeProfile::Fixed { indegree: 5843 }),
            ..GlobalConfig::multi_area()
        }
    }

    #[test]
    fn test_balanced_network_has_identical_areas() {
        let topology = derive_topology(&balanced_config(32)).unwrap();

        assert_eq!(topology.num_areas(), 32);
        assert_eq!(topology.base_indegree, 5843);
        assert_eq!(topology.inter_indegree, Some(188));
        for (index, area) in topology.areas.iter().enumerate() {
            assert_eq!(area.id, AreaId(index));
            assert_eq!(area.total_neurons, 129_068);
            assert_eq!(area.record_count, 10_000);
        }
    }

    #[test]
    fn test_single_area_has_no_inter_indegree() {
        let topology = derive_topology(&balanced_config(1)).unwrap();
        assert_eq!(topology.num_areas(), 1);
        assert_eq!(topology.inter_indegree, None);
        assert_eq!(inter_area_indegree(5843, 1), None);
        assert_eq!(inter_area_indegree(5843, 2), Some(5843));
    }

    #[test]
    fn test_density_profile_scales_with_population() {
        let config = GlobalConfig::ignore_and_fire();
        let topology = derive_topology(&config).unwrap();

        assert_eq!(topology.baseline_population, 80_000);
        assert_eq!(topology.base_indegree, 4_000);
        assert_eq!(topology.areas[0].record_count, 1_000);
    }

    #[test]
    fn test_unbalanced_sizes_are_reproducible() {
        let config = GlobalConfig::multi_area();
        assert_eq!(config.rng_seed, 20);

        let first = derive_topology(&config).unwrap();
        let second = derive_topology(&config).unwrap();
        assert_eq!(first, second);

        let sizes: Vec<u64> = first.areas.iter().map(|a| a.total_neurons).collect();
        assert_eq!(sizes.len(), 32);
        // With sigma = 0.15 the areas differ from each other
        assert!(sizes.iter().any(|&s| s != sizes[0]));

        let reseeded = derive_topology(&GlobalConfig { rng_seed: 21, ..config }).unwrap();
        assert_ne!(first.areas, reseeded.areas);
    }

    #[test]
    fn test_explicit_rng_matches_seeded_derivation() {
        let config = GlobalConfig::multi_area();
        let mut rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
        let threaded = derive_topology_with_rng(&config, &mut rng).unwrap();
        assert_eq!(threaded, derive_topology(&config).unwrap());
    }

    #[test]
    fn test_every_area_supports_its_indegree() {
        // Wide spread forces redraws of small or negative sizes
        let config = GlobalConfig {
            unbalanced_network_sigma: 0.9,
            area_size: 6_000,
            ..GlobalConfig::multi_area()
        };
        let topology = derive_topology(&config).unwrap();
        for area in &topology.areas {
            assert!(area.total_neurons > topology.within_indegree(area));
            assert!(area.record_count <= area.total_neurons);
        }
    }

    #[test]
    fn test_area_override_consumes_no_draw() {
        let mut config = GlobalConfig::multi_area();
        let reference = derive_topology(&config).unwrap();

        config.area_overrides.push(AreaOverride { area: 3, total_neurons: 5_000 });
        let overridden = derive_topology(&config).unwrap();

        assert_eq!(&overridden.areas[..3], &reference.areas[..3]);
        assert_eq!(overridden.areas[3].total_neurons, 5_000);
        assert_eq!(overridden.areas[3].record_count, 5_000);
        // Area 4 takes the draw area 3 would have used
        assert_eq!(overridden.areas[4].total_neurons, reference.areas[3].total_neurons);
    }

    #[test]
    fn test_override_below_indegree_is_rejected() {
        let mut config = GlobalConfig::multi_area();
        config.area_overrides.push(AreaOverride { area: 0, total_neurons: 2_921 });
        assert!(matches!(
            derive_topology(&config),
            Err(DerivationError::PopulationTooSmall { area: AreaId(0), .. })
        ));
    }

    #[test]
    fn test_pathological_sampling_is_detected() {
        // N0 = 1000 is nineteen sigmas below the required in-degree
        let config = GlobalConfig {
            area_size: 1_000,
            unbalanced_network_sigma: 0.1,
            ..GlobalConfig::multi_area()
        };
        let err = derive_topology(&config).unwrap_err();
        assert!(matches!(err, DerivationError::PathologicalResampling { indegree: 2921, .. }));
    }

    #[test]
    fn test_oversized_draw_is_an_error() {
        // Almost every accepted draw lies far beyond u64::MAX / 2
        let config = GlobalConfig {
            num_areas: 2,
            scale: 1e13,
            unbalanced_network_sigma: 1e6,
            ..GlobalConfig::multi_area()
        };
        assert!(matches!(
            derive_topology(&config),
            Err(DerivationError::PopulationOverflow { area: AreaId(0), limit, .. }) if limit == u64::MAX / 2
        ));
    }

    #[test]
    fn test_balanced_population_too_small() {
        let config = GlobalConfig {
            area_size: 1_000,
            unbalanced_network_sigma: 0.0,
            ..GlobalConfig::multi_area()
        };
        assert!(matches!(
            derive_topology(&config),
            Err(DerivationError::PopulationTooSmall { total_neurons: 1_000, indegree: 2_921, .. })
        ));
    }

    #[test]
    fn test_invalid_config_fails_before_derivation() {
        let config = GlobalConfig {
            num_areas: 0,
            ..GlobalConfig::multi_area()
        };
        assert!(matches!(
            derive_topology(&config),
            Err(DerivationError::Config(ValidationError::InvalidNetwork(_)))
        ));
    }
}
