//! Connectivity plan assembly.

use log::{debug, info};

use crate::config::GlobalConfig;
use crate::delay::{build_delay_table, DelayError, DelayTable};
use crate::plan::types::{ConnectionClass, ConnectionRule, ConnectivityPlan};
use crate::topology::{derive_topology, DerivationError, NeuronPool, TopologyParams};

/// Errors raised while building a connectivity plan
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlanError {
    #[error("Topology derivation failed: {0}")]
    Derivation(#[from] DerivationError),

    #[error("Delay distribution setup failed: {0}")]
    Delay(#[from] DelayError),

    #[error("Configuration asks for {expected} areas but the topology has {found}")]
    AreaCountMismatch { expected: usize, found: usize },

    #[error("A neuron pool of {num_areas} areas with {slots_per_area} slots each exceeds u64::MAX")]
    PoolTooLarge { num_areas: usize, slots_per_area: u64 },
}

/// Derive the topology and delays from `config` and assemble the plan.
///
/// # Examples
/// ```
/// use multiarea::config::GlobalConfig;
/// use multiarea::plan::build_plan;
///
/// let config = GlobalConfig { num_areas: 4, ..GlobalConfig::multi_area() };
/// let plan = build_plan(&config).unwrap();
/// assert_eq!(plan.len(), 4 + 4 * 3);
/// ```
pub fn build_plan(config: &GlobalConfig) -> Result<ConnectivityPlan, PlanError> {
    let topology = derive_topology(config)?;
    let delays = build_delay_table(config)?;
    assemble_plan(config, topology, delays)
}

/// Assemble the ordered connection rules of a run.
///
/// Intra-area rules come first, in area order. Inter-area rules follow with
/// the presynaptic area in the outer loop and the postsynaptic area in the
/// inner loop, skipping `pre == post`.
///
/// # Arguments
/// * `config` - The global network configuration the inputs were derived from
/// * `topology` - Derived areas and in-degree budget
/// * `delays` - Delay specifications of every connection class
pub fn assemble_plan(
    config: &GlobalConfig,
    topology: TopologyParams,
    delays: DelayTable,
) -> Result<ConnectivityPlan, PlanError> {
    if topology.num_areas() != config.num_areas {
        return Err(PlanError::AreaCountMismatch {
            expected: config.num_areas,
            found: topology.num_areas(),
        });
    }

    let mut rules = Vec::with_capacity(ConnectivityPlan::expected_rule_count(config.num_areas));

    for area in &topology.areas {
        let rule = ConnectionRule {
            class: ConnectionClass::IntraArea { area: area.id },
            indegree: topology.within_indegree(area),
            delay: delays.intra_id(),
            long_range: false,
        };
        debug!("Planned {} -> {} with in-degree {}", area.id, area.id, rule.indegree);
        rules.push(rule);
    }

    if let Some(inter_indegree) = topology.inter_indegree {
        for pre in &topology.areas {
            for post in &topology.areas {
                if pre.id == post.id {
                    continue;
                }
                rules.push(ConnectionRule {
                    class: ConnectionClass::InterArea { pre: pre.id, post: post.id },
                    indegree: inter_indegree,
                    delay: delays.inter_for(pre.id, post.id),
                    long_range: config.morph_distribution,
                });
            }
        }
    }

    let pool = if config.morph_distribution {
        let pool = NeuronPool::new(&topology).ok_or(PlanError::PoolTooLarge {
            num_areas: topology.num_areas(),
            slots_per_area: topology.max_area_population(),
        })?;
        Some(pool)
    } else {
        None
    };
    if let Some(pool) = &pool {
        info!(
            "Neuron pool of {} slots ({} frozen) for {} areas",
            pool.size(),
            pool.frozen_count(),
            pool.num_areas()
        );
    }

    info!(
        "Assembled {} connection rules over {} areas",
        rules.len(),
        topology.num_areas()
    );

    Ok(ConnectivityPlan {
        topology,
        delays,
        rules,
        pool,
    })
}
