//! Plan consistency checks.
//!
//! This module re-checks an assembled plan against the configuration it was
//! built from before anything is handed to the engine.

use log::warn;

use crate::config::GlobalConfig;
use crate::plan::ConnectivityPlan;

/// Validate an assembled plan against its configuration
///
/// Checks for:
/// - One rule per intra-area class plus one per ordered pair of distinct areas
/// - Every rule referencing a known delay specification
/// - Intra-area delays ending where inter-area delays start (morphological runs)
/// - Incoming in-degree staying within the `2 * K0` budget
///
/// # Arguments
/// * `plan` - The assembled connectivity plan
/// * `config` - The configuration the plan was built from
///
/// # Returns
/// * `Ok(())` if validation succeeds
/// * `Err(String)` with an error message if validation fails
///
/// # Examples
/// ```
/// use multiarea::config::GlobalConfig;
/// use multiarea::plan::build_plan;
/// use multiarea::utils::validation::validate_plan_consistency;
///
/// let config = GlobalConfig { num_areas: 3, ..GlobalConfig::multi_area() };
/// let plan = build_plan(&config).unwrap();
/// assert!(validate_plan_consistency(&plan, &config).is_ok());
/// ```
pub fn validate_plan_consistency(plan: &ConnectivityPlan, config: &GlobalConfig) -> Result<(), String> {
    if plan.num_areas() != config.num_areas {
        return Err(format!(
            "Plan has {} areas but the configuration asks for {}",
            plan.num_areas(),
            config.num_areas
        ));
    }

    let expected = ConnectivityPlan::expected_rule_count(config.num_areas);
    if plan.len() != expected {
        return Err(format!(
            "Plan has {} connection rules, expected {} for {} areas",
            plan.len(),
            expected,
            config.num_areas
        ));
    }

    for rule in plan.rules() {
        if plan.delay(rule).is_none() {
            return Err(format!(
                "Rule {} -> {} references unknown delay {:?}",
                rule.source(),
                rule.target(),
                rule.delay
            ));
        }
    }

    if config.morph_distribution {
        let intra = plan.delays().intra();
        for rule in plan.inter_rules() {
            let Some(inter) = plan.delay(rule) else { continue };
            if intra.upper_bound > inter.lower_bound {
                return Err(format!(
                    "Intra-area delays reach {} ms but {} -> {} starts at {} ms",
                    intra.upper_bound,
                    rule.source(),
                    rule.target(),
                    inter.lower_bound
                ));
            }
        }
    }

    let topology = plan.topology();
    let inter_total = topology.inter_indegree.unwrap_or(0) * (config.num_areas as u64 - 1);
    if inter_total > topology.base_indegree {
        return Err(format!(
            "Inter-area in-degree {} exceeds the budget of {}",
            inter_total, topology.base_indegree
        ));
    }
    let lost = topology.base_indegree - inter_total;
    if config.num_areas > 1 && lost > 0 {
        warn!(
            "Splitting in-degree {} over {} source areas drops {} connections per neuron",
            topology.base_indegree,
            config.num_areas - 1,
            lost
        );
    }

    for area in plan.areas() {
        if area.total_neurons <= topology.within_indegree(area) {
            return Err(format!(
                "{} has {} neurons but an in-degree of {}",
                area.id,
                area.total_neurons,
                topology.within_indegree(area)
            ));
        }
    }

    Ok(())
}
