//! Simulation driver.
//!
//! This module coordinates a run against the external engine: kernel setup,
//! population creation, connection of every plan rule in plan order,
//! pre-simulation, spike recorder attachment and the main simulation.

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{debug, info};
use serde::Serialize;
use std::time::Instant;

use crate::config::Config;
use crate::engine::{
    EngineError, KernelSettings, ModelParams, PhaseSpec, PopulationHandle, RuleSpec,
    SimulationEngine, SynapseSpec,
};
use crate::plan::ConnectivityPlan;

/// Timings and sizes of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub num_areas: usize,
    pub network_size: u64,
    pub num_connections: u64,
    /// Wall-clock seconds spent in each phase
    pub time_kernel_prepare: f64,
    pub time_create: f64,
    pub time_connect: f64,
    pub time_presimulate: f64,
    pub time_simulate: f64,
    /// Number of neurons spikes were recorded from, if recording was enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_neurons: Option<u64>,
}

/// Kernel settings derived from the configuration
pub fn kernel_settings(config: &Config) -> KernelSettings {
    let network = &config.network;
    KernelSettings {
        total_num_virtual_procs: config.simulation.num_virtual_procs(),
        resolution: config.simulation.dt,
        min_delay: network.min_delay,
        max_delay: network.max_delay,
        rng_seed: config.simulation.engine_seed,
        threshold_delay: network.morph_distribution.then_some(network.threshold_delay),
    }
}

/// Neuron parameters: configured rate, phase drawn uniformly from `[0, 1)`
pub fn model_params(config: &Config) -> ModelParams {
    ModelParams {
        rate: config.simulation.rate,
        phase: PhaseSpec::Uniform { low: 0.0, high: 1.0 },
    }
}

/// Build the plan's network on `engine` and simulate it.
///
/// Aborts with [`EngineError::InsufficientLocalPopulation`] when spike
/// recording is requested but the first area has fewer local neurons than
/// its record count. The plan is already committed to the engine by then.
pub fn run_simulation<E: SimulationEngine>(
    config: &Config,
    plan: &ConnectivityPlan,
    engine: &mut E,
) -> Result<RunReport> {
    let t0 = Instant::now();
    engine
        .configure_kernel(&kernel_settings(config))
        .wrap_err("Failed to configure the engine kernel")?;
    let time_kernel_prepare = t0.elapsed().as_secs_f64();

    let t1 = Instant::now();
    let populations = create_populations(config, plan, engine)
        .wrap_err("Failed to create area populations")?;
    let recorder = if config.simulation.record_spikes {
        Some(engine.create_recorder().wrap_err("Failed to create spike recorder")?)
    } else {
        None
    };
    let time_create = t1.elapsed().as_secs_f64();

    let t2 = Instant::now();
    connect_plan(plan, engine, &populations).wrap_err("Failed to connect areas")?;
    let time_connect = t2.elapsed().as_secs_f64();

    let t3 = Instant::now();
    engine
        .simulate(config.simulation.presimtime_ms())
        .wrap_err("Pre-simulation failed")?;
    let time_presimulate = t3.elapsed().as_secs_f64();

    let recorded_neurons = match recorder {
        Some(recorder) => Some(
            record_first_area(plan, engine, &populations, recorder)
                .wrap_err("Failed to attach spike recorder")?,
        ),
        None => None,
    };

    let t4 = Instant::now();
    engine
        .simulate(config.simulation.simtime_ms())
        .wrap_err("Simulation failed")?;
    let time_simulate = t4.elapsed().as_secs_f64();

    let report = RunReport {
        timestamp: chrono::Utc::now().to_rfc3339(),
        num_areas: plan.num_areas(),
        network_size: engine.network_size(),
        num_connections: engine.num_connections(),
        time_kernel_prepare,
        time_create,
        time_connect,
        time_presimulate,
        time_simulate,
        recorded_neurons,
    };
    info!(
        "Run finished: {} nodes, {} connections, create {:.3}s, connect {:.3}s, simulate {:.3}s",
        report.network_size,
        report.num_connections,
        report.time_create,
        report.time_connect,
        report.time_simulate
    );
    Ok(report)
}

/// Create one population per area, in area order.
///
/// Morphological runs create the shared pool, freeze all of it, then slice
/// out and unfreeze each area's strided share.
pub fn create_populations<E: SimulationEngine>(
    config: &Config,
    plan: &ConnectivityPlan,
    engine: &mut E,
) -> std::result::Result<Vec<PopulationHandle>, EngineError> {
    let model = config.simulation.neuron_model.as_str();
    let params = model_params(config);

    match plan.pool() {
        Some(pool) => {
            info!("Creating pool of {} neurons for {} areas", pool.size(), pool.num_areas());
            let all_neurons = engine.create(model, pool.size(), &params)?;
            engine.set_frozen(all_neurons, true)?;

            let mut populations = Vec::with_capacity(plan.num_areas());
            for area in plan.areas() {
                let slice = pool.area_slice(area.id).ok_or_else(|| {
                    EngineError::Call(format!("{} is missing from the neuron pool", area.id))
                })?;
                let neurons = engine.slice(all_neurons, slice.offset, slice.stride, slice.count)?;
                engine.set_frozen(neurons, false)?;
                debug!("Activated {} neurons of {}", slice.count, area.id);
                populations.push(neurons);
            }
            Ok(populations)
        }
        None => plan
            .areas()
            .iter()
            .map(|area| {
                debug!("Creating {} with {} neurons", area.id, area.total_neurons);
                engine.create(model, area.total_neurons, &params)
            })
            .collect(),
    }
}

/// Submit every rule of the plan, in plan order
pub fn connect_plan<E: SimulationEngine>(
    plan: &ConnectivityPlan,
    engine: &mut E,
    populations: &[PopulationHandle],
) -> std::result::Result<(), EngineError> {
    let population = |area: crate::topology::AreaId| {
        populations
            .get(area.index())
            .copied()
            .ok_or_else(|| EngineError::Call(format!("no population created for {}", area)))
    };

    for rule in plan.rules() {
        let delay = plan
            .delay(rule)
            .ok_or_else(|| EngineError::Call(format!("unknown delay {:?}", rule.delay)))?;
        engine.connect(
            population(rule.source())?,
            population(rule.target())?,
            &RuleSpec::FixedIndegree {
                indegree: rule.indegree,
                long_range: rule.long_range,
            },
            &SynapseSpec::silent(*delay),
        )?;
        debug!("Connected {} to {}", rule.source(), rule.target());
    }
    Ok(())
}

/// Attach the recorder to the first `record_count` neurons of the first area
fn record_first_area<E: SimulationEngine>(
    plan: &ConnectivityPlan,
    engine: &mut E,
    populations: &[PopulationHandle],
    recorder: PopulationHandle,
) -> std::result::Result<u64, EngineError> {
    let (area, &population) = plan
        .areas()
        .first()
        .zip(populations.first())
        .ok_or_else(|| EngineError::Call("no area to record from".to_string()))?;

    let local = engine.local_population(population)?;
    if local < area.record_count {
        return Err(EngineError::InsufficientLocalPopulation {
            area: area.id.to_string(),
            local,
            requested: area.record_count,
        });
    }

    info!("Connecting spike recorder to {} neurons of {}", area.record_count, area.id);
    engine.record(population, area.record_count, recorder)?;
    Ok(area.record_count)
}
