//! # Parameter Registry Module
//!
//! This module writes the derived parameters of a run to disk so downstream
//! tooling (engine runners, analysis scripts) can read them without
//! re-deriving anything.
//!
//! ## Files
//!
//! **Parameter dictionary** (`parameter_dict.json`):
//! - The full configuration the plan was derived from
//! - Every area with its population and record count
//! - The in-degree budget and the delay specifications
//! - Every connection rule in submission order
//!
//! **Plan summary** (`plan_summary.txt`):
//! - Human-readable overview of the same data, one line per area
//!
//! **Run report** (`run_report.json`):
//! - Sizes and per-phase timings of a finished run
//!
//! **Engine manifest** (`engine_manifest.json`):
//! - Every call issued against the engine, for a downstream runner to replay
//!
//! ## Example Parameter Dictionary
//!
//! ```json
//! {
//!   "generated_at": "2026-01-01T00:00:00+00:00",
//!   "network": { "num_areas": 2, "scale": 0.01, "...": "..." },
//!   "simulation": { "dt": 0.1, "...": "..." },
//!   "plan": {
//!     "topology": {
//!       "areas": [{ "id": 0, "total_neurons": 1291, "record_count": 1000 }],
//!       "baseline_population": 1291,
//!       "base_indegree": 65,
//!       "inter_indegree": 65
//!     },
//!     "rules": [{ "class": "intra_area", "area": 0, "indegree": 65, "delay": 0, "long_range": false }]
//!   }
//! }
//! ```

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use crate::config::{Config, GlobalConfig, SimulationConfig};
use crate::driver::RunReport;
use crate::plan::ConnectivityPlan;

/// File name of the parameter dictionary inside the output directory
pub const PARAMETER_DICT_FILE: &str = "parameter_dict.json";

/// File name of the human-readable plan summary
pub const PLAN_SUMMARY_FILE: &str = "plan_summary.txt";

/// File name of the run report
pub const RUN_REPORT_FILE: &str = "run_report.json";

/// File name of the recorded engine calls
pub const ENGINE_MANIFEST_FILE: &str = "engine_manifest.json";

/// Everything derived for one run, as written to `parameter_dict.json`
#[derive(Debug, Serialize)]
pub struct ParameterRegistry<'a> {
    pub generated_at: String,
    pub network: &'a GlobalConfig,
    pub simulation: &'a SimulationConfig,
    pub plan: &'a ConnectivityPlan,
}

impl<'a> ParameterRegistry<'a> {
    pub fn new(config: &'a Config, plan: &'a ConnectivityPlan) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            network: &config.network,
            simulation: &config.simulation,
            plan,
        }
    }
}

/// Serialize `value` as pretty-printed JSON to `path`
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;

    fs::write(path, json)
        .with_context(|| format!("Failed to write JSON to {}", path.display()))?;

    log::info!("Wrote {}", path.display());
    Ok(())
}

/// Write the parameter dictionary of a run.
///
/// # Arguments
/// * `config` - The validated configuration the plan was built from
/// * `plan` - The assembled connectivity plan
/// * `path` - Destination file, usually `<output>/parameter_dict.json`
pub fn write_parameter_registry(config: &Config, plan: &ConnectivityPlan, path: &Path) -> Result<()> {
    write_json(&ParameterRegistry::new(config, plan), path)
}

/// Write the report of a finished run
pub fn write_run_report(report: &RunReport, path: &Path) -> Result<()> {
    write_json(report, path)
}

/// Render a human-readable summary of the plan
pub fn render_plan_summary(config: &Config, plan: &ConnectivityPlan) -> String {
    let topology = plan.topology();
    let delays = plan.delays();
    let mut lines: Vec<String> = Vec::new();

    lines.push("=".repeat(60));
    lines.push("MULTI-AREA NETWORK PARAMETERS".to_string());
    lines.push("=".repeat(60));
    lines.push(format!("Areas: {}", plan.num_areas()));
    lines.push(format!("Scale: {}", config.network.scale));
    lines.push(format!("Baseline population: {}", topology.baseline_population));
    match topology.total_neurons() {
        Some(total) => lines.push(format!("Total neurons: {}", total)),
        None => lines.push("Total neurons: more than u64::MAX".to_string()),
    }
    lines.push(format!("Within-area in-degree: {}", topology.base_indegree));
    match topology.inter_indegree {
        Some(k) => lines.push(format!("Inter-area in-degree: {}", k)),
        None => lines.push("Inter-area in-degree: none (single area)".to_string()),
    }
    lines.push(format!(
        "Distribution: {}",
        if plan.pool().is_some() { "morphological" } else { "flat" }
    ));
    lines.push(String::new());

    lines.push("Delays (mean / std / bounds, ms)".to_string());
    for (label, spec) in [("intra", delays.intra()), ("inter", delays.inter())] {
        lines.push(format!(
            "  {}: {:.3} / {:.3} / [{:.3}, {:.3}]",
            label, spec.mean, spec.std, spec.lower_bound, spec.upper_bound
        ));
    }
    if !delays.pairs().is_empty() {
        lines.push(format!("  {} pair-specific inter-area delays", delays.pairs().len()));
    }
    lines.push(String::new());

    lines.push(format!("{:<10} {:>12} {:>10} {:>10}", "Area", "Neurons", "Recorded", "K_in"));
    lines.push("-".repeat(45));
    for area in plan.areas() {
        lines.push(format!(
            "{:<10} {:>12} {:>10} {:>10}",
            area.id.to_string(),
            area.total_neurons,
            area.record_count,
            plan.incoming_indegree(area.id)
        ));
    }
    lines.push(String::new());
    lines.push(format!("Connection rules: {}", plan.len()));

    lines.join("\n")
}

/// Write the human-readable plan summary
pub fn write_plan_summary(config: &Config, plan: &ConnectivityPlan, path: &Path) -> Result<()> {
    fs::write(path, render_plan_summary(config, plan))
        .with_context(|| format!("Failed to write plan summary to {}", path.display()))?;

    log::info!("Plan summary written to {}", path.display());
    Ok(())
}
