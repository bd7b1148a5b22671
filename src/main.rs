use clap::{Parser, ValueEnum};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn, LevelFilter};
use std::fs;
use std::path::PathBuf;

use multiarea::config::{Config, GlobalConfig};
use multiarea::config_loader::{self, CliOverrides};
use multiarea::driver::run_simulation;
use multiarea::engine::ManifestEngine;
use multiarea::plan::build_plan;
use multiarea::registry::{
    self, ENGINE_MANIFEST_FILE, PARAMETER_DICT_FILE, PLAN_SUMMARY_FILE, RUN_REPORT_FILE,
};
use multiarea::utils::validation::validate_plan_consistency;

/// Built-in parameter sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    /// 32 unbalanced areas with morphological distribution
    MultiArea,
    /// A single balanced ignore-and-fire area
    IgnoreAndFire,
}

impl Preset {
    fn config(self) -> Config {
        let network = match self {
            Preset::MultiArea => GlobalConfig::multi_area(),
            Preset::IgnoreAndFire => GlobalConfig::ignore_and_fire(),
        };
        Config {
            network,
            ..Config::default()
        }
    }
}

/// Parameter derivation and run driver for multi-area spiking network benchmarks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration YAML file
    #[arg(short, long, conflicts_with = "params")]
    config: Option<PathBuf>,

    /// Path to a flat JSON file of network parameters
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// Preset used when neither a configuration nor a parameter file is given
    #[arg(long, value_enum, default_value = "multi-area")]
    preset: Preset,

    /// Output directory for the parameter dictionary and run artifacts
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the number of areas
    #[arg(long)]
    num_areas: Option<usize>,

    /// Override the network scale
    #[arg(long)]
    scale: Option<f64>,

    /// Override the area size sampling seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the morphological distribution flag
    #[arg(long)]
    morph: Option<bool>,

    /// Only derive and write the parameters, skip the engine run
    #[arg(long)]
    plan_only: bool,

    /// Migrate the configuration file to current key names
    #[arg(long, requires = "config")]
    migrate: bool,

    /// Output path for the migrated configuration
    #[arg(long, requires = "migrate")]
    migrate_output: Option<PathBuf>,
}

/// Level named by `general.log_level`, `info` when unset or unparsable
fn config_log_level(config: &Config) -> LevelFilter {
    match config.general.log_level.as_deref() {
        None => LevelFilter::Info,
        Some(level) => level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level '{}', using info", level);
            LevelFilter::Info
        }),
    }
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            num_areas: self.num_areas,
            scale: self.scale,
            rng_seed: self.seed,
            morph_distribution: self.morph,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    // The filter admits everything so the configured level can lower the cap later
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::from_env(Env::default().default_filter_or("trace")).init();
    if !rust_log_set {
        log::set_max_level(LevelFilter::Info);
    }

    if args.migrate {
        let config_path = args
            .config
            .clone()
            .ok_or_else(|| eyre!("--migrate needs --config"))?;
        let output_path = args.migrate_output.clone().unwrap_or_else(|| {
            let mut path = config_path.clone();
            path.set_extension("migrated.yaml");
            path
        });
        config_loader::migrate_config(&config_path, &output_path)?;
        info!("Configuration migrated successfully to: {:?}", output_path);
        return Ok(());
    }

    let mut config = match (&args.config, &args.params) {
        (Some(path), _) => config_loader::load_config(path)?,
        (None, Some(path)) => config_loader::load_flat_params(path)?,
        (None, None) => args.preset.config(),
    };
    config_loader::apply_overrides(&mut config, &args.overrides())?;

    if !rust_log_set {
        log::set_max_level(config_log_level(&config));
    }

    info!("Starting multiarea parameter derivation");
    match (&args.config, &args.params) {
        (Some(path), _) => {
            info!("Configuration file: {:?}", path);
            config_loader::check_config_compatibility(path)?;
        }
        (None, Some(path)) => info!("Parameter file: {:?}", path),
        (None, None) => info!("Using preset {:?}", args.preset),
    }

    let output_dir = args
        .output
        .clone()
        .or_else(|| config.general.output_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("multiarea_output"));
    info!("Output directory: {:?}", output_dir);

    let plan = build_plan(&config.network).wrap_err("Failed to build connectivity plan")?;
    if let Err(msg) = validate_plan_consistency(&plan, &config.network) {
        return Err(eyre!("Connectivity plan is inconsistent: {}", msg));
    }

    fs::create_dir_all(&output_dir)
        .wrap_err_with(|| format!("Failed to create output directory '{}'", output_dir.display()))?;

    registry::write_parameter_registry(&config, &plan, &output_dir.join(PARAMETER_DICT_FILE))?;
    registry::write_plan_summary(&config, &plan, &output_dir.join(PLAN_SUMMARY_FILE))?;

    if args.plan_only {
        info!("Plan written, skipping the engine run");
        return Ok(());
    }

    if config.simulation.num_processes > 1 {
        warn!(
            "Recording the engine calls of rank 0 out of {} processes",
            config.simulation.num_processes
        );
    }
    let mut engine = ManifestEngine::new(config.simulation.num_processes as u64, 0);
    let result = run_simulation(&config, &plan, &mut engine);

    // The manifest is kept even for aborted runs
    registry::write_json(&engine.manifest(), &output_dir.join(ENGINE_MANIFEST_FILE))?;
    let report = result?;
    registry::write_run_report(&report, &output_dir.join(RUN_REPORT_FILE))?;

    info!("Run completed successfully");
    Ok(())
}
