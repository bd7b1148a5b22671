use crate::config::{Config, GlobalConfig};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};
use std::fs::File;
use std::path::Path;

/// Keys accepted by older parameter files and their current names
const LEGACY_NETWORK_KEYS: &[(&str, &str)] = &[
    ("numpy_seed", "rng_seed"),
    ("morph", "morph_distribution"),
    ("N_areas", "num_areas"),
];

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration file {:?}", config_path))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration file {:?}", config_path))?;

    config.validate()?;

    Ok(config)
}

/// Load the network parameters from a flat JSON key-value file.
///
/// Missing keys take the multi-area preset values; the rest of the
/// configuration keeps its defaults.
pub fn load_flat_params(params_path: &Path) -> Result<Config> {
    info!("Loading flat network parameters from: {:?}", params_path);

    let file = File::open(params_path)
        .wrap_err_with(|| format!("Failed to open parameter file {:?}", params_path))?;

    let network: GlobalConfig = serde_json::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse parameter file {:?}", params_path))?;

    let config = Config {
        network,
        ..Config::default()
    };
    config.validate()?;

    Ok(config)
}

/// CLI arguments that can override configuration file settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub num_areas: Option<usize>,
    pub scale: Option<f64>,
    pub rng_seed: Option<u64>,
    pub morph_distribution: Option<bool>,
}

/// Apply CLI overrides to a configuration
pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) -> Result<()> {
    if let Some(num_areas) = overrides.num_areas {
        info!("Overriding num_areas: {} -> {}", config.network.num_areas, num_areas);
        config.network.num_areas = num_areas;
    }

    if let Some(scale) = overrides.scale {
        info!("Overriding scale: {} -> {}", config.network.scale, scale);
        config.network.scale = scale;
    }

    if let Some(seed) = overrides.rng_seed {
        info!("Overriding rng_seed: {} -> {}", config.network.rng_seed, seed);
        config.network.rng_seed = seed;
    }

    if let Some(morph) = overrides.morph_distribution {
        info!(
            "Overriding morph_distribution: {} -> {}",
            config.network.morph_distribution, morph
        );
        config.network.morph_distribution = morph;
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}

/// Warn about keys from older parameter files that are silently ignored
pub fn check_config_compatibility(config_path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(config_path)
        .wrap_err_with(|| format!("Failed to read configuration file {:?}", config_path))?;
    let value: serde_yaml::Value = serde_yaml::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse configuration file {:?}", config_path))?;

    for (old, new) in legacy_keys(&value) {
        warn!(
            "Configuration uses deprecated key '{}', which is ignored; rename it to '{}' \
             or run with --migrate",
            old, new
        );
    }

    Ok(())
}

fn legacy_keys(value: &serde_yaml::Value) -> Vec<(&'static str, &'static str)> {
    let Some(network) = value.get("network").and_then(|n| n.as_mapping()) else {
        return Vec::new();
    };
    LEGACY_NETWORK_KEYS
        .iter()
        .filter(|(old, _)| network.contains_key(*old))
        .copied()
        .collect()
}

/// Migrate an old configuration to the current key names
pub fn migrate_config(old_config_path: &Path, new_config_path: &Path) -> Result<()> {
    info!("Migrating configuration from {:?} to {:?}", old_config_path, new_config_path);

    let content = std::fs::read_to_string(old_config_path)
        .wrap_err_with(|| format!("Failed to read configuration file {:?}", old_config_path))?;
    let mut value: serde_yaml::Value = serde_yaml::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse configuration file {:?}", old_config_path))?;

    let mut renamed = 0;
    if let Some(network) = value.get_mut("network").and_then(|n| n.as_mapping_mut()) {
        for (old, new) in LEGACY_NETWORK_KEYS {
            if let Some(v) = network.remove(*old) {
                if network.contains_key(*new) {
                    warn!("Both '{}' and '{}' are set; keeping '{}'", old, new, new);
                } else {
                    network.insert((*new).into(), v);
                    renamed += 1;
                }
            }
        }
    }

    let new_content = serde_yaml::to_string(&value)?;
    std::fs::write(new_config_path, new_content)
        .wrap_err_with(|| format!("Failed to write migrated configuration {:?}", new_config_path))?;

    if renamed > 0 {
        info!("Migration complete: renamed {} deprecated keys", renamed);
    } else {
        info!("Migration complete: configuration was already compatible");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
general:
  log_level: warn
network:
  num_areas: 2
  scale: 0.01
simulation:
  simtime: "500ms"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.network.num_areas, 2);
        assert_eq!(config.general.log_level.as_deref(), Some("warn"));
        assert_eq!(config.simulation.simtime_ms(), 500.0);
    }

    #[test]
    fn test_load_invalid_config() {
        let yaml = r#"
network:
  num_areas: 0
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("num_areas"));
    }

    #[test]
    fn test_load_flat_params() {
        let json = r#"{
  "num_areas": 4,
  "scale": 0.5,
  "area_size": 80000,
  "morph_distribution": false,
  "unbalanced_network_sigma": 0.0,
  "delay_mean_intra": null,
  "delay_mean_inter": null
}"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", json).unwrap();

        let config = load_flat_params(temp_file.path()).unwrap();
        assert_eq!(config.network.num_areas, 4);
        assert_eq!(config.network.baseline_population(), 40_000);
        assert!(config.network.effective_indegree_profile().is_density());
        assert_eq!(config.network.delay_mean_intra, None);
        // Keys absent from the file keep the preset values
        assert_eq!(config.network.rng_seed, 20);
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();

        let overrides = CliOverrides {
            num_areas: Some(8),
            scale: Some(0.1),
            rng_seed: Some(7),
            morph_distribution: None,
        };
        apply_overrides(&mut config, &overrides).unwrap();

        assert_eq!(config.network.num_areas, 8);
        assert_eq!(config.network.scale, 0.1);
        assert_eq!(config.network.rng_seed, 7);
        assert!(config.network.morph_distribution);

        let bad = CliOverrides {
            num_areas: Some(0),
            ..CliOverrides::default()
        };
        assert!(apply_overrides(&mut config, &bad).is_err());
    }

    #[test]
    fn test_legacy_keys_are_detected_and_migrated() {
        let yaml = r#"
network:
  num_areas: 2
  numpy_seed: 42
  morph: false
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            legacy_keys(&value),
            vec![("numpy_seed", "rng_seed"), ("morph", "morph_distribution")]
        );
        check_config_compatibility(temp_file.path()).unwrap();

        let migrated = NamedTempFile::new().unwrap();
        migrate_config(temp_file.path(), migrated.path()).unwrap();

        let config = load_config(migrated.path()).unwrap();
        assert_eq!(config.network.rng_seed, 42);
        assert!(!config.network.morph_distribution);
        assert_eq!(config.network.num_areas, 2);
    }
}
