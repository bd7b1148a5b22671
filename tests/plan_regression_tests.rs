#[cfg(test)]
mod plan_regression_tests {
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use multiarea::config::{GlobalConfig, IndegreeProfile};
    use multiarea::config_loader::{apply_overrides, load_config, CliOverrides};
    use multiarea::driver::run_simulation;
    use multiarea::engine::{EngineCall, ManifestEngine};
    use multiarea::plan::{build_plan, ConnectionClass};
    use multiarea::registry::{write_parameter_registry, write_run_report, PARAMETER_DICT_FILE, RUN_REPORT_FILE};
    use multiarea::topology::{derive_topology, AreaId};
    use multiarea::utils::validation::validate_plan_consistency;

    fn uniform_macaque(num_areas: usize) -> GlobalConfig {
        GlobalConfig {
            area_size: 129_068,
            scale: 1.0,
            num_areas,
            unbalanced_network_sigma: 0.0,
            indegree_profile: Some(IndegreeProfile::Fixed { indegree: 5843 }),
            ..GlobalConfig::multi_area()
        }
    }

    /// 32 identical macaque-sized areas with the uniform 5843 in-degree
    #[test]
    fn test_uniform_macaque_network() {
        let plan = build_plan(&uniform_macaque(32)).unwrap();

        assert_eq!(plan.num_areas(), 32);
        for area in plan.areas() {
            assert_eq!(area.total_neurons, 129_068);
            assert_eq!(area.record_count, 10_000);
        }
        assert_eq!(plan.topology().inter_indegree, Some(188));
        assert!(plan.inter_rules().all(|r| r.indegree == 188));
        assert_eq!(plan.len(), 32 + 32 * 31);
    }

    #[test]
    fn test_single_area_network() {
        let plan = build_plan(&uniform_macaque(1)).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.rules()[0].class, ConnectionClass::IntraArea { area: AreaId(0) });
        assert_eq!(plan.topology().inter_indegree, None);
    }

    #[test]
    fn test_unbalanced_sizes_are_reproducible() {
        let config = GlobalConfig {
            num_areas: 32,
            unbalanced_network_sigma: 0.15,
            rng_seed: 20,
            ..GlobalConfig::multi_area()
        };

        let first: Vec<u64> = derive_topology(&config)
            .unwrap()
            .areas
            .iter()
            .map(|a| a.total_neurons)
            .collect();
        let second: Vec<u64> = derive_topology(&config)
            .unwrap()
            .areas
            .iter()
            .map(|a| a.total_neurons)
            .collect();

        assert_eq!(first.len(), 32);
        assert_eq!(first, second);
        // Sizes actually vary around the baseline
        assert!(first.iter().any(|&n| n != first[0]));

        let reseeded = derive_topology(&GlobalConfig { rng_seed: 21, ..config }).unwrap();
        let third: Vec<u64> = reseeded.areas.iter().map(|a| a.total_neurons).collect();
        assert_ne!(first, third);
    }

    #[test]
    fn test_every_area_supports_its_own_indegree() {
        for sigma in [0.0, 0.15, 0.5] {
            let config = GlobalConfig {
                num_areas: 16,
                scale: 0.05,
                unbalanced_network_sigma: sigma,
                ..GlobalConfig::multi_area()
            };
            let plan = build_plan(&config).unwrap();
            for area in plan.areas() {
                assert!(area.total_neurons > plan.topology().within_indegree(area));
            }
            assert!(validate_plan_consistency(&plan, &config).is_ok());
        }
    }

    #[test]
    fn test_incoming_budget_independent_of_area_count() {
        for num_areas in [1, 2, 4, 9, 32] {
            let plan = build_plan(&uniform_macaque(num_areas)).unwrap();
            let budget = 2 * 5843u64;
            for area in plan.areas() {
                let incoming = plan.incoming_indegree(area.id);
                if num_areas == 1 {
                    assert_eq!(incoming, 5843);
                } else {
                    assert!(incoming <= budget);
                    assert!(budget - incoming < num_areas as u64);
                }
            }
        }
    }

    #[test]
    fn test_delay_classes_do_not_overlap() {
        let plan = build_plan(&GlobalConfig::multi_area()).unwrap();
        let intra = plan.delays().intra();
        for rule in plan.inter_rules() {
            assert!(intra.upper_bound <= plan.delay(rule).unwrap().lower_bound);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1_000 {
            let d = intra.sample(&mut rng).unwrap();
            assert!(d >= intra.lower_bound && d <= intra.upper_bound);
            let d = plan.delays().inter().sample(&mut rng).unwrap();
            assert!(d >= plan.delays().inter().lower_bound && d <= plan.delays().inter().upper_bound);
        }
    }

    #[test]
    fn test_plan_determinism() {
        let config = GlobalConfig::multi_area();
        assert_eq!(build_plan(&config).unwrap(), build_plan(&config).unwrap());
    }

    #[test]
    fn test_end_to_end_run() {
        let yaml = r#"
network:
  num_areas: 4
  scale: 0.02
  unbalanced_network_sigma: 0.1
  indegree_profile:
    kind: fixed
    indegree: 200
simulation:
  presimtime: "50ms"
  simtime: "200ms"
  record_spikes: true
"#;
        let mut config_file = NamedTempFile::new().unwrap();
        write!(config_file, "{}", yaml).unwrap();

        let mut config = load_config(config_file.path()).unwrap();
        apply_overrides(&mut config, &CliOverrides { rng_seed: Some(3), ..CliOverrides::default() }).unwrap();

        let plan = build_plan(&config.network).unwrap();
        validate_plan_consistency(&plan, &config.network).unwrap();

        let mut engine = ManifestEngine::single_process();
        let report = run_simulation(&config, &plan, &mut engine).unwrap();

        let pool_size = plan.pool().unwrap().size();
        // Pool plus the spike recorder
        assert_eq!(report.network_size, pool_size + 1);
        assert_eq!(report.recorded_neurons, Some(plan.areas()[0].record_count));
        assert_eq!(engine.simulated_ms(), 250.0);

        let connects: Vec<(u64, bool)> = engine
            .calls()
            .iter()
            .filter_map(|c| match c {
                EngineCall::Connect { rule, .. } => {
                    let multiarea::engine::RuleSpec::FixedIndegree { indegree, long_range } = *rule;
                    Some((indegree, long_range))
                }
                _ => None,
            })
            .collect();
        let planned: Vec<(u64, bool)> = plan.rules().iter().map(|r| (r.indegree, r.long_range)).collect();
        assert_eq!(connects, planned);

        let dir = TempDir::new().unwrap();
        write_parameter_registry(&config, &plan, &dir.path().join(PARAMETER_DICT_FILE)).unwrap();
        write_run_report(&report, &dir.path().join(RUN_REPORT_FILE)).unwrap();

        let dict: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(PARAMETER_DICT_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(dict["network"]["rng_seed"], 3);
        assert_eq!(dict["plan"]["rules"].as_array().unwrap().len(), 16);

        let run: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(RUN_REPORT_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(run["num_areas"], 4);
        assert_eq!(run["num_connections"], report.num_connections);
    }
}
