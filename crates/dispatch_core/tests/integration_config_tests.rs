use std::io::Write;

use dispatch_core::config::{ConfigError, DispatchConfig, MatchingPolicy};
use dispatch_core::dispatcher::Dispatcher;

#[test]
fn loads_partial_toml_over_defaults() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"
seed = 9

[matching]
policy = "global_nearest"

[movement]
step_size = 2.5
tick_interval_ms = 250

[reinforcement]
fleet_cap = 12
"#
    )
    .expect("write config");

    let config = DispatchConfig::from_toml_file(file.path()).expect("load");
    assert_eq!(config.seed, Some(9));
    assert_eq!(config.matching.policy, MatchingPolicy::GlobalNearest);
    assert_eq!(config.matching.coverage_radius, 20.0);
    assert_eq!(config.movement.step_size, 2.5);
    assert_eq!(config.movement.sim_minutes_per_tick, 20);
    assert_eq!(config.reinforcement.fleet_cap, 12);
    assert_eq!(config.reinforcement.queue_threshold, 5);
    assert_eq!(config.ledger.commission_rate, 0.2);

    let dispatcher = Dispatcher::new(config).expect("dispatcher");
    assert_eq!(dispatcher.settings().tick_interval_ms, 250);
}

#[test]
fn missing_file_reports_the_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("absent.toml");
    let err = DispatchConfig::from_toml_file(&path).unwrap_err();
    match err {
        ConfigError::Io { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[test]
fn rejects_malformed_and_invalid_values() {
    assert!(matches!(
        DispatchConfig::from_toml_str("[movement]\nstep_size = \"fast\""),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        DispatchConfig::from_toml_str("[movement]\nstep_size = 0.0"),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        DispatchConfig::from_toml_str("[ledger]\ncommission_rate = 1.5"),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn snapshot_serializes_to_json() {
    let dispatcher = Dispatcher::new(DispatchConfig::default().with_seed(1)).expect("dispatcher");
    dispatcher.register_worker("Prius", "ABC-1").expect("register");
    let json = serde_json::to_value(dispatcher.snapshot()).expect("json");
    assert_eq!(json["clock_label"], "Day 1 00:00");
    assert_eq!(json["workers"][0]["state"], "FREE");
    assert_eq!(json["settings"]["active"], true);
    assert_eq!(json["counts"]["workers_free"], 1);
}
