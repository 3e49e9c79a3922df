use std::path::Path;

use rover_core::config::{EngineConfig, StrategyConfig};
use rover_core::{ConfigError, Direction};

#[test]
fn shipped_config_matches_four_sensor_preset() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/four_sensor.json");
    let config = EngineConfig::from_path(&path).expect("shipped config loads");
    assert_eq!(config, EngineConfig::four_sensor());
}

#[test]
fn missing_file_is_an_io_error() {
    let result = EngineConfig::from_path("does/not/exist.json");
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn custom_thresholds_override_defaults_per_side() {
    let raw = r#"{
        "directions": ["front", "back", "left", "right"],
        "strategy": { "kind": "threshold_nearest", "thresholds": { "left": 25.0 } }
    }"#;
    let config = EngineConfig::from_json_str(raw).expect("valid config");
    let StrategyConfig::ThresholdNearest { thresholds } = config.strategy else {
        panic!("expected threshold_nearest");
    };
    assert_eq!(thresholds.get(Direction::Left), 25.0);
    assert_eq!(thresholds.get(Direction::Front), 50.0);
}
