//! Engine configuration.
//!
//! Everything that used to be a pin-level constant on the car (direction set, thresholds, turn
//! duration, sampling pace) lives here and is handed to the engine at construction. Configs are
//! plain serde structs so they can be loaded from JSON; the presets mirror the sensor layouts the
//! rover has been built with.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::Rotation;
use crate::error::ConfigError;
use crate::Direction;

/// Complete configuration for one [`crate::Engine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Active sensor directions; each gets its own poller and queue.
    pub directions: Vec<Direction>,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub fault: FaultConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub actuation: ActuationConfig,
}

/// Which arbitration policy to run, with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Per-direction danger thresholds; evade the nearest breach.
    ThresholdNearest {
        #[serde(default)]
        thresholds: Thresholds,
    },
    /// One global threshold; evade the globally nearest obstacle.
    GlobalMinimum {
        #[serde(default = "default_global_threshold")]
        threshold_cm: f64,
    },
    /// Front/back only; drive toward the side with more room.
    Differential,
}

fn default_global_threshold() -> f64 {
    100.0
}

/// Danger thresholds in centimeters. A direction breaches when it reads below its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub front: f64,
    pub back: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            front: 50.0,
            back: 50.0,
            left: 15.0,
            right: 15.0,
        }
    }
}

impl Thresholds {
    pub fn get(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Front => self.front,
            Direction::Back => self.back,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }
}

/// Near-zero fault detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Readings below this are treated as echo timeouts.
    pub threshold_cm: f64,
    /// Consecutive all-faulted cycles before re-stabilization; `None` disables the check.
    pub countdown: Option<u32>,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            threshold_cm: 1.0,
            countdown: Some(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Pause after each measurement.
    pub interval_ms: u64,
    /// Extra start delay per poller, multiplied by the poller's position in `directions`.
    pub stagger_ms: u64,
    /// Bound of each per-direction queue.
    pub queue_capacity: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            stagger_ms: 0,
            queue_capacity: 3,
        }
    }
}

impl SamplingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

/// How turns are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStyle {
    /// Both channels, opposite senses.
    Pivot,
    /// Outer channel forward, inner channel held stopped.
    SingleChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuationConfig {
    /// Physical sense that moves the rover forward.
    pub forward: Rotation,
    pub turn_style: TurnStyle,
    /// How long a turn is held before the explicit stop.
    pub turn_ms: u64,
    /// Front-light pulses when the engine starts.
    pub startup_blinks: u32,
    /// Pause between the startup announcement and the first decision.
    pub startup_pause_ms: u64,
}

impl Default for ActuationConfig {
    fn default() -> Self {
        Self {
            forward: Rotation::CounterClockwise,
            turn_style: TurnStyle::SingleChannel,
            turn_ms: 100,
            startup_blinks: 3,
            startup_pause_ms: 1000,
        }
    }
}

impl ActuationConfig {
    pub fn turn_duration(&self) -> Duration {
        Duration::from_millis(self.turn_ms)
    }

    pub fn startup_pause(&self) -> Duration {
        Duration::from_millis(self.startup_pause_ms)
    }
}

impl EngineConfig {
    /// Front, left and right sensors with asymmetric thresholds.
    pub fn three_sensor() -> Self {
        Self {
            directions: vec![Direction::Front, Direction::Left, Direction::Right],
            strategy: StrategyConfig::ThresholdNearest {
                thresholds: Thresholds::default(),
            },
            fault: FaultConfig::default(),
            sampling: SamplingConfig::default(),
            actuation: ActuationConfig::default(),
        }
    }

    /// All four sides, global threshold, denser staggered sampling.
    pub fn four_sensor() -> Self {
        Self {
            directions: Direction::ALL.to_vec(),
            strategy: StrategyConfig::GlobalMinimum {
                threshold_cm: default_global_threshold(),
            },
            fault: FaultConfig::default(),
            sampling: SamplingConfig {
                interval_ms: 200,
                stagger_ms: 50,
                queue_capacity: 3,
            },
            actuation: ActuationConfig {
                turn_style: TurnStyle::Pivot,
                ..ActuationConfig::default()
            },
        }
    }

    /// Front and back only, no turning, no fault countdown.
    pub fn two_sensor() -> Self {
        Self {
            directions: vec![Direction::Front, Direction::Back],
            strategy: StrategyConfig::Differential,
            fault: FaultConfig {
                countdown: None,
                ..FaultConfig::default()
            },
            sampling: SamplingConfig::default(),
            actuation: ActuationConfig::default(),
        }
    }

    /// Parses and validates a JSON config.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.directions.is_empty() {
            return Err(ConfigError::NoDirections);
        }

        let mut seen = HashSet::new();
        for d in &self.directions {
            if !seen.insert(*d) {
                return Err(ConfigError::DuplicateDirection(*d));
            }
        }

        if self.sampling.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }

        match &self.strategy {
            StrategyConfig::ThresholdNearest { thresholds } => {
                for d in &self.directions {
                    positive(&format!("{d} threshold"), thresholds.get(*d))?;
                }
            }
            StrategyConfig::GlobalMinimum { threshold_cm } => {
                positive("global threshold", *threshold_cm)?;
            }
            StrategyConfig::Differential => {
                if !(seen.contains(&Direction::Front) && seen.contains(&Direction::Back)) {
                    return Err(ConfigError::DifferentialNeedsFrontAndBack);
                }
            }
        }

        positive("fault threshold", self.fault.threshold_cm)
    }
}

fn positive(what: &str, value: f64) -> Result<(), ConfigError> {
    // Also rejects NaN.
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveThreshold {
            what: what.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        EngineConfig::three_sensor().validate().expect("three sensor");
        EngineConfig::four_sensor().validate().expect("four sensor");
        EngineConfig::two_sensor().validate().expect("two sensor");
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let raw = r#"{
            "directions": ["front", "left", "right"],
            "strategy": { "kind": "threshold_nearest" }
        }"#;
        let config = EngineConfig::from_json_str(raw).expect("valid config");

        assert_eq!(config, EngineConfig::three_sensor());
        assert_eq!(config.actuation.turn_duration(), Duration::from_millis(100));
    }

    #[test]
    fn disabled_countdown_parses_from_null() {
        let raw = r#"{
            "directions": ["front", "back"],
            "strategy": { "kind": "differential" },
            "fault": { "countdown": null }
        }"#;
        let config = EngineConfig::from_json_str(raw).expect("valid config");
        assert_eq!(config.fault.countdown, None);
        assert_eq!(config.fault.threshold_cm, 1.0);
    }

    #[test]
    fn rejects_duplicate_direction() {
        let mut config = EngineConfig::three_sensor();
        config.directions.push(Direction::Left);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateDirection(Direction::Left))
        ));
    }

    #[test]
    fn rejects_differential_without_back() {
        let mut config = EngineConfig::two_sensor();
        config.directions = vec![Direction::Front, Direction::Left];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DifferentialNeedsFrontAndBack)
        ));
    }

    #[test]
    fn rejects_zero_capacity_and_bad_thresholds() {
        let mut config = EngineConfig::four_sensor();
        config.sampling.queue_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroQueueCapacity)));

        let mut config = EngineConfig::four_sensor();
        config.strategy = StrategyConfig::GlobalMinimum { threshold_cm: 0.0 };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveThreshold { .. })
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
