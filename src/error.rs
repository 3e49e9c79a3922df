//! Error types for the driver boundary, configuration and engine lifecycle.

use crate::driver::{Light, MotorChannel};
use crate::Direction;
use thiserror::Error;

/// A failed call into the hardware layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    #[error("{0} sensor did not answer")]
    SensorUnavailable(Direction),

    #[error("motor channel {channel} rejected the command: {reason}")]
    Motor {
        channel: MotorChannel,
        reason: String,
    },

    #[error("indicator {light} failed: {reason}")]
    Indicator { light: Light, reason: String },
}

/// An engine configuration that cannot drive a rover.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no directions configured")]
    NoDirections,

    #[error("direction {0} configured more than once")]
    DuplicateDirection(Direction),

    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("differential strategy needs both front and back sensors")]
    DifferentialNeedsFrontAndBack,

    #[error("threshold for {what} must be positive, got {value}")]
    NonPositiveThreshold { what: String, value: f64 },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Misuse of the engine lifecycle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no sensor supplied for configured direction {0}")]
    MissingSensor(Direction),

    #[error("engine already started")]
    AlreadyStarted,

    #[error("engine is not running")]
    NotRunning,
}
