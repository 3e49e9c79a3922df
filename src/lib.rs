//! Rover obstacle-avoidance core.
//!
//! This crate defines:
//! - [`Direction`], [`DistanceSample`] and [`Command`]: the values flowing from sensors to motors.
//! - [`poller`]: one background sampling task per sensed direction.
//! - [`aggregate`] and [`gate`]: the decision loop's view of the world and when to trust it.
//! - [`policy`]: the swappable arbitration strategies.
//! - [`dispatch`]: turning a [`Command`] into motor and indicator calls.
//! - [`engine`]: the decision loop and the lifetime object that owns every task.
//! - [`driver`] and [`sim`]: the hardware boundary and an in-memory implementation of it.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub mod aggregate;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod engine;
pub mod error;
pub mod gate;
pub mod policy;
pub mod poller;
pub mod sim;

pub use aggregate::AggregatedState;
pub use config::EngineConfig;
pub use dispatch::Dispatcher;
pub use driver::{Actuator, Light, MotorChannel, RangeSensor, Rotation};
pub use engine::{Decision, DecisionLoop, Engine};
pub use error::{ConfigError, DriverError, EngineError};
pub use gate::StabilizationGate;
pub use policy::ArbitrationPolicy;

/// Distance (cm) reported when a measurement could not be taken at all.
///
/// Echo timeouts on HC-SR04 style sensors surface as readings around zero, so a failed
/// measurement is folded into the same fault signal.
pub const FAULT_READING_CM: f64 = 0.0;

/// Whether a reading is a real distance rather than an echo timeout.
///
/// Anything below `floor_cm`, and anything non-finite, is a fault signal and must never be read
/// as a very close obstacle.
pub fn is_plausible(centimeters: f64, floor_cm: f64) -> bool {
    centimeters.is_finite() && centimeters >= floor_cm
}

/// A sensed (and actuated) side of the rover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Front,
    Back,
    Left,
    Right,
}

impl Direction {
    /// Every direction, in arbitration tie-break priority order.
    pub const ALL: [Direction; 4] = [
        Direction::Front,
        Direction::Back,
        Direction::Left,
        Direction::Right,
    ];

    /// Dense index, matching the position in [`Direction::ALL`].
    pub fn index(self) -> usize {
        match self {
            Direction::Front => 0,
            Direction::Back => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }

    /// One-letter tag used in sample logs.
    pub fn tag(self) -> char {
        match self {
            Direction::Front => 'F',
            Direction::Back => 'B',
            Direction::Left => 'L',
            Direction::Right => 'R',
        }
    }

    /// The movement that takes the rover away from an obstacle on this side.
    pub fn evade(self) -> Command {
        match self {
            Direction::Front => Command::Backward,
            Direction::Back => Command::Forward,
            Direction::Left => Command::TurnRight,
            Direction::Right => Command::TurnLeft,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Direction::Front => "front",
            Direction::Back => "back",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

/// One reading published by a sensor poller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample {
    pub direction: Direction,
    pub centimeters: f64,
    /// Per-poller counter, starting at 0.
    pub sequence: u64,
    pub sampled_at: Instant,
}

impl DistanceSample {
    pub fn new(direction: Direction, centimeters: f64, sequence: u64) -> Self {
        Self {
            direction,
            centimeters,
            sequence,
            sampled_at: Instant::now(),
        }
    }
}

/// A movement chosen by arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    Stop,
}

impl Command {
    /// Whether the command puts the wheels in motion.
    pub fn is_movement(self) -> bool {
        !matches!(self, Command::Stop)
    }
}
