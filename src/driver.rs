//! Hardware boundary.
//!
//! The engine never touches GPIO directly. It talks to one [`RangeSensor`] per configured
//! direction and to a single [`Actuator`] that owns both motor channels and the indicator lights.
//! Every call reports an explicit outcome so faults can be injected without real hardware, even
//! though the GPIO-backed implementations in practice never fail.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// A distance sensor for one side of the rover.
///
/// `measure` covers the full trigger/echo round trip and may take tens of milliseconds.
/// Implementations backed by a blocking pin driver should move the work onto
/// [`tokio::task::spawn_blocking`].
#[async_trait]
pub trait RangeSensor: Send + Sync {
    /// Measures the distance to the nearest obstacle in centimeters.
    ///
    /// Readings near zero mean the echo timed out; they are not a "very close" obstacle.
    async fn measure(&self) -> Result<f64, DriverError>;
}

/// Motors and indicator lights.
#[async_trait]
pub trait Actuator: Send {
    /// Sets the rotation of one motor channel. Idempotent.
    async fn set_motor(&mut self, channel: MotorChannel, rotation: Rotation)
        -> Result<(), DriverError>;

    /// Pulses an indicator `count` times. Best effort.
    async fn blink(&mut self, light: Light, count: u32) -> Result<(), DriverError>;
}

/// One side of the differential drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorChannel {
    Left,
    Right,
}

/// Rotational sense of a motor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
    Stopped,
}

impl Rotation {
    /// The opposite sense; `Stopped` stays stopped.
    pub fn reversed(self) -> Self {
        match self {
            Rotation::Clockwise => Rotation::CounterClockwise,
            Rotation::CounterClockwise => Rotation::Clockwise,
            Rotation::Stopped => Rotation::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Light {
    Front,
    Back,
}

impl std::fmt::Display for MotorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MotorChannel::Left => "left",
            MotorChannel::Right => "right",
        })
    }
}

impl std::fmt::Display for Light {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Light::Front => "front",
            Light::Back => "back",
        })
    }
}
