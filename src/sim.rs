//! In-memory driver implementations.
//!
//! Used by the tests and by the `rover-sim` binary to run the engine without GPIO access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::driver::{Actuator, Light, MotorChannel, RangeSensor, Rotation};
use crate::error::DriverError;
use crate::Direction;

/// Replays a fixed list of readings.
///
/// Once the list is exhausted the sensor either starts over or keeps returning the last value.
#[derive(Debug)]
pub struct ScriptedSensor {
    readings: Vec<f64>,
    cursor: AtomicUsize,
    repeat: bool,
    round_trip: Duration,
}

impl ScriptedSensor {
    /// Loops over `readings` forever.
    pub fn cycle(readings: Vec<f64>) -> Self {
        Self::build(readings, true)
    }

    /// Plays `readings` once, then holds the final value.
    pub fn then_hold(readings: Vec<f64>) -> Self {
        Self::build(readings, false)
    }

    pub fn constant(cm: f64) -> Self {
        Self::build(vec![cm], false)
    }

    fn build(readings: Vec<f64>, repeat: bool) -> Self {
        Self {
            readings,
            cursor: AtomicUsize::new(0),
            repeat,
            round_trip: Duration::ZERO,
        }
    }

    /// Simulated echo round trip added to every measurement.
    pub fn with_round_trip(mut self, round_trip: Duration) -> Self {
        self.round_trip = round_trip;
        self
    }

    /// Number of measurements taken so far.
    pub fn measurements(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RangeSensor for ScriptedSensor {
    async fn measure(&self) -> Result<f64, DriverError> {
        if !self.round_trip.is_zero() {
            tokio::time::sleep(self.round_trip).await;
        }
        if self.readings.is_empty() {
            return Ok(crate::FAULT_READING_CM);
        }
        let n = self.cursor.fetch_add(1, Ordering::SeqCst);
        let idx = if self.repeat {
            n % self.readings.len()
        } else {
            n.min(self.readings.len() - 1)
        };
        Ok(self.readings[idx])
    }
}

/// A sensor whose every measurement fails.
#[derive(Debug, Clone, Copy)]
pub struct FailingSensor(pub Direction);

#[async_trait]
impl RangeSensor for FailingSensor {
    async fn measure(&self) -> Result<f64, DriverError> {
        Err(DriverError::SensorUnavailable(self.0))
    }
}

/// One call received by a [`RecordingActuator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Motor(MotorChannel, Rotation),
    Blink(Light, u32),
}

#[derive(Debug)]
struct Recording {
    calls: Vec<ActuatorCall>,
    left: Rotation,
    right: Rotation,
    failing_motors: Vec<MotorChannel>,
    failing_lights: bool,
}

/// Records every call and tracks the resulting motor state.
///
/// Clones share the same recording, so a test can keep a handle after moving the actuator into
/// an engine. Failures can be switched on per motor channel or for all lights; a failed call is
/// neither applied nor recorded.
#[derive(Debug, Clone)]
pub struct RecordingActuator {
    inner: Arc<Mutex<Recording>>,
}

impl Default for RecordingActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recording {
                calls: Vec::new(),
                left: Rotation::Stopped,
                right: Rotation::Stopped,
                failing_motors: Vec::new(),
                failing_lights: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.lock().calls.clone()
    }

    pub fn motor(&self, channel: MotorChannel) -> Rotation {
        let rec = self.lock();
        match channel {
            MotorChannel::Left => rec.left,
            MotorChannel::Right => rec.right,
        }
    }

    /// Current (left, right) rotation.
    pub fn motors(&self) -> (Rotation, Rotation) {
        let rec = self.lock();
        (rec.left, rec.right)
    }

    /// Total pulses sent to `light`.
    pub fn blinks(&self, light: Light) -> u32 {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                ActuatorCall::Blink(l, n) if *l == light => Some(*n),
                _ => None,
            })
            .sum()
    }

    pub fn fail_motor(&self, channel: MotorChannel, fail: bool) {
        let mut rec = self.lock();
        rec.failing_motors.retain(|c| *c != channel);
        if fail {
            rec.failing_motors.push(channel);
        }
    }

    pub fn fail_lights(&self, fail: bool) {
        self.lock().failing_lights = fail;
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    async fn set_motor(
        &mut self,
        channel: MotorChannel,
        rotation: Rotation,
    ) -> Result<(), DriverError> {
        let mut rec = self.lock();
        if rec.failing_motors.contains(&channel) {
            return Err(DriverError::Motor {
                channel,
                reason: "injected failure".to_string(),
            });
        }
        match channel {
            MotorChannel::Left => rec.left = rotation,
            MotorChannel::Right => rec.right = rotation,
        }
        rec.calls.push(ActuatorCall::Motor(channel, rotation));
        Ok(())
    }

    async fn blink(&mut self, light: Light, count: u32) -> Result<(), DriverError> {
        let mut rec = self.lock();
        if rec.failing_lights {
            return Err(DriverError::Indicator {
                light,
                reason: "injected failure".to_string(),
            });
        }
        rec.calls.push(ActuatorCall::Blink(light, count));
        Ok(())
    }
}

/// Accepts every call and logs it. Keeps no history.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingActuator;

#[async_trait]
impl Actuator for LoggingActuator {
    async fn set_motor(
        &mut self,
        channel: MotorChannel,
        rotation: Rotation,
    ) -> Result<(), DriverError> {
        debug!(%channel, ?rotation, "motor");
        Ok(())
    }

    async fn blink(&mut self, light: Light, count: u32) -> Result<(), DriverError> {
        debug!(%light, count, "blink");
        Ok(())
    }
}
