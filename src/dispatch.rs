//! Actuation dispatcher: [`Command`] in, motor and indicator calls out.

use tracing::{debug, info, instrument};

use crate::config::{ActuationConfig, TurnStyle};
use crate::driver::{Actuator, Light, MotorChannel, Rotation};
use crate::error::DriverError;
use crate::Command;

/// Owns the actuator and executes one command at a time.
///
/// Turns block for the configured duration and always end with a stop, so the next decision
/// starts from a stationary rover. The caller is the decision loop, which therefore processes no
/// samples while a turn is in progress.
pub struct Dispatcher<A> {
    actuator: A,
    config: ActuationConfig,
}

impl<A: Actuator> Dispatcher<A> {
    pub fn new(actuator: A, config: ActuationConfig) -> Self {
        Self {
            actuator,
            config,
        }
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Stops both motors, blinks the front light and pauses before driving starts.
    pub async fn announce_start(&mut self) -> Result<(), DriverError> {
        info!("rover starting");
        self.halt().await?;
        if self.config.startup_blinks > 0 {
            self.actuator
                .blink(Light::Front, self.config.startup_blinks)
                .await?;
        }
        tokio::time::sleep(self.config.startup_pause()).await;
        Ok(())
    }

    #[instrument(skip(self), fields(turn_ms = self.config.turn_ms))]
    pub async fn execute(&mut self, command: Command) -> Result<(), DriverError> {
        match command {
            Command::Forward => {
                info!("forwards");
                let sense = self.config.forward;
                self.drive(sense, sense).await?;
                self.actuator.blink(Light::Front, 1).await
            }
            Command::Backward => {
                info!("backwards");
                let sense = self.config.forward.reversed();
                self.drive(sense, sense).await?;
                self.actuator.blink(Light::Back, 1).await
            }
            Command::TurnLeft | Command::TurnRight => {
                info!("turning");
                let turned = self.turn(command).await;
                if turned.is_ok() {
                    tokio::time::sleep(self.config.turn_duration()).await;
                }
                // Stop even if the turn call failed half way.
                let stopped = self.stop().await;
                turned.and(stopped)
            }
            Command::Stop => self.stop().await,
        }
    }

    /// Neutral side effect while the sensors are not yet trusted.
    pub async fn waiting(&mut self) -> Result<(), DriverError> {
        debug!("waiting for sensors");
        self.actuator.blink(Light::Back, 1).await
    }

    /// Halts both channels without an indicator pulse.
    pub async fn halt(&mut self) -> Result<(), DriverError> {
        self.drive(Rotation::Stopped, Rotation::Stopped).await
    }

    async fn stop(&mut self) -> Result<(), DriverError> {
        info!("stop");
        self.halt().await?;
        self.actuator.blink(Light::Front, 1).await
    }

    async fn turn(&mut self, command: Command) -> Result<(), DriverError> {
        let forward = self.config.forward;
        // (left, right) for a left turn; mirrored for a right turn.
        let (inner, outer) = match self.config.turn_style {
            TurnStyle::Pivot => (forward.reversed(), forward),
            TurnStyle::SingleChannel => (Rotation::Stopped, forward),
        };
        if command == Command::TurnLeft {
            self.drive(inner, outer).await
        } else {
            self.drive(outer, inner).await
        }
    }

    async fn drive(&mut self, left: Rotation, right: Rotation) -> Result<(), DriverError> {
        self.actuator.set_motor(MotorChannel::Left, left).await?;
        self.actuator.set_motor(MotorChannel::Right, right).await
    }
}
