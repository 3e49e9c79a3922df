//! Decision loop and engine lifecycle.
//!
//! ```text
//! poller(front) ──► queue ──┐
//! poller(left)  ──► queue ──┼──► decision loop ──► aggregate + gate ──► policy ──► dispatcher
//! poller(right) ──► queue ──┘
//! ```
//!
//! The decision loop is the only task that touches the aggregated distances and the gate, so no
//! locking is involved: all synchronization happens through the per-direction queues.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, info, warn};

use crate::aggregate::AggregatedState;
use crate::config::{EngineConfig, FaultConfig};
use crate::dispatch::Dispatcher;
use crate::driver::{Actuator, RangeSensor};
use crate::error::EngineError;
use crate::gate::{GateStatus, StabilizationGate};
use crate::poller::{self, PollerTiming};
use crate::policy::{self, ArbitrationPolicy};
use crate::{Command, Direction, DistanceSample};

/// What one decision cycle concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The sample was for a direction this loop does not track.
    Ignored,
    /// Sensors not yet trusted; no motion.
    Waiting,
    /// The fault countdown ran out; motors should be halted and the loop waits again.
    Faulted,
    /// The policy had no preference; motors are left as they are.
    Hold,
    Command(Command),
}

impl Decision {
    pub fn command(self) -> Option<Command> {
        match self {
            Decision::Command(c) => Some(c),
            _ => None,
        }
    }
}

/// The synchronous half of the decision loop: aggregate, gate, arbitrate.
pub struct DecisionLoop {
    state: AggregatedState,
    gate: StabilizationGate,
    policy: Box<dyn ArbitrationPolicy>,
}

impl DecisionLoop {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_policy(
            &config.directions,
            &config.fault,
            policy::from_config(&config.strategy, &config.fault),
        )
    }

    pub fn with_policy(
        directions: &[Direction],
        fault: &FaultConfig,
        policy: Box<dyn ArbitrationPolicy>,
    ) -> Self {
        Self {
            state: AggregatedState::new(directions),
            gate: StabilizationGate::new(fault),
            policy,
        }
    }

    pub fn state(&self) -> &AggregatedState {
        &self.state
    }

    pub fn gate(&self) -> &StabilizationGate {
        &self.gate
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Folds one sample into the state and decides what the motors should do.
    pub fn step(&mut self, sample: &DistanceSample) -> Decision {
        if !self.state.record(sample) {
            return Decision::Ignored;
        }
        debug!("{}: {:.2}", sample.direction.tag(), sample.centimeters);

        let status = self.gate.evaluate(&mut self.state);
        match status {
            GateStatus::Waiting => Decision::Waiting,
            GateStatus::Faulted => Decision::Faulted,
            GateStatus::Stabilized | GateStatus::Ready => match self.policy.decide(&self.state) {
                Some(command) => Decision::Command(command),
                None => Decision::Hold,
            },
        }
    }
}

/// Drains every queue until all pollers are gone, acting on each decision.
async fn run_loop<A: Actuator>(
    mut decisions: DecisionLoop,
    mut dispatcher: Dispatcher<A>,
    mut samples: StreamMap<Direction, ReceiverStream<DistanceSample>>,
) {
    if let Err(e) = dispatcher.announce_start().await {
        warn!(error = %e, "startup announcement failed");
    }
    info!(policy = decisions.policy_name(), "decision loop running");

    while let Some((_, sample)) = samples.next().await {
        let outcome = match decisions.step(&sample) {
            Decision::Ignored | Decision::Hold => Ok(()),
            Decision::Waiting => dispatcher.waiting().await,
            Decision::Faulted => dispatcher.halt().await,
            Decision::Command(command) => dispatcher.execute(command).await,
        };
        if let Err(e) = outcome {
            warn!(error = %e, "driver call failed");
        }
    }

    info!("all sample queues closed, halting");
    if let Err(e) = dispatcher.halt().await {
        warn!(error = %e, "final halt failed");
    }
}

struct Running {
    pollers: Vec<JoinHandle<()>>,
    decision: JoinHandle<()>,
}

/// Owns the sensors, the actuator and, once started, every background task.
pub struct Engine<A> {
    config: EngineConfig,
    sensors: HashMap<Direction, Arc<dyn RangeSensor>>,
    actuator: Option<A>,
    running: Option<Running>,
}

impl<A: Actuator + 'static> Engine<A> {
    /// Validates `config` and checks a sensor exists for every configured direction.
    pub fn new(
        config: EngineConfig,
        sensors: impl IntoIterator<Item = (Direction, Arc<dyn RangeSensor>)>,
        actuator: A,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let sensors: HashMap<_, _> = sensors.into_iter().collect();
        if let Some(missing) = config.directions.iter().find(|d| !sensors.contains_key(*d)) {
            return Err(EngineError::MissingSensor(*missing));
        }

        Ok(Self {
            config,
            sensors,
            actuator: Some(actuator),
            running: None,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawns one poller per direction and the decision loop. An engine starts at most once.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.actuator.is_none() {
            return Err(EngineError::AlreadyStarted);
        }
        // Resolve every sensor before anything is spawned or consumed, so a failure leaves the
        // engine startable.
        let sensors = self
            .config
            .directions
            .iter()
            .map(|d| {
                self.sensors
                    .get(d)
                    .cloned()
                    .map(|sensor| (*d, sensor))
                    .ok_or(EngineError::MissingSensor(*d))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let actuator = self.actuator.take().ok_or(EngineError::AlreadyStarted)?;
        let sampling = self.config.sampling;

        let mut samples = StreamMap::new();
        let mut pollers = Vec::with_capacity(sensors.len());
        for (i, (direction, sensor)) in sensors.into_iter().enumerate() {
            let (tx, rx) = mpsc::channel(sampling.queue_capacity);
            let timing = PollerTiming {
                start_delay: sampling.stagger() * i as u32,
                interval: sampling.interval(),
            };
            pollers.push(poller::spawn(direction, sensor, timing, tx));
            samples.insert(direction, ReceiverStream::new(rx));
        }

        let decisions = DecisionLoop::new(&self.config);
        let dispatcher = Dispatcher::new(actuator, self.config.actuation);
        let decision = tokio::spawn(run_loop(decisions, dispatcher, samples));

        info!(directions = ?self.config.directions, "engine started");
        self.running = Some(Running { pollers, decision });
        Ok(())
    }

    /// Stops sampling, lets the decision loop drain what is queued, and waits for it to halt
    /// the motors.
    pub async fn stop(&mut self) -> Result<(), EngineError> {
        let running = self.running.take().ok_or(EngineError::NotRunning)?;
        for handle in &running.pollers {
            handle.abort();
        }
        if let Err(e) = running.decision.await {
            warn!(error = %e, "decision loop ended abnormally");
        }
        info!("engine stopped");
        Ok(())
    }

    /// Waits for the decision loop; with live pollers this never returns.
    pub async fn join(mut self) -> Result<(), EngineError> {
        let running = self.running.take().ok_or(EngineError::NotRunning)?;
        if let Err(e) = running.decision.await {
            warn!(error = %e, "decision loop ended abnormally");
        }
        Ok(())
    }
}

impl<A> Drop for Engine<A> {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            for handle in running.pollers {
                handle.abort();
            }
            running.decision.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::policy::ThresholdNearest;

    fn sample(direction: Direction, cm: f64) -> DistanceSample {
        DistanceSample::new(direction, cm, 0)
    }

    #[test]
    fn no_movement_before_every_sensor_reports() {
        let mut dl = DecisionLoop::new(&EngineConfig::three_sensor());

        assert_eq!(dl.step(&sample(Direction::Front, 5.0)), Decision::Waiting);
        assert_eq!(dl.step(&sample(Direction::Front, 200.0)), Decision::Waiting);
        assert_eq!(dl.step(&sample(Direction::Left, 200.0)), Decision::Waiting);
        assert_eq!(
            dl.step(&sample(Direction::Right, 200.0)),
            Decision::Command(Command::Forward)
        );
    }

    #[test]
    fn inactive_direction_is_ignored() {
        let mut dl = DecisionLoop::new(&EngineConfig::two_sensor());
        assert_eq!(dl.step(&sample(Direction::Left, 3.0)), Decision::Ignored);
        assert!(!dl.state().has_reported(Direction::Left));
    }

    #[test]
    fn fault_cycles_drop_back_to_waiting() {
        let mut dl = DecisionLoop::new(&EngineConfig::three_sensor());
        for d in [Direction::Front, Direction::Left, Direction::Right] {
            dl.step(&sample(d, 100.0));
        }
        assert!(dl.gate().is_ready());

        // Only once the last plausible reading is overwritten does every direction read zero.
        dl.step(&sample(Direction::Front, 0.0));
        dl.step(&sample(Direction::Left, 0.0));
        let decisions: Vec<_> = (0..3)
            .map(|_| dl.step(&sample(Direction::Right, 0.0)))
            .collect();

        assert_eq!(decisions[2], Decision::Faulted);
        assert!(!dl.gate().is_ready());
        assert_eq!(dl.step(&sample(Direction::Front, 80.0)), Decision::Waiting);
    }

    #[test]
    fn never_moves_while_gate_closed() {
        let mut dl = DecisionLoop::with_policy(
            &[Direction::Front, Direction::Left, Direction::Right],
            &FaultConfig::default(),
            Box::new(ThresholdNearest::new(Thresholds::default())),
        );
        let script = [
            (Direction::Front, 10.0),
            (Direction::Left, 0.0),
            (Direction::Front, 0.0),
            (Direction::Right, 0.0),
            (Direction::Right, 0.0),
            (Direction::Right, 0.0),
            (Direction::Left, 40.0),
            (Direction::Front, 70.0),
            (Direction::Right, 70.0),
        ];
        for (d, cm) in script {
            let decision = dl.step(&sample(d, cm));
            if !dl.gate().is_ready() {
                assert!(
                    !decision.command().is_some_and(Command::is_movement),
                    "moved while not ready: {decision:?}"
                );
            }
        }
        assert!(dl.gate().is_ready());
    }

    #[test]
    fn timed_out_front_stops_instead_of_reversing() {
        let mut dl = DecisionLoop::new(&EngineConfig::three_sensor());
        for d in [Direction::Front, Direction::Left, Direction::Right] {
            dl.step(&sample(d, 40.0));
        }
        assert!(dl.gate().is_ready());

        assert_eq!(
            dl.step(&sample(Direction::Front, 0.0)),
            Decision::Command(Command::Stop)
        );
        assert_eq!(
            dl.step(&sample(Direction::Front, 30.0)),
            Decision::Command(Command::Backward)
        );
    }

    #[test]
    fn all_zero_array_never_stabilizes() {
        let mut dl = DecisionLoop::new(&EngineConfig::three_sensor());
        for _ in 0..4 {
            for d in [Direction::Front, Direction::Left, Direction::Right] {
                assert_eq!(dl.step(&sample(d, 0.0)), Decision::Waiting);
            }
        }
        assert!(!dl.gate().is_ready());
    }

    #[test]
    fn differential_equal_readings_hold() {
        let mut dl = DecisionLoop::new(&EngineConfig::two_sensor());
        dl.step(&sample(Direction::Front, 50.0));
        assert_eq!(dl.step(&sample(Direction::Back, 50.0)), Decision::Hold);
        assert_eq!(
            dl.step(&sample(Direction::Back, 90.0)),
            Decision::Command(Command::Forward)
        );
    }

    #[test]
    fn engine_requires_a_sensor_per_direction() {
        let front: Arc<dyn RangeSensor> = Arc::new(crate::sim::ScriptedSensor::constant(10.0));
        let sensors = vec![(Direction::Front, front)];
        let result = Engine::new(
            EngineConfig::two_sensor(),
            sensors,
            crate::sim::RecordingActuator::new(),
        );
        assert!(matches!(result, Err(EngineError::MissingSensor(Direction::Back))));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_keeps_the_actuator() {
        let front: Arc<dyn RangeSensor> = Arc::new(crate::sim::ScriptedSensor::constant(60.0));
        let back: Arc<dyn RangeSensor> = Arc::new(crate::sim::ScriptedSensor::constant(60.0));
        let mut engine = Engine::new(
            EngineConfig::two_sensor(),
            vec![(Direction::Front, front), (Direction::Back, back)],
            crate::sim::RecordingActuator::new(),
        )
        .expect("valid engine");

        let back = engine.sensors.remove(&Direction::Back).expect("back sensor");
        assert!(matches!(
            engine.start(),
            Err(EngineError::MissingSensor(Direction::Back))
        ));
        assert!(!engine.is_running());

        engine.sensors.insert(Direction::Back, back);
        engine.start().expect("second start succeeds");
        assert!(engine.is_running());
        engine.stop().await.expect("stops");
    }
}
