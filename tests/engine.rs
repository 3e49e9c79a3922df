use std::sync::Arc;
use std::time::Duration;

use rover_core::config::{EngineConfig, TurnStyle};
use rover_core::driver::{Light, MotorChannel, RangeSensor, Rotation};
use rover_core::sim::{ActuatorCall, FailingSensor, RecordingActuator, ScriptedSensor};
use rover_core::{Direction, Engine, EngineError};

fn sensor(readings: Vec<f64>) -> Arc<dyn RangeSensor> {
    Arc::new(ScriptedSensor::then_hold(readings))
}

fn quick(mut config: EngineConfig) -> EngineConfig {
    config.actuation.startup_pause_ms = 0;
    config.sampling.interval_ms = 100;
    config
}

#[tokio::test(start_paused = true)]
async fn clear_path_drives_forward() {
    let actuator = RecordingActuator::new();
    let mut engine = Engine::new(
        quick(EngineConfig::three_sensor()),
        [
            (Direction::Front, sensor(vec![120.0])),
            (Direction::Left, sensor(vec![60.0])),
            (Direction::Right, sensor(vec![60.0])),
        ],
        actuator.clone(),
    )
    .expect("engine");

    engine.start().expect("start");
    tokio::time::sleep(Duration::from_millis(550)).await;

    assert_eq!(
        actuator.motors(),
        (Rotation::CounterClockwise, Rotation::CounterClockwise)
    );
    engine.stop().await.expect("stop");
    assert_eq!(actuator.motors(), (Rotation::Stopped, Rotation::Stopped));
}

#[tokio::test(start_paused = true)]
async fn left_obstacle_turns_right_then_stops() {
    let actuator = RecordingActuator::new();
    let mut engine = Engine::new(
        quick(EngineConfig::three_sensor()),
        [
            (Direction::Front, sensor(vec![60.0])),
            (Direction::Left, sensor(vec![10.0])),
            (Direction::Right, sensor(vec![20.0])),
        ],
        actuator.clone(),
    )
    .expect("engine");

    engine.start().expect("start");
    tokio::time::sleep(Duration::from_millis(450)).await;
    engine.stop().await.expect("stop");

    let calls = actuator.calls();
    let turn = calls
        .iter()
        .position(|c| *c == ActuatorCall::Motor(MotorChannel::Left, Rotation::CounterClockwise))
        .expect("a right turn was driven");
    assert_eq!(
        calls[turn + 1],
        ActuatorCall::Motor(MotorChannel::Right, Rotation::Stopped)
    );
    assert_eq!(
        &calls[turn + 2..turn + 4],
        &[
            ActuatorCall::Motor(MotorChannel::Left, Rotation::Stopped),
            ActuatorCall::Motor(MotorChannel::Right, Rotation::Stopped),
        ]
    );
    assert!(calls
        .iter()
        .all(|c| *c != ActuatorCall::Motor(MotorChannel::Right, Rotation::CounterClockwise)));
}

#[tokio::test(start_paused = true)]
async fn waiting_blinks_back_light_without_moving() {
    let actuator = RecordingActuator::new();
    let mut config = quick(EngineConfig::four_sensor());
    config.actuation.turn_style = TurnStyle::Pivot;
    // Pollers start a second apart, so only the front has reported when we look.
    config.sampling.stagger_ms = 1_000;

    let mut engine = Engine::new(
        config,
        [
            (Direction::Front, sensor(vec![30.0])),
            (Direction::Back, sensor(vec![30.0])),
            (Direction::Left, sensor(vec![30.0])),
            (Direction::Right, sensor(vec![30.0])),
        ],
        actuator.clone(),
    )
    .expect("engine");

    engine.start().expect("start");
    tokio::time::sleep(Duration::from_millis(900)).await;

    assert!(actuator.blinks(Light::Back) > 0);
    assert!(actuator
        .calls()
        .iter()
        .all(|c| !matches!(c, ActuatorCall::Motor(_, r) if *r != Rotation::Stopped)));
    engine.stop().await.expect("stop");
}

#[tokio::test(start_paused = true)]
async fn dead_sensor_array_never_stabilizes() {
    let actuator = RecordingActuator::new();
    let failing = |d| -> Arc<dyn RangeSensor> { Arc::new(FailingSensor(d)) };
    let mut engine = Engine::new(
        quick(EngineConfig::three_sensor()),
        [
            (Direction::Front, failing(Direction::Front)),
            (Direction::Left, failing(Direction::Left)),
            (Direction::Right, failing(Direction::Right)),
        ],
        actuator.clone(),
    )
    .expect("engine");

    engine.start().expect("start");
    tokio::time::sleep(Duration::from_secs(3)).await;
    engine.stop().await.expect("stop");

    // Every reading is a timeout, so the gate never opens and the wheels never turn.
    let calls = actuator.calls();
    assert!(calls
        .iter()
        .all(|c| !matches!(c, ActuatorCall::Motor(_, r) if *r != Rotation::Stopped)));
    assert!(actuator.blinks(Light::Back) > 0);
    assert_eq!(actuator.motors(), (Rotation::Stopped, Rotation::Stopped));
}

#[tokio::test(start_paused = true)]
async fn front_timeout_after_start_stops_without_reversing() {
    let actuator = RecordingActuator::new();
    let mut engine = Engine::new(
        quick(EngineConfig::three_sensor()),
        [
            (Direction::Front, sensor(vec![60.0, 0.0])),
            (Direction::Left, sensor(vec![40.0])),
            (Direction::Right, sensor(vec![40.0])),
        ],
        actuator.clone(),
    )
    .expect("engine");

    engine.start().expect("start");
    tokio::time::sleep(Duration::from_millis(550)).await;

    assert_eq!(actuator.motors(), (Rotation::Stopped, Rotation::Stopped));
    assert!(actuator
        .calls()
        .iter()
        .all(|c| !matches!(c, ActuatorCall::Motor(_, Rotation::Clockwise))));
    engine.stop().await.expect("stop");
}

#[tokio::test(start_paused = true)]
async fn differential_follows_open_space() {
    let actuator = RecordingActuator::new();
    let mut engine = Engine::new(
        quick(EngineConfig::two_sensor()),
        [
            (Direction::Front, sensor(vec![40.0])),
            (Direction::Back, sensor(vec![60.0])),
        ],
        actuator.clone(),
    )
    .expect("engine");

    engine.start().expect("start");
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(
        actuator.motors(),
        (Rotation::CounterClockwise, Rotation::CounterClockwise)
    );
    engine.stop().await.expect("stop");
}

#[tokio::test(start_paused = true)]
async fn lifecycle_misuse_is_reported() {
    let mut engine = Engine::new(
        EngineConfig::two_sensor(),
        [
            (Direction::Front, sensor(vec![40.0])),
            (Direction::Back, sensor(vec![60.0])),
        ],
        RecordingActuator::new(),
    )
    .expect("engine");

    assert!(matches!(engine.stop().await, Err(EngineError::NotRunning)));
    engine.start().expect("start");
    assert!(engine.is_running());
    assert!(matches!(engine.start(), Err(EngineError::AlreadyStarted)));
    assert!(engine.is_running());
    engine.stop().await.expect("stop");
    assert!(!engine.is_running());
}

#[test]
fn invalid_config_is_rejected_before_start() {
    let mut config = EngineConfig::two_sensor();
    config.directions = vec![Direction::Front];
    let result = Engine::new(
        config,
        [(Direction::Front, sensor(vec![1.0]))],
        RecordingActuator::new(),
    );
    assert!(matches!(result, Err(EngineError::Config(_))));
}
