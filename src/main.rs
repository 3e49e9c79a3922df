//! rover-sim: runs the obstacle-avoidance engine against simulated sensors and motors.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rover_core::sim::{LoggingActuator, ScriptedSensor};
use rover_core::{Direction, Engine, EngineConfig, RangeSensor};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    /// Front, left and right; threshold-nearest
    Three,
    /// All four sides; global minimum
    Four,
    /// Front and back; differential
    Two,
}

/// Drive a simulated rover around scripted obstacles.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON engine config; overrides --preset
    #[arg(short, long, env = "ROVER_CONFIG")]
    config: Option<PathBuf>,

    /// Built-in sensor layout
    #[arg(short, long, value_enum, default_value = "three")]
    preset: Preset,

    /// Enable debug logging (per-sample distances)
    #[arg(short, long)]
    debug: bool,
}

/// A short obstacle course per side, replayed in a loop.
fn course(direction: Direction) -> Vec<f64> {
    match direction {
        Direction::Front => vec![140.0, 110.0, 80.0, 45.0, 30.0, 70.0, 120.0],
        Direction::Back => vec![90.0, 85.0, 60.0, 95.0],
        Direction::Left => vec![40.0, 30.0, 12.0, 25.0, 40.0],
        Direction::Right => vec![35.0, 20.0, 28.0, 9.0, 30.0],
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "debug,rover_core=trace"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => match cli.preset {
            Preset::Three => EngineConfig::three_sensor(),
            Preset::Four => EngineConfig::four_sensor(),
            Preset::Two => EngineConfig::two_sensor(),
        },
    };

    let sensors: Vec<(Direction, Arc<dyn RangeSensor>)> = config
        .directions
        .iter()
        .map(|d| {
            let sensor: Arc<dyn RangeSensor> = Arc::new(
                ScriptedSensor::cycle(course(*d)).with_round_trip(Duration::from_millis(15)),
            );
            (*d, sensor)
        })
        .collect();

    let mut engine = Engine::new(config, sensors, LoggingActuator)
        .context("failed to build engine")?;
    engine.start()?;
    info!("rover-sim v{} running, Ctrl-C to stop", env!("CARGO_PKG_VERSION"));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    engine.stop().await?;
    Ok(())
}
