//! Sensor pollers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::driver::RangeSensor;
use crate::{Direction, DistanceSample, FAULT_READING_CM};

/// Pacing for one poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerTiming {
    /// Delay before the first measurement.
    pub start_delay: Duration,
    /// Pause after every measurement, before publishing.
    pub interval: Duration,
}

/// Spawns a task that measures `direction` forever and publishes onto `tx`.
///
/// A full queue blocks the task, which throttles sampling to the consumer's pace. The task ends
/// only when the receiving side is dropped or the returned handle is aborted.
pub fn spawn(
    direction: Direction,
    sensor: Arc<dyn RangeSensor>,
    timing: PollerTiming,
    tx: mpsc::Sender<DistanceSample>,
) -> JoinHandle<()> {
    tokio::spawn(run(direction, sensor, timing, tx))
}

async fn run(
    direction: Direction,
    sensor: Arc<dyn RangeSensor>,
    timing: PollerTiming,
    tx: mpsc::Sender<DistanceSample>,
) {
    if !timing.start_delay.is_zero() {
        tokio::time::sleep(timing.start_delay).await;
    }

    let mut sequence = 0u64;
    loop {
        let centimeters = match sensor.measure().await {
            Ok(cm) if cm.is_finite() => cm,
            Ok(cm) => {
                warn!(%direction, reading = cm, "non-finite reading");
                FAULT_READING_CM
            }
            Err(e) => {
                warn!(%direction, error = %e, "measurement failed");
                FAULT_READING_CM
            }
        };
        tokio::time::sleep(timing.interval).await;

        let sample = DistanceSample::new(direction, centimeters, sequence);
        if tx.send(sample).await.is_err() {
            debug!(%direction, "sample queue closed, poller exiting");
            return;
        }
        sequence += 1;
    }
}
