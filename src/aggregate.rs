//! Last known distance per direction.

use crate::{is_plausible, Direction, DistanceSample};

/// The decision loop's cache of the most recent reading on each side.
///
/// Only directions passed to [`AggregatedState::new`] are active; samples for any other
/// direction are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedState {
    active: Vec<Direction>,
    distances: [f64; 4],
    reported: [bool; 4],
}

impl AggregatedState {
    pub fn new(directions: &[Direction]) -> Self {
        // Keep priority order regardless of configuration order.
        let active = Direction::ALL
            .into_iter()
            .filter(|d| directions.contains(d))
            .collect();

        Self {
            active,
            distances: [0.0; 4],
            reported: [false; 4],
        }
    }

    /// Records a sample. Returns `false` if its direction is not active.
    pub fn record(&mut self, sample: &DistanceSample) -> bool {
        self.set(sample.direction, sample.centimeters)
    }

    pub fn set(&mut self, direction: Direction, centimeters: f64) -> bool {
        if !self.is_active(direction) {
            return false;
        }
        self.distances[direction.index()] = centimeters;
        self.reported[direction.index()] = true;
        true
    }

    /// Active directions in tie-break priority order.
    pub fn directions(&self) -> &[Direction] {
        &self.active
    }

    pub fn is_active(&self, direction: Direction) -> bool {
        self.active.contains(&direction)
    }

    /// The last reading, if this direction is active and has reported since the last reset.
    pub fn distance(&self, direction: Direction) -> Option<f64> {
        self.has_reported(direction)
            .then(|| self.distances[direction.index()])
    }

    pub fn has_reported(&self, direction: Direction) -> bool {
        self.is_active(direction) && self.reported[direction.index()]
    }

    pub fn all_reported(&self) -> bool {
        self.active.iter().all(|d| self.reported[d.index()])
    }

    /// Active directions with their last reading, in priority order. Unreported ones are skipped.
    pub fn readings(&self) -> impl Iterator<Item = (Direction, f64)> + '_ {
        self.active
            .iter()
            .filter(|d| self.reported[d.index()])
            .map(|d| (*d, self.distances[d.index()]))
    }

    /// Like [`readings`](Self::readings), minus echo timeouts below `floor_cm`.
    pub fn plausible_readings(&self, floor_cm: f64) -> impl Iterator<Item = (Direction, f64)> + '_ {
        self.readings()
            .filter(move |(_, cm)| is_plausible(*cm, floor_cm))
    }

    /// Every active direction has reported a plausible distance.
    pub fn all_plausible(&self, floor_cm: f64) -> bool {
        self.all_reported() && self.readings().all(|(_, cm)| is_plausible(cm, floor_cm))
    }

    /// At least one reported direction currently reads as an echo timeout.
    pub fn any_faulted(&self, floor_cm: f64) -> bool {
        self.readings().any(|(_, cm)| !is_plausible(cm, floor_cm))
    }

    /// Forgets which directions have reported. Distances are kept but no longer exposed.
    pub fn clear_reported(&mut self) {
        self.reported = [false; 4];
    }
}
