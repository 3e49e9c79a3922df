//! Arbitration policies.
//!
//! A policy looks at the aggregated distances and picks at most one [`Command`]. Policies are
//! pure: no I/O, no clock, no state between calls. The engine only consults them once the
//! stabilization gate is open.
//!
//! Readings below the fault floor are echo timeouts, not obstacles. They never take part in the
//! nearest-obstacle search, and a policy that cannot see a side it relies on stops the rover.

use crate::aggregate::AggregatedState;
use crate::config::{FaultConfig, StrategyConfig, Thresholds};
use crate::{is_plausible, Command, Direction};

/// The decision contract every strategy implements.
pub trait ArbitrationPolicy: Send + Sync {
    /// Stable name used in logs and config.
    fn name(&self) -> &'static str;

    /// Picks a command from the current readings, or `None` to leave the motors as they are.
    fn decide(&self, state: &AggregatedState) -> Option<Command>;
}

/// Builds the policy selected by configuration.
pub fn from_config(strategy: &StrategyConfig, fault: &FaultConfig) -> Box<dyn ArbitrationPolicy> {
    let floor = fault.threshold_cm;
    match strategy {
        StrategyConfig::ThresholdNearest { thresholds } => {
            Box::new(ThresholdNearest::new(*thresholds).with_fault_floor(floor))
        }
        StrategyConfig::GlobalMinimum { threshold_cm } => {
            Box::new(GlobalMinimum::new(*threshold_cm).with_fault_floor(floor))
        }
        StrategyConfig::Differential => Box::new(Differential::new().with_fault_floor(floor)),
    }
}

fn default_floor() -> f64 {
    FaultConfig::default().threshold_cm
}

/// Smallest reading among `candidates`; earlier entries win ties.
fn nearest(candidates: impl Iterator<Item = (Direction, f64)>) -> Option<(Direction, f64)> {
    candidates.fold(None, |best, (d, cm)| match best {
        Some((_, best_cm)) if cm.total_cmp(&best_cm).is_ge() => best,
        _ => Some((d, cm)),
    })
}

/// Evade the nearest direction that is closer than its own threshold; otherwise go forward.
///
/// With no plausible breach but a side reading as a fault, the rover stops instead of driving
/// past a blind spot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdNearest {
    thresholds: Thresholds,
    floor_cm: f64,
}

impl ThresholdNearest {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            floor_cm: default_floor(),
        }
    }

    /// Readings below `floor_cm` are treated as faults.
    pub fn with_fault_floor(mut self, floor_cm: f64) -> Self {
        self.floor_cm = floor_cm;
        self
    }
}

impl ArbitrationPolicy for ThresholdNearest {
    fn name(&self) -> &'static str {
        "threshold_nearest"
    }

    fn decide(&self, state: &AggregatedState) -> Option<Command> {
        let breaches = state
            .plausible_readings(self.floor_cm)
            .filter(|(d, cm)| *cm < self.thresholds.get(*d));

        match nearest(breaches) {
            Some((d, _)) => Some(d.evade()),
            None if state.any_faulted(self.floor_cm) => Some(Command::Stop),
            None => Some(Command::Forward),
        }
    }
}

/// Evade the globally nearest direction when it is within range; otherwise hold still.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalMinimum {
    threshold_cm: f64,
    floor_cm: f64,
}

impl GlobalMinimum {
    pub fn new(threshold_cm: f64) -> Self {
        Self {
            threshold_cm,
            floor_cm: default_floor(),
        }
    }

    /// Readings below `floor_cm` are treated as faults.
    pub fn with_fault_floor(mut self, floor_cm: f64) -> Self {
        self.floor_cm = floor_cm;
        self
    }
}

impl ArbitrationPolicy for GlobalMinimum {
    fn name(&self) -> &'static str {
        "global_minimum"
    }

    fn decide(&self, state: &AggregatedState) -> Option<Command> {
        match nearest(state.plausible_readings(self.floor_cm)) {
            Some((d, cm)) if cm <= self.threshold_cm => Some(d.evade()),
            _ => Some(Command::Stop),
        }
    }
}

/// Front/back only: drive toward whichever end has more room.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Differential {
    floor_cm: f64,
}

impl Default for Differential {
    fn default() -> Self {
        Self::new()
    }
}

impl Differential {
    pub fn new() -> Self {
        Self {
            floor_cm: default_floor(),
        }
    }

    /// Readings below `floor_cm` are treated as faults.
    pub fn with_fault_floor(mut self, floor_cm: f64) -> Self {
        self.floor_cm = floor_cm;
        self
    }
}

impl ArbitrationPolicy for Differential {
    fn name(&self) -> &'static str {
        "differential"
    }

    fn decide(&self, state: &AggregatedState) -> Option<Command> {
        let front = state.distance(Direction::Front)?;
        let back = state.distance(Direction::Back)?;
        if !is_plausible(front, self.floor_cm) || !is_plausible(back, self.floor_cm) {
            return Some(Command::Stop);
        }

        let back_minus_front = back - front;
        if back_minus_front > 0.0 {
            Some(Command::Forward)
        } else if back_minus_front < 0.0 {
            Some(Command::Backward)
        } else {
            None
        }
    }
}
