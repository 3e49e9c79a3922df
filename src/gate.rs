//! Stabilization gate.
//!
//! Arbitration only runs once every configured sensor has reported a plausible distance, one at
//! or above the fault threshold. Echo timeouts keep the gate shut. After that the gate watches for the whole array reading near zero at the same time, which is what a set of
//! timed-out echoes looks like. Enough of those cycles in a row and the gate drops back to waiting
//! until every sensor reports again.

use tracing::{info, warn};

use crate::aggregate::AggregatedState;
use crate::config::FaultConfig;
use crate::is_plausible;

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    /// Not every direction has reported a plausible distance yet.
    Waiting,
    /// Every direction reported; this cycle is the first trusted one.
    Stabilized,
    Ready,
    /// The fault countdown ran out on this cycle; the gate is waiting again.
    Faulted,
}

impl GateStatus {
    /// Whether arbitration may run on this cycle.
    pub fn is_open(self) -> bool {
        matches!(self, GateStatus::Stabilized | GateStatus::Ready)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StabilizationGate {
    ready: bool,
    fault_threshold: f64,
    initial_countdown: Option<u32>,
    countdown: Option<u32>,
}

impl StabilizationGate {
    pub fn new(fault: &FaultConfig) -> Self {
        Self {
            ready: false,
            fault_threshold: fault.threshold_cm,
            initial_countdown: fault.countdown,
            countdown: fault.countdown,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Remaining all-faulted cycles before a reset, or `None` when fault detection is off.
    pub fn fault_countdown(&self) -> Option<u32> {
        self.countdown
    }

    /// Marks the gate ready once every active direction has reported a plausible distance.
    pub fn check_ready(&mut self, state: &AggregatedState) -> bool {
        if !self.ready && state.all_plausible(self.fault_threshold) {
            self.ready = true;
            self.countdown = self.initial_countdown;
        }
        self.ready
    }

    /// Runs one fault-countdown step. Returns `true` when the countdown ran out, in which case the
    /// gate is no longer ready and every reported flag in `state` has been cleared.
    pub fn check_fault(&mut self, state: &mut AggregatedState) -> bool {
        if !self.ready {
            return false;
        }
        let Some(remaining) = self.countdown else {
            return false;
        };

        let threshold = self.fault_threshold;
        let all_faulted = state.readings().all(|(_, cm)| !is_plausible(cm, threshold));
        if !all_faulted {
            self.countdown = self.initial_countdown;
            return false;
        }

        let remaining = remaining.saturating_sub(1);
        if remaining > 0 {
            warn!(remaining, "all sensors read near zero");
            self.countdown = Some(remaining);
            return false;
        }

        self.ready = false;
        self.countdown = self.initial_countdown;
        state.clear_reported();
        true
    }

    /// Readiness then fault check, as run once per decision cycle.
    pub fn evaluate(&mut self, state: &mut AggregatedState) -> GateStatus {
        let was_ready = self.ready;
        if !self.check_ready(state) {
            return GateStatus::Waiting;
        }
        if self.check_fault(state) {
            warn!("sensor array faulted, waiting for re-stabilization");
            return GateStatus::Faulted;
        }
        if was_ready {
            GateStatus::Ready
        } else {
            info!("sensors stabilized");
            GateStatus::Stabilized
        }
    }
}
