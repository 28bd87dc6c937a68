//! Simulated step timer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gantry_common::timer::StepTimer;
use tracing::trace;

/// Armed flag standing in for the hardware timer's interrupt enable bits.
///
/// The simulation harness polls [`StepTimer::is_armed`] and, when set,
/// invokes the stepper's compare-match and overflow handlers in hardware
/// order (compare-match first).
#[derive(Debug, Default)]
pub struct SimTimer {
    armed: AtomicBool,
}

impl SimTimer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            armed: AtomicBool::new(false),
        })
    }
}

impl StepTimer for SimTimer {
    fn arm(&self) {
        self.armed.store(true, Ordering::Release);
        trace!("step timer armed");
    }

    fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
        trace!("step timer disarmed");
    }

    fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_disarm_cycle() {
        let timer = SimTimer::new();
        assert!(!timer.is_armed());
        timer.arm();
        assert!(timer.is_armed());
        timer.disarm();
        assert!(!timer.is_armed());
    }
}
