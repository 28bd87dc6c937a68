//! Emergency stop supervision.
//!
//! The external emergency interrupt raises a latch; the main loop observes
//! it, forces every motor to `Stop`, renders the alert, and suppresses the
//! coordinator and decoders until the operator recovers. Recovery is a
//! level check at the moment of confirm: the confirm input must be held
//! while the external emergency line reads de-asserted.
//!
//! The mode is an explicit tagged state (`Normal | Emergency`) rather than
//! a bare flag with handled-booleans; re-entry of the stop action while in
//! `Emergency` is keyed to changes of the confirm input level.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gantry_common::display::CharacterDisplay;
use gantry_common::signal::InputLine;
use tracing::{info, warn};

use crate::coordinator::MotionCoordinator;

/// Process-wide emergency flag.
///
/// Set only from the interrupt context bound to the external emergency
/// line; cleared only by the supervisor once recovery is observed in the
/// main loop.
#[derive(Debug, Clone, Default)]
pub struct EmergencyLatch {
    raised: Arc<AtomicBool>,
}

impl EmergencyLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt-context entry point: raise the flag.
    #[inline]
    pub fn trigger(&self) {
        self.raised.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Main-loop only: clear after recovery.
    #[inline]
    fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }
}

/// Supervisor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Motion allowed; only the latch is watched.
    Normal,
    /// All motion suppressed; only the recovery condition is polled.
    Emergency,
}

/// Main-loop half of the emergency stop override.
pub struct EmergencySupervisor {
    latch: EmergencyLatch,
    /// External emergency line, read for the recovery level check.
    line: InputLine,
    /// Operator confirm input.
    confirm: InputLine,
    state: SupervisorState,
    last_confirm: bool,
}

impl EmergencySupervisor {
    pub fn new(latch: EmergencyLatch, line: InputLine, confirm: InputLine) -> Self {
        Self {
            latch,
            line,
            confirm,
            state: SupervisorState::Normal,
            last_confirm: false,
        }
    }

    /// Configure the supervised inputs.
    pub fn init(&self) {
        self.line.init();
        self.confirm.init();
    }

    #[inline]
    pub const fn state(&self) -> SupervisorState {
        self.state
    }

    /// One supervision pass. Returns whether motion control may run this
    /// iteration; while it returns `false` the caller must not invoke the
    /// coordinator or the decoders.
    pub fn tick(
        &mut self,
        motors: &MotionCoordinator,
        display: &mut dyn CharacterDisplay,
    ) -> bool {
        match self.state {
            SupervisorState::Normal => {
                if !self.latch.is_raised() {
                    return true;
                }
                warn!("emergency stop triggered, halting all motion");
                self.enter_emergency(motors, display);
                false
            }
            SupervisorState::Emergency => {
                let confirm = self.confirm.is_asserted();

                // Re-assert the stop against any residual motion command
                // whenever the confirm level changes while still stopped.
                if confirm != self.last_confirm {
                    self.halt_and_alert(motors, display);
                    self.last_confirm = confirm;
                }

                if confirm && !self.line.is_asserted() {
                    self.latch.clear();
                    self.state = SupervisorState::Normal;
                    self.last_confirm = false;
                    display.clear();
                    info!("emergency cleared by operator, resuming");
                }
                false
            }
        }
    }

    fn enter_emergency(&mut self, motors: &MotionCoordinator, display: &mut dyn CharacterDisplay) {
        self.state = SupervisorState::Emergency;
        self.last_confirm = self.confirm.is_asserted();
        self.halt_and_alert(motors, display);
    }

    fn halt_and_alert(&self, motors: &MotionCoordinator, display: &mut dyn CharacterDisplay) {
        motors.stop_all();
        display.clear();
        display.set_cursor(0, 0);
        display.put_str("EMERGENCY STOP");
        display.set_cursor(0, 1);
        display.put_str("clear + hold button");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_starts_lowered() {
        let latch = EmergencyLatch::new();
        assert!(!latch.is_raised());
        latch.trigger();
        assert!(latch.is_raised());
        // Clones share the flag (interrupt-context handle).
        let isr_handle = latch.clone();
        latch.clear();
        assert!(!isr_handle.is_raised());
    }
}
