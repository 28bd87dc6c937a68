//! Motion coordination: reconcile target vs. actual position per axis.
//!
//! The coordinator is level-triggered and has no memory: every iteration
//! it compares each position counter with its target and issues exactly
//! one instruction per axis. A limit switch silently degrades the
//! instruction to `Stop` inside the driver; as long as target differs from
//! current the coordinator keeps re-issuing the motion command, so the
//! axis stalls at a tripped limit rather than faulting.

use std::cmp::Ordering;
use std::time::Duration;

use gantry_common::display::CharacterDisplay;
use gantry_common::types::{Axis, LimitFlags, MotorCommand};
use tracing::{debug, info};

use crate::dcmotor::DcMotor;
use crate::position::{SharedPositions, TargetPositions};
use crate::stepper::StepperDriver;

/// Pure reconciliation: the instruction that moves `current` toward
/// `target`, before limit interlocks.
#[inline]
pub fn reconcile(current: i32, target: i32) -> MotorCommand {
    match current.cmp(&target) {
        Ordering::Equal => MotorCommand::Stop,
        Ordering::Less => MotorCommand::Forward,
        Ordering::Greater => MotorCommand::Backward,
    }
}

/// Drives the three axes from the shared position state.
pub struct MotionCoordinator {
    x: DcMotor,
    y: DcMotor,
    z: StepperDriver,
    positions: SharedPositions,
}

impl MotionCoordinator {
    pub fn new(x: DcMotor, y: DcMotor, z: StepperDriver, positions: SharedPositions) -> Self {
        Self { x, y, z, positions }
    }

    /// Initialize all drivers (pins configured, everything stopped).
    pub fn init(&self) {
        self.x.init();
        self.y.init();
        self.z.init();
    }

    /// One coordination pass: one instruction per axis.
    pub fn tick(&self, targets: &TargetPositions) {
        self.x
            .instruction(reconcile(self.positions.get(Axis::X), targets.get(Axis::X)));
        self.y
            .instruction(reconcile(self.positions.get(Axis::Y), targets.get(Axis::Y)));
        self.z
            .instruction(reconcile(self.positions.get(Axis::Z), targets.get(Axis::Z)));
    }

    /// Force every driver to `Stop` (emergency path).
    pub fn stop_all(&self) {
        self.x.instruction(MotorCommand::Stop);
        self.y.instruction(MotorCommand::Stop);
        self.z.instruction(MotorCommand::Stop);
    }

    /// Diagnostic snapshot of the end-stop inputs, rebuilt on every call.
    pub fn limit_flags(&self) -> LimitFlags {
        let mut flags = LimitFlags::empty();
        flags.set(LimitFlags::X_START, self.x.backward_limit());
        flags.set(LimitFlags::X_END, self.x.forward_limit());
        flags.set(LimitFlags::Y_START, self.y.backward_limit());
        flags.set(LimitFlags::Y_END, self.y.forward_limit());
        flags.set(LimitFlags::Z_START, self.z.backward_limit());
        flags.set(LimitFlags::Z_END, self.z.forward_limit());
        flags
    }

    /// The stepper group, for binding its interrupt handlers.
    pub fn z(&self) -> &StepperDriver {
        &self.z
    }
}

// ─── Calibration ────────────────────────────────────────────────────

/// Phase of the X/Y calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    /// Not calibrating.
    Idle,
    /// Driving X and Y backward toward their start limits.
    Seeking,
    /// Both start limits tripped; counters zeroed.
    Complete,
}

/// Result of one calibration tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStatus {
    InProgress,
    Complete,
}

/// Drive X and Y to their start limits, then zero positions and targets.
///
/// Calibration deliberately monopolizes the main loop for its duration —
/// it is an infrequent, supervised operation. There is no timeout: a limit
/// input stuck asserted-low never trips and blocks the run forever, a
/// known limitation of the machine. Callers that need a bound drive
/// [`CalibrationRoutine::tick`] themselves.
#[derive(Debug)]
pub struct CalibrationRoutine {
    phase: CalibrationPhase,
}

impl CalibrationRoutine {
    pub const fn new() -> Self {
        Self {
            phase: CalibrationPhase::Idle,
        }
    }

    #[inline]
    pub const fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Begin seeking (no-op when already running).
    pub fn start(&mut self) {
        if self.phase == CalibrationPhase::Idle {
            self.phase = CalibrationPhase::Seeking;
        }
    }

    /// One calibration pass over the DC axes.
    ///
    /// Each axis not yet at its start limit is driven backward; an axis at
    /// the limit is held stopped. When both limits report tripped, X/Y
    /// position and target counters are zeroed and the phase completes.
    pub fn tick(
        &mut self,
        coordinator: &MotionCoordinator,
        targets: &mut TargetPositions,
    ) -> CalibrationStatus {
        match self.phase {
            CalibrationPhase::Idle => CalibrationStatus::InProgress,
            CalibrationPhase::Complete => CalibrationStatus::Complete,
            CalibrationPhase::Seeking => {
                let x_home = coordinator.x.backward_limit();
                let y_home = coordinator.y.backward_limit();

                coordinator.x.instruction(if x_home {
                    MotorCommand::Stop
                } else {
                    MotorCommand::Backward
                });
                coordinator.y.instruction(if y_home {
                    MotorCommand::Stop
                } else {
                    MotorCommand::Backward
                });

                if x_home && y_home {
                    coordinator.positions.set(Axis::X, 0);
                    coordinator.positions.set(Axis::Y, 0);
                    targets.set(Axis::X, 0);
                    targets.set(Axis::Y, 0);
                    self.phase = CalibrationPhase::Complete;
                    info!("calibration complete, X/Y zeroed");
                    return CalibrationStatus::Complete;
                }
                CalibrationStatus::InProgress
            }
        }
    }

    /// Blocking calibration: tick at `poll_interval` until both start
    /// limits trip. Blocks the caller for the whole run by design.
    pub fn run_blocking(
        &mut self,
        coordinator: &MotionCoordinator,
        targets: &mut TargetPositions,
        display: &mut dyn CharacterDisplay,
        poll_interval: Duration,
    ) {
        display.clear();
        display.put_str("CALIBRATING X/Y");
        debug!("calibration started");

        self.start();
        while self.tick(coordinator, targets) == CalibrationStatus::InProgress {
            std::thread::sleep(poll_interval);
        }

        display.clear();
        display.put_str("CALIBRATION DONE");
    }
}

impl Default for CalibrationRoutine {
    fn default() -> Self {
        Self::new()
    }
}
