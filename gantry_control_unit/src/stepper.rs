//! Stepper pulse scheduler.
//!
//! One timer drives one stepper group: the Z move channel and the gripper
//! channel, each with its own direction/step pin pair, pulsed together as
//! wired on this machine's drive electronics. An accepted motion
//! instruction arms
//! the timer for exactly one period; the compare-match handler raises the
//! step pins and counts the step, the overflow handler (later in the same
//! period) disarms the timer again. The pulse state machine
//! `{Idle, Pulsing}` is the sole concurrency guard between the main loop
//! and the timer handlers: any instruction issued while a pulse is in
//! flight is dropped, and the level-triggered coordinator retries on a
//! later iteration.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use gantry_common::signal::{InputLine, OutputLine};
use gantry_common::timer::StepTimerRef;
use gantry_common::types::{Axis, MotorCommand};
use tracing::trace;

use crate::position::SharedPositions;

/// Pulse progress of the stepper group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PulseState {
    /// No step in flight; instructions are accepted.
    Idle = 0,
    /// A commanded step is in flight until the overflow handler runs.
    Pulsing = 1,
}

/// Direction/step pin pair of one stepper channel.
pub struct StepperChannel {
    /// Direction line; asserted = forward.
    pub dir: OutputLine,
    /// Step line; the rising assert is the physical pulse.
    pub step: OutputLine,
}

impl StepperChannel {
    pub fn new(dir: OutputLine, step: OutputLine) -> Self {
        Self { dir, step }
    }

    fn init(&self) {
        self.dir.init();
        self.step.init();
    }
}

/// Main-loop half of the stepper group.
pub struct StepperDriver {
    name: &'static str,
    axis: StepperChannel,
    grip: StepperChannel,
    limit_forward: Option<InputLine>,
    limit_backward: Option<InputLine>,
    pulse: Arc<AtomicU8>,
    timer: StepTimerRef,
    positions: SharedPositions,
}

impl StepperDriver {
    /// Bind the stepper group. Limit inputs are optional; an unconfigured
    /// side always reports "not limited" (steppers without end-stops).
    pub fn new(
        name: &'static str,
        axis: StepperChannel,
        grip: StepperChannel,
        limit_forward: Option<InputLine>,
        limit_backward: Option<InputLine>,
        timer: StepTimerRef,
        positions: SharedPositions,
    ) -> Self {
        Self {
            name,
            axis,
            grip,
            limit_forward,
            limit_backward,
            pulse: Arc::new(AtomicU8::new(PulseState::Idle as u8)),
            timer,
            positions,
        }
    }

    /// Configure all pins, disarm the timer, and stop.
    pub fn init(&self) {
        self.axis.init();
        self.grip.init();
        if let Some(limit) = &self.limit_forward {
            limit.init();
        }
        if let Some(limit) = &self.limit_backward {
            limit.init();
        }
        self.timer.disarm();
        self.pulse.store(PulseState::Idle as u8, Ordering::Release);
        self.instruction(MotorCommand::Stop);
    }

    /// Whether a commanded step is still in flight.
    #[inline]
    pub fn pending_step(&self) -> bool {
        self.pulse.load(Ordering::Acquire) == PulseState::Pulsing as u8
    }

    /// Live read of the forward end-stop; unconfigured = never limited.
    #[inline]
    pub fn forward_limit(&self) -> bool {
        self.limit_forward.as_ref().is_some_and(InputLine::is_asserted)
    }

    /// Live read of the backward end-stop; unconfigured = never limited.
    #[inline]
    pub fn backward_limit(&self) -> bool {
        self.limit_backward.as_ref().is_some_and(InputLine::is_asserted)
    }

    /// Issue one instruction.
    ///
    /// Dropped wholesale while a pulse is in flight. Motion toward a
    /// tripped limit degrades to `Stop` (guard first, dispatch flat).
    /// `Stop` clears the step lines and leaves the timer alone; only the
    /// overflow handler disarms it.
    pub fn instruction(&self, command: MotorCommand) {
        if self.pending_step() {
            trace!("stepper {}: {:?} dropped, pulse in flight", self.name, command);
            return;
        }

        let effective = match command {
            MotorCommand::Forward if self.forward_limit() => MotorCommand::Stop,
            MotorCommand::Backward if self.backward_limit() => MotorCommand::Stop,
            other => other,
        };

        match effective {
            MotorCommand::Forward => {
                self.axis.dir.assert_line();
                self.grip.dir.assert_line();
                self.ready_step_lines();
                self.begin_pulse();
            }
            MotorCommand::Backward => {
                self.axis.dir.deassert();
                self.grip.dir.deassert();
                self.ready_step_lines();
                self.begin_pulse();
            }
            MotorCommand::Stop => {
                self.ready_step_lines();
            }
        }
    }

    /// Handler half sharing this group's pins, pulse state, and counter.
    pub fn isr(&self) -> StepperIsr {
        StepperIsr {
            axis_dir: self.axis.dir.clone(),
            axis_step: self.axis.step.clone(),
            grip_step: self.grip.step.clone(),
            pulse: self.pulse.clone(),
            timer: self.timer.clone(),
            positions: self.positions.clone(),
        }
    }

    /// Clear both step lines, ready to pulse.
    fn ready_step_lines(&self) {
        self.axis.step.deassert();
        self.grip.step.deassert();
    }

    fn begin_pulse(&self) {
        self.pulse.store(PulseState::Pulsing as u8, Ordering::Release);
        self.timer.arm();
    }
}

/// Interrupt-context half of the stepper group.
///
/// The backend invokes [`StepperIsr::on_compare_match`] and
/// [`StepperIsr::on_overflow`] in hardware order: compare-match always
/// precedes overflow within a timer period, which yields exactly one
/// pulse width and one counter update per accepted instruction.
pub struct StepperIsr {
    axis_dir: OutputLine,
    axis_step: OutputLine,
    grip_step: OutputLine,
    pulse: Arc<AtomicU8>,
    timer: StepTimerRef,
    positions: SharedPositions,
}

impl StepperIsr {
    /// Begin the physical pulse and count the step.
    ///
    /// The Z counter moves by the direction just written to the pins:
    /// +1 with the direction line asserted, -1 otherwise.
    pub fn on_compare_match(&self) {
        self.axis_step.assert_line();
        self.grip_step.assert_line();
        let delta = if self.axis_dir.is_asserted() { 1 } else { -1 };
        self.positions.offset(Axis::Z, delta);
    }

    /// Complete the pulse: disarm the timer and accept new instructions.
    pub fn on_overflow(&self) {
        self.timer.disarm();
        self.pulse.store(PulseState::Idle as u8, Ordering::Release);
    }
}
