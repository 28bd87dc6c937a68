//! DC motor driver with limit-switch interlock.
//!
//! Two independent H-bridge-style outputs (X and Y), each with a direction
//! pin pair and two end-stop inputs. A motion instruction toward a tripped
//! limit is downgraded to `Stop` before dispatch; the guard is evaluated
//! first and the stop branch dispatched directly, keeping the transition
//! table flat. Limit inputs are read live on every decision and never
//! cached.

use gantry_common::signal::{InputLine, OutputLine};
use gantry_common::types::MotorCommand;
use tracing::trace;

/// One H-bridge output with its two end-stops.
///
/// `limit_forward` trips at the far end of travel (blocks `Forward`),
/// `limit_backward` at the start end (blocks `Backward`).
pub struct DcMotor {
    name: &'static str,
    forward: OutputLine,
    backward: OutputLine,
    limit_forward: InputLine,
    limit_backward: InputLine,
}

impl DcMotor {
    pub fn new(
        name: &'static str,
        forward: OutputLine,
        backward: OutputLine,
        limit_forward: InputLine,
        limit_backward: InputLine,
    ) -> Self {
        Self {
            name,
            forward,
            backward,
            limit_forward,
            limit_backward,
        }
    }

    /// Configure direction outputs and pulled-up limit inputs, then stop.
    /// Guarantees no uncommanded motion at power-up.
    pub fn init(&self) {
        self.forward.init();
        self.backward.init();
        self.limit_forward.init();
        self.limit_backward.init();
        self.instruction(MotorCommand::Stop);
    }

    /// Live read of the far end-stop.
    #[inline]
    pub fn forward_limit(&self) -> bool {
        self.limit_forward.is_asserted()
    }

    /// Live read of the start end-stop.
    #[inline]
    pub fn backward_limit(&self) -> bool {
        self.limit_backward.is_asserted()
    }

    /// Issue one instruction, downgrading to `Stop` at a tripped limit.
    pub fn instruction(&self, command: MotorCommand) {
        let effective = match command {
            MotorCommand::Forward if self.forward_limit() => MotorCommand::Stop,
            MotorCommand::Backward if self.backward_limit() => MotorCommand::Stop,
            other => other,
        };
        if effective != command {
            trace!("dc motor {}: {:?} degraded to Stop at limit", self.name, command);
        }

        match effective {
            MotorCommand::Forward => {
                self.forward.assert_line();
                self.backward.deassert();
            }
            MotorCommand::Backward => {
                self.forward.deassert();
                self.backward.assert_line();
            }
            MotorCommand::Stop => {
                self.forward.deassert();
                self.backward.deassert();
            }
        }
    }
}
