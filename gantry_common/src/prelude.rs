//! Common re-exports for gantry crates.

pub use crate::display::{CharacterDisplay, NullDisplay};
pub use crate::signal::{InputLine, Level, OutputLine, Signal, SignalRef};
pub use crate::timer::{StepTimer, StepTimerRef};
pub use crate::types::{Axis, Direction, LimitFlags, MotorCommand};
