//! Simulated digital pin.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use gantry_common::signal::{Level, Signal};
use tracing::trace;

/// Configured mode of a simulated pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PinMode {
    /// Not yet configured.
    Floating = 0,
    /// Push-pull output.
    Output = 1,
    /// Input with pull-up.
    InputPullup = 2,
}

impl PinMode {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Output,
            2 => Self::InputPullup,
            _ => Self::Floating,
        }
    }
}

/// In-memory pin backing a [`Signal`] binding.
///
/// The level is a plain atomic: the control unit drives it through the
/// capability, the simulated physics (and tests) set it directly with
/// [`SimPin::set_level`].
pub struct SimPin {
    name: &'static str,
    mode: AtomicU8,
    level: AtomicU8,
}

impl SimPin {
    /// Create a floating pin reading low.
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            mode: AtomicU8::new(PinMode::Floating as u8),
            level: AtomicU8::new(Level::Low as u8),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn mode(&self) -> PinMode {
        PinMode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    /// Current level, for harness-side observation.
    pub fn level(&self) -> Level {
        if self.level.load(Ordering::Relaxed) == Level::High as u8 {
            Level::High
        } else {
            Level::Low
        }
    }

    /// Force the level from the simulated-physics side.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::Relaxed);
    }
}

impl Signal for SimPin {
    fn configure_output(&self) {
        self.mode.store(PinMode::Output as u8, Ordering::Relaxed);
        trace!("pin {} configured as output", self.name);
    }

    fn configure_input_pullup(&self) {
        self.mode.store(PinMode::InputPullup as u8, Ordering::Relaxed);
        // The pull-up floats an undriven input high.
        self.level.store(Level::High as u8, Ordering::Relaxed);
        trace!("pin {} configured as pulled-up input", self.name);
    }

    fn drive(&self, level: Level) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    fn read(&self) -> Level {
        self.level()
    }
}
