//! Digital signal capability.
//!
//! The motion core never touches pins or registers directly; every named
//! hardware signal is bound once at startup to an implementation of
//! [`Signal`]. Backends (real GPIO, simulation) provide the implementation;
//! the core only sees the capability.
//!
//! [`InputLine`] and [`OutputLine`] wrap a signal with its wiring polarity
//! so that the rest of the code reasons in asserted/de-asserted terms
//! instead of raw levels. Limit switches and encoder channels on this
//! machine are wired active-low against pull-ups; the wrappers keep that
//! knowledge out of the drivers.

use std::sync::Arc;

/// Electrical level of a digital signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Level {
    Low = 0,
    High = 1,
}

impl Level {
    #[inline]
    pub const fn is_high(&self) -> bool {
        matches!(self, Self::High)
    }

    /// The opposite level.
    #[inline]
    pub const fn inverted(&self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

/// Capability handle for one named hardware signal.
///
/// Implementations use interior mutability (the underlying hardware is
/// inherently shared), so handles can be cloned into interrupt context.
pub trait Signal: Send + Sync {
    /// Configure the signal as a push-pull output.
    fn configure_output(&self);

    /// Configure the signal as an input with the internal pull-up enabled.
    fn configure_input_pullup(&self);

    /// Drive the output to the given level.
    fn drive(&self, level: Level);

    /// Read the current level.
    fn read(&self) -> Level;
}

/// Shared handle to a bound signal.
pub type SignalRef = Arc<dyn Signal>;

/// An input signal together with the level at which it is asserted.
#[derive(Clone)]
pub struct InputLine {
    signal: SignalRef,
    active: Level,
}

impl InputLine {
    /// Bind an input line. `active` is the level that means "asserted"
    /// (limit tripped, channel closed, button pressed).
    pub fn new(signal: SignalRef, active: Level) -> Self {
        Self { signal, active }
    }

    /// Active-low input against the internal pull-up, the common wiring
    /// for switches and encoder channels on this machine.
    pub fn active_low(signal: SignalRef) -> Self {
        Self::new(signal, Level::Low)
    }

    /// Configure the underlying signal as a pulled-up input.
    pub fn init(&self) {
        self.signal.configure_input_pullup();
    }

    /// Read the line, folding in polarity.
    #[inline]
    pub fn is_asserted(&self) -> bool {
        self.signal.read() == self.active
    }
}

/// An output signal together with the level at which it is asserted.
#[derive(Clone)]
pub struct OutputLine {
    signal: SignalRef,
    active: Level,
}

impl OutputLine {
    pub fn new(signal: SignalRef, active: Level) -> Self {
        Self { signal, active }
    }

    /// Active-high output (direction and step pins).
    pub fn active_high(signal: SignalRef) -> Self {
        Self::new(signal, Level::High)
    }

    /// Configure the underlying signal as an output, de-asserted.
    pub fn init(&self) {
        self.signal.configure_output();
        self.deassert();
    }

    #[inline]
    pub fn assert_line(&self) {
        self.signal.drive(self.active);
    }

    #[inline]
    pub fn deassert(&self) {
        self.signal.drive(self.active.inverted());
    }

    /// Read back the driven state, folding in polarity.
    #[inline]
    pub fn is_asserted(&self) -> bool {
        self.signal.read() == self.active
    }
}
