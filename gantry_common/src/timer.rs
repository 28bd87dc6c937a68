//! One-shot step timer capability.
//!
//! The stepper scheduler needs a periodic timer that delivers two ordered
//! events per period: a compare-match partway through the period and an
//! overflow at its end. The scheduler arms the timer when it accepts a
//! motion instruction; the overflow handler disarms it again, so exactly
//! one period elapses per accepted command.
//!
//! The period itself is a fixed backend configuration (one constant for the
//! whole scheduler); the capability only exposes the enable state.

use std::sync::Arc;

/// Enable/disable handle for the stepper pulse timer.
///
/// Implementations use interior mutability so the handle can be shared
/// between the arming context (main loop) and the disarming context
/// (overflow handler).
pub trait StepTimer: Send + Sync {
    /// Enable the periodic interrupt pair for the next period.
    fn arm(&self);

    /// Disable the periodic interrupt pair.
    fn disarm(&self);

    /// Whether the timer is currently armed.
    fn is_armed(&self) -> bool;
}

/// Shared handle to the step timer.
pub type StepTimerRef = Arc<dyn StepTimer>;
