//! Core motion vocabulary shared by all gantry crates.
//!
//! All enums use `#[repr(u8)]` for compact layout. `MotorCommand` is the
//! only instruction either motor driver accepts; `Direction` is the output
//! of quadrature decoding; `LimitFlags` is a per-cycle diagnostic snapshot
//! of the end-stop inputs.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Instruction accepted by the DC motor driver and the stepper scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MotorCommand {
    /// Release both direction outputs (coast, no active drive).
    Stop = 0,
    /// Drive toward the far end of travel.
    Forward = 1,
    /// Drive toward the near (start) end of travel.
    Backward = 2,
}

impl MotorCommand {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stop),
            1 => Some(Self::Forward),
            2 => Some(Self::Backward),
            _ => None,
        }
    }

    /// Whether this command requests motion.
    #[inline]
    pub const fn is_motion(&self) -> bool {
        matches!(self, Self::Forward | Self::Backward)
    }
}

impl Default for MotorCommand {
    fn default() -> Self {
        Self::Stop
    }
}

/// Direction of one decoded encoder tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    /// Counter-clockwise tick (position decrement).
    Left = 0,
    /// Clockwise tick (position increment).
    Right = 1,
}

impl Direction {
    /// Signed unit step for position arithmetic: `Left` = -1, `Right` = +1.
    #[inline]
    pub const fn sign(&self) -> i32 {
        match self {
            Self::Left => -1,
            Self::Right => 1,
        }
    }
}

/// Gantry axes with a tracked position counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    /// All axes in coordination order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Array index for per-axis storage.
    #[inline]
    pub const fn index(&self) -> usize {
        *self as usize
    }
}

bitflags! {
    /// Snapshot of the end-stop inputs, for status logging only.
    ///
    /// Motion decisions always read the limit lines live; this snapshot is
    /// rebuilt every time it is requested and never cached.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LimitFlags: u8 {
        const X_START = 1 << 0;
        const X_END = 1 << 1;
        const Y_START = 1 << 2;
        const Y_END = 1 << 3;
        const Z_START = 1 << 4;
        const Z_END = 1 << 5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motor_command_from_u8_roundtrip() {
        for cmd in [MotorCommand::Stop, MotorCommand::Forward, MotorCommand::Backward] {
            assert_eq!(MotorCommand::from_u8(cmd as u8), Some(cmd));
        }
        assert_eq!(MotorCommand::from_u8(3), None);
        assert_eq!(MotorCommand::from_u8(255), None);
    }

    #[test]
    fn motor_command_default_is_stop() {
        assert_eq!(MotorCommand::default(), MotorCommand::Stop);
        assert!(!MotorCommand::Stop.is_motion());
        assert!(MotorCommand::Forward.is_motion());
        assert!(MotorCommand::Backward.is_motion());
    }

    #[test]
    fn direction_signs() {
        assert_eq!(Direction::Left.sign(), -1);
        assert_eq!(Direction::Right.sign(), 1);
    }

    #[test]
    fn axis_indices_are_dense() {
        for (i, axis) in Axis::ALL.iter().enumerate() {
            assert_eq!(axis.index(), i);
        }
    }

    #[test]
    fn limit_flags_compose() {
        let flags = LimitFlags::X_START | LimitFlags::Y_END;
        assert!(flags.contains(LimitFlags::X_START));
        assert!(!flags.contains(LimitFlags::X_END));
        assert_eq!(LimitFlags::default(), LimitFlags::empty());
    }
}
