//! Shared position counters.
//!
//! `AxisPositions` is the only state touched from both interrupt and
//! main-loop context. The ownership rule is single-writer-per-field:
//! X and Y are written only by the main loop's jog decoders, Z only by the
//! stepper compare-match handler. With one writer per field no lock is
//! needed; the non-writing context reads relaxed atomics and tolerates a
//! value stale by at most one interrupt period. Reading several axes is
//! NOT an atomic snapshot.
//!
//! Counters are accumulated encoder/step ticks since the last calibration,
//! fixed-width and wrapping on overflow.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use gantry_common::types::Axis;

/// Cross-context per-axis position counters.
#[derive(Debug, Default)]
pub struct AxisPositions {
    x: AtomicI32,
    y: AtomicI32,
    z: AtomicI32,
}

impl AxisPositions {
    /// Zeroed counters, shared between contexts.
    pub fn shared() -> SharedPositions {
        Arc::new(Self::default())
    }

    fn cell(&self, axis: Axis) -> &AtomicI32 {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    /// Read one counter. Stale by at most one interrupt period when read
    /// from the non-writing context.
    #[inline]
    pub fn get(&self, axis: Axis) -> i32 {
        self.cell(axis).load(Ordering::Relaxed)
    }

    /// Apply a signed offset, wrapping on overflow. Only the owning
    /// context of the field may call this.
    #[inline]
    pub fn offset(&self, axis: Axis, delta: i32) {
        self.cell(axis).fetch_add(delta, Ordering::Relaxed);
    }

    /// Overwrite one counter (calibration zeroing).
    #[inline]
    pub fn set(&self, axis: Axis, value: i32) {
        self.cell(axis).store(value, Ordering::Relaxed);
    }

    /// Per-axis values in `Axis::ALL` order. Each field is read once;
    /// the combination is not atomic across fields.
    pub fn snapshot(&self) -> [i32; 3] {
        [self.get(Axis::X), self.get(Axis::Y), self.get(Axis::Z)]
    }
}

/// Handle cloned into interrupt context.
pub type SharedPositions = Arc<AxisPositions>;

/// Per-axis target counters, owned exclusively by the main loop and set by
/// the UI layer (jog increments or grid computations outside this core).
#[derive(Debug, Default, Clone)]
pub struct TargetPositions {
    values: [i32; 3],
}

impl TargetPositions {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, axis: Axis) -> i32 {
        self.values[axis.index()]
    }

    #[inline]
    pub fn set(&mut self, axis: Axis, value: i32) {
        self.values[axis.index()] = value;
    }

    /// Apply a signed offset, wrapping on overflow like the position
    /// counters it is compared against.
    #[inline]
    pub fn offset(&mut self, axis: Axis, delta: i32) {
        let cell = &mut self.values[axis.index()];
        *cell = cell.wrapping_add(delta);
    }
}
