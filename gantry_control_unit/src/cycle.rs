//! The polling control loop: supervise → read inputs → coordinate motion.
//!
//! One iteration runs in a fixed order: emergency supervision first (while
//! stopped, only the recovery condition is polled), then encoder reads,
//! then position update, then one coordination pass. Pacing uses
//! `Instant`-based sleeping in the default build.
//!
//! ## RT Setup
//! With the `rt` feature the loop can be pinned and scheduled like a
//! production control process:
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)` — lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` — pin to an isolated CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO)` — RT priority.
//! Without the feature all RT calls are no-ops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use gantry_common::display::CharacterDisplay;
use gantry_common::types::Axis;
use heapless::Deque;
use thiserror::Error;
use tracing::debug;

use crate::config::MotionConfig;
use crate::coordinator::{CalibrationRoutine, MotionCoordinator};
use crate::emergency::EmergencySupervisor;
use crate::encoder::{JogEncoder, UiEncoder, UiEvent};
use crate::position::{SharedPositions, TargetPositions};

/// Capacity of the UI event buffer; oldest events are dropped on overflow.
const UI_EVENT_CAPACITY: usize = 16;

/// Handler the UI layer supplies to consume decoded events and request
/// axis moves.
pub type UiHandler<'a> = &'a mut dyn FnMut(UiEvent, &mut TargetPositions);

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
///
/// Updated every cycle with no allocation; used for the exit summary and
/// overrun monitoring.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Number of overruns detected.
    pub overruns: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns < self.min_cycle_ns {
            self.min_cycle_ns = duration_ns;
        }
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
        self.sum_cycle_ns += duration_ns;
    }

    /// Average cycle time [ns] (0 before the first cycle).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors during RT setup or cycle execution.
#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
    /// Cycle overrun detected (hard deadline, `rt` builds only).
    #[error("cycle overrun: {actual_ns}ns > {budget_ns}ns budget")]
    CycleOverrun {
        /// Actual cycle duration [ns].
        actual_ns: i64,
        /// Configured cycle budget [ns].
        budget_ns: i64,
    },
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Lock all current and future memory pages (prevent page faults in the
/// control loop). No-op without the `rt` feature.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(()) // No-op in simulation mode
}

/// Prefault stack pages to prevent page faults during the loop.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    // Prevent the compiler from optimizing away the writes.
    for byte in buf.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Pin the current thread to a specific CPU core.
/// No-op without the `rt` feature.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(()) // No-op in simulation mode
}

/// Set SCHED_FIFO with the given RT priority.
/// No-op without the `rt` feature.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(()) // No-op in simulation mode
}

/// Perform the full RT setup sequence before entering the loop.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Owns the wired motion core and runs the polling loop.
pub struct CycleRunner {
    pub config: MotionConfig,
    pub supervisor: EmergencySupervisor,
    pub coordinator: MotionCoordinator,
    pub ui: UiEncoder,
    pub jog_x: JogEncoder,
    pub jog_y: JogEncoder,
    pub positions: SharedPositions,
    pub targets: TargetPositions,
    pub stats: CycleStats,
    display: Box<dyn CharacterDisplay>,
    ui_events: Deque<UiEvent, UI_EVENT_CAPACITY>,
    calibration: CalibrationRoutine,
    cycle_time_ns: i64,
}

impl CycleRunner {
    /// Assemble the core and configure every binding: all drivers end up
    /// stopped, all inputs pulled up.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: MotionConfig,
        display: Box<dyn CharacterDisplay>,
        supervisor: EmergencySupervisor,
        coordinator: MotionCoordinator,
        ui: UiEncoder,
        jog_x: JogEncoder,
        jog_y: JogEncoder,
        positions: SharedPositions,
    ) -> Self {
        supervisor.init();
        coordinator.init();
        ui.init();
        jog_x.init();
        jog_y.init();

        let cycle_time_ns = i64::from(config.cycle_time_us) * 1_000;
        Self {
            config,
            supervisor,
            coordinator,
            ui,
            jog_x,
            jog_y,
            positions,
            targets: TargetPositions::new(),
            stats: CycleStats::new(),
            display,
            ui_events: Deque::new(),
            calibration: CalibrationRoutine::new(),
            cycle_time_ns,
        }
    }

    /// Blocking X/Y calibration; monopolizes the loop by design.
    pub fn calibrate(&mut self) {
        self.calibration.run_blocking(
            &self.coordinator,
            &mut self.targets,
            self.display.as_mut(),
            Duration::from_micros(u64::from(self.config.cycle_time_us)),
        );
    }

    /// One control iteration in the fixed order: supervise → encoders →
    /// positions → coordinate. Public so tests and supervised callers can
    /// pace it themselves.
    pub fn step_once(&mut self, ui_handler: UiHandler<'_>) {
        // Emergency supervision gates everything else.
        if !self
            .supervisor
            .tick(&self.coordinator, self.display.as_mut())
        {
            return;
        }

        // UI encoder → buffered events → UI layer.
        if let Some(event) = self.ui.poll() {
            if self.ui_events.is_full() {
                // Oldest event gives way; the menu is best-effort.
                let _ = self.ui_events.pop_front();
            }
            let _ = self.ui_events.push_back(event);
        }
        while let Some(event) = self.ui_events.pop_front() {
            ui_handler(event, &mut self.targets);
        }

        // Jog encoders → position counters (main loop is the only writer
        // of X and Y).
        if let Some(tick) = self.jog_x.poll() {
            self.positions.offset(Axis::X, tick.sign());
        }
        if let Some(tick) = self.jog_y.poll() {
            self.positions.offset(Axis::Y, tick.sign());
        }

        // One instruction per axis.
        self.coordinator.tick(&self.targets);
    }

    /// Run the paced loop until `running` clears.
    ///
    /// In the default build an overrun is counted but the loop continues;
    /// with the `rt` feature an overrun is a hard failure.
    pub fn run(&mut self, running: &AtomicBool, ui_handler: UiHandler<'_>) -> Result<(), CycleError> {
        let cycle_duration = Duration::from_nanos(self.cycle_time_ns as u64);

        while running.load(Ordering::SeqCst) {
            let cycle_start = Instant::now();

            self.step_once(&mut *ui_handler);

            let elapsed = cycle_start.elapsed();
            let duration_ns = elapsed.as_nanos() as i64;
            self.stats.record(duration_ns);

            if duration_ns > self.cycle_time_ns {
                self.stats.overruns += 1;
                #[cfg(feature = "rt")]
                return Err(CycleError::CycleOverrun {
                    actual_ns: duration_ns,
                    budget_ns: self.cycle_time_ns,
                });
            }

            if self.stats.cycle_count % u64::from(self.config.status_interval) == 0 {
                let [x, y, z] = self.positions.snapshot();
                debug!(
                    "pos=[{x},{y},{z}] limits={:?} state={:?}",
                    self.coordinator.limit_flags(),
                    self.supervisor.state(),
                );
            }

            if let Some(remaining) = cycle_duration.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }

        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
