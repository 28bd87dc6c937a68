//! Simulated gantry mechanics.
//!
//! Each call to [`SimulatedGantry::step`] advances the physics by one unit:
//! a DC axis whose direction pins command motion moves one position tick
//! (bounded by its travel), the limit switch pins are refreshed, and the
//! movement is played back on the axis encoder pins as a quadrature phase
//! sequence (assert one channel, assert both, release) spread over the
//! following steps. Encoder channels and limit switches are active-low
//! against pull-ups, matching the machine wiring.

use std::collections::VecDeque;
use std::sync::Arc;

use gantry_common::signal::Level;
use gantry_common::types::Direction;
use tracing::debug;

use super::pin::SimPin;
use super::timer::SimTimer;

/// One DC-driven axis: H-bridge direction pins, two end-stops, and a
/// quadrature encoder tracking the motion.
pub struct SimDcAxis {
    pub dir_forward: Arc<SimPin>,
    pub dir_backward: Arc<SimPin>,
    pub limit_start: Arc<SimPin>,
    pub limit_end: Arc<SimPin>,
    pub enc_a: Arc<SimPin>,
    pub enc_b: Arc<SimPin>,
    position: i32,
    min: i32,
    max: i32,
    phases: VecDeque<(Level, Level)>,
}

impl SimDcAxis {
    /// Build an axis from its six pin names and travel range.
    pub fn new(names: [&'static str; 6], min: i32, max: i32, position: i32) -> Self {
        let axis = Self {
            dir_forward: SimPin::new(names[0]),
            dir_backward: SimPin::new(names[1]),
            limit_start: SimPin::new(names[2]),
            limit_end: SimPin::new(names[3]),
            enc_a: SimPin::new(names[4]),
            enc_b: SimPin::new(names[5]),
            position: position.clamp(min, max),
            min,
            max,
            phases: VecDeque::new(),
        };
        axis.enc_a.set_level(Level::High);
        axis.enc_b.set_level(Level::High);
        axis.refresh_limits();
        axis
    }

    /// Current mechanical position in encoder ticks.
    pub fn position(&self) -> i32 {
        self.position
    }

    /// Teleport the axis (test setup), refreshing the end-stops.
    pub fn set_position(&mut self, position: i32) {
        self.position = position.clamp(self.min, self.max);
        self.refresh_limits();
    }

    /// Advance the axis by one simulation step.
    pub fn step(&mut self) {
        // Finish playing back a pending quadrature sequence before the
        // next mechanical tick; the encoder is sampled faster than the
        // axis moves.
        if let Some((a, b)) = self.phases.pop_front() {
            self.enc_a.set_level(a);
            self.enc_b.set_level(b);
            return;
        }

        let forward = self.dir_forward.level().is_high() && !self.dir_backward.level().is_high();
        let backward = self.dir_backward.level().is_high() && !self.dir_forward.level().is_high();

        if forward && self.position < self.max {
            self.position += 1;
            self.queue_tick(Direction::Right);
        } else if backward && self.position > self.min {
            self.position -= 1;
            self.queue_tick(Direction::Left);
        }
        self.refresh_limits();
    }

    fn queue_tick(&mut self, direction: Direction) {
        // Active-low channels: a Right tick asserts B first, a Left tick
        // asserts A first, then both, then releases.
        let sequence = match direction {
            Direction::Right => [(Level::High, Level::Low), (Level::Low, Level::Low)],
            Direction::Left => [(Level::Low, Level::High), (Level::Low, Level::Low)],
        };
        self.phases.extend(sequence);
        self.phases.push_back((Level::High, Level::High));
    }

    fn refresh_limits(&self) {
        let start = if self.position <= self.min { Level::Low } else { Level::High };
        let end = if self.position >= self.max { Level::Low } else { Level::High };
        self.limit_start.set_level(start);
        self.limit_end.set_level(end);
    }
}

/// The full simulated machine: two DC axes, the stepper pin group, the
/// shared step timer, the emergency line, and the UI encoder.
pub struct SimulatedGantry {
    pub x: SimDcAxis,
    pub y: SimDcAxis,
    pub z_dir: Arc<SimPin>,
    pub z_step: Arc<SimPin>,
    pub grip_dir: Arc<SimPin>,
    pub grip_step: Arc<SimPin>,
    pub z_limit_start: Arc<SimPin>,
    pub z_limit_end: Arc<SimPin>,
    pub timer: Arc<SimTimer>,
    pub estop_line: Arc<SimPin>,
    pub ui_a: Arc<SimPin>,
    pub ui_b: Arc<SimPin>,
    pub ui_button: Arc<SimPin>,
}

impl SimulatedGantry {
    /// Build the machine with both DC axes mid-travel on a 0..=100 range.
    pub fn new() -> Self {
        let gantry = Self {
            x: SimDcAxis::new(
                ["x_dir_fwd", "x_dir_bwd", "x_limit_start", "x_limit_end", "x_enc_a", "x_enc_b"],
                0,
                100,
                50,
            ),
            y: SimDcAxis::new(
                ["y_dir_fwd", "y_dir_bwd", "y_limit_start", "y_limit_end", "y_enc_a", "y_enc_b"],
                0,
                100,
                50,
            ),
            z_dir: SimPin::new("z_dir"),
            z_step: SimPin::new("z_step"),
            grip_dir: SimPin::new("grip_dir"),
            grip_step: SimPin::new("grip_step"),
            z_limit_start: SimPin::new("z_limit_start"),
            z_limit_end: SimPin::new("z_limit_end"),
            timer: SimTimer::new(),
            estop_line: SimPin::new("estop_line"),
            ui_a: SimPin::new("ui_enc_a"),
            ui_b: SimPin::new("ui_enc_b"),
            ui_button: SimPin::new("ui_button"),
        };
        // Inputs idle released (pull-up high) until something drives them.
        for pin in [
            &gantry.z_limit_start,
            &gantry.z_limit_end,
            &gantry.estop_line,
            &gantry.ui_a,
            &gantry.ui_b,
            &gantry.ui_button,
        ] {
            pin.set_level(Level::High);
        }
        gantry
    }

    /// Advance all simulated mechanics by one step.
    pub fn step(&mut self) {
        self.x.step();
        self.y.step();
    }

    /// Close the emergency switch (active low).
    pub fn assert_estop(&self) {
        debug!("simulated emergency line asserted");
        self.estop_line.set_level(Level::Low);
    }

    /// Open the emergency switch again.
    pub fn release_estop(&self) {
        self.estop_line.set_level(Level::High);
    }

    /// Press or release the UI encoder button (active low).
    pub fn set_ui_button(&self, pressed: bool) {
        let level = if pressed { Level::Low } else { Level::High };
        self.ui_button.set_level(level);
    }
}

impl Default for SimulatedGantry {
    fn default() -> Self {
        Self::new()
    }
}
