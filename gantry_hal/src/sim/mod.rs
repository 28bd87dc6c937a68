//! Software simulation backend.
//!
//! Stands in for the gantry electronics during development and in the test
//! suite: pins are atomics, the step timer is an armed flag the harness
//! polls, the display is a 20x4 character buffer, and [`gantry::SimulatedGantry`]
//! moves the DC axes according to their direction pins, trips limit
//! switches at the travel bounds, and emits quadrature phase sequences on
//! the encoder pins.

pub mod display;
pub mod gantry;
pub mod pin;
pub mod timer;

pub use display::SimDisplay;
pub use gantry::{SimDcAxis, SimulatedGantry};
pub use pin::SimPin;
pub use timer::SimTimer;
