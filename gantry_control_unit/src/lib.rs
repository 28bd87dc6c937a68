//! # Gantry Control Unit Library
//!
//! Motion & input control core for a three/four-axis motorized gantry:
//! X/Y DC motors with limit-switch interlocks, Z and gripper steppers
//! pulsed from a one-shot timer, rotary-encoder input with jitter
//! filtering, and an emergency-stop override — interrupt context and the
//! polling main loop sharing state under a single-writer-per-field rule.
//!
//! ## Architecture
//!
//! 1. **Quadrature decoding** — one transition table for the UI and jog
//!    encoders; jog ticks pass a tolerance filter before committing.
//! 2. **Motor drivers** — DC H-bridge pairs and the stepper group, each
//!    downgrading motion toward a tripped limit to `Stop`.
//! 3. **Motion coordination** — level-triggered target-vs-actual
//!    reconciliation, one instruction per axis per iteration.
//! 4. **Emergency supervision** — interrupt-raised latch, stop-all entry
//!    action, operator confirm + cleared-line recovery gate.
//!
//! The control path propagates no errors: every fault is absorbed into a
//! state transition or becomes the emergency-halt state.

pub mod config;
pub mod coordinator;
pub mod cycle;
pub mod dcmotor;
pub mod emergency;
pub mod encoder;
pub mod position;
pub mod stepper;
