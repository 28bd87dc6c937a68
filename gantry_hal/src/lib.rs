//! Gantry hardware backends.
//!
//! This crate contains the backend implementations of the capability traits
//! from `gantry_common`:
//!
//! - [`sim`] - Software simulation backend for development and testing
//!
//! # Adding New Backends
//!
//! 1. Create a new submodule
//! 2. Implement `Signal`, `StepTimer`, and `CharacterDisplay` from
//!    `gantry_common` for the target hardware
//! 3. Wire the bindings where the control unit is assembled

pub mod sim;
