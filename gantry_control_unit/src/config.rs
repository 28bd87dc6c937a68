//! TOML configuration loader with validation.
//!
//! One file configures the control loop pacing, the jog tolerance, the
//! button settle time, and the stepper timer period. Values are validated
//! on load; defaults are sanity-checked at compile time.

use std::path::Path;

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;

/// Default control loop period [µs].
pub const DEFAULT_CYCLE_TIME_US: u32 = 1_000;
/// Default jog jitter tolerance [ticks].
pub const DEFAULT_JOG_TOLERANCE: u8 = 2;
/// Default button settle time [polls].
pub const DEFAULT_BUTTON_SETTLE_TICKS: u32 = 5;
/// Default stepper timer period [µs].
pub const DEFAULT_STEP_PERIOD_US: u32 = 125;
/// Default UI jog increment [ticks per event].
pub const DEFAULT_JOG_INCREMENT: i32 = 1;
/// Default status log throttle [cycles].
pub const DEFAULT_STATUS_INTERVAL: u32 = 1_000;

// Defaults must themselves pass validation.
const_assert!(DEFAULT_JOG_TOLERANCE >= 1);
const_assert!(DEFAULT_CYCLE_TIME_US >= 100 && DEFAULT_CYCLE_TIME_US <= 1_000_000);
const_assert!(DEFAULT_STEP_PERIOD_US >= 1);
const_assert!(DEFAULT_STATUS_INTERVAL >= 1);

/// Configuration loading/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("config I/O error: {0}")]
    Io(String),
    /// TOML parse error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Parameter validation error.
    #[error("config validation: {0}")]
    Validation(String),
}

/// Motion core configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotionConfig {
    /// Control loop period [µs].
    pub cycle_time_us: u32,
    /// Consecutive same-direction jog ticks required before a position
    /// commit (1 = no filtering).
    pub jog_tolerance: u8,
    /// Polls the UI button must stay asserted before a press latches.
    pub button_settle_ticks: u32,
    /// Stepper timer period [µs] (one constant for the whole scheduler).
    pub step_period_us: u32,
    /// Target ticks added per UI jog event.
    pub jog_increment: i32,
    /// Status line throttle [cycles].
    pub status_interval: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: DEFAULT_CYCLE_TIME_US,
            jog_tolerance: DEFAULT_JOG_TOLERANCE,
            button_settle_ticks: DEFAULT_BUTTON_SETTLE_TICKS,
            step_period_us: DEFAULT_STEP_PERIOD_US,
            jog_increment: DEFAULT_JOG_INCREMENT,
            status_interval: DEFAULT_STATUS_INTERVAL,
        }
    }
}

impl MotionConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.jog_tolerance == 0 {
            return Err("jog_tolerance must be >= 1".into());
        }
        if !(100..=1_000_000).contains(&self.cycle_time_us) {
            return Err(format!(
                "cycle_time_us {} out of range [100, 1000000]",
                self.cycle_time_us
            ));
        }
        if self.step_period_us == 0 {
            return Err("step_period_us must be >= 1".into());
        }
        if self.jog_increment == 0 {
            return Err("jog_increment must be non-zero".into());
        }
        if self.status_interval == 0 {
            return Err("status_interval must be >= 1".into());
        }
        Ok(())
    }
}

/// Load and validate the motion configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<MotionConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("failed to read {}: {e}", path.display())))?;
    load_config_from_str(&raw)
}

/// Load config from a TOML string (for testing).
pub fn load_config_from_str(raw: &str) -> Result<MotionConfig, ConfigError> {
    let config: MotionConfig =
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate().map_err(ConfigError::Validation)?;
    Ok(config)
}
