//! Unified error types for the battery monitor.
//!
//! A single `Error` enum that every subsystem converts into. Variants are
//! `Copy` so workers can log and report them without allocation.
//!
//! Not every failure is an error: a debounced manual request is an ordinary
//! [`TriggerOutcome`](crate::trigger::TriggerOutcome), and a busy gate on the
//! periodic path is only logged.

use core::fmt;

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The analog measurement path could not produce a reading.
    Sensor(SensorError),
    /// The measurement gate could not be acquired within its timeout.
    GateTimeout,
    /// Wall clock not synchronised; window rules were skipped.
    ClockUnsynchronized,
    /// Execution reached a point that must be unreachable (e.g. code running
    /// after a hibernation commit, or a policy tick after hibernating).
    ContractViolation(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor unavailable: {e}"),
            Self::GateTimeout => write!(f, "measurement circuit busy"),
            Self::ClockUnsynchronized => write!(f, "wall clock not synchronised"),
            Self::ContractViolation(msg) => write!(f, "contract violation: {msg}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Failures of the battery measurement circuit. Every variant means no
/// reading was produced; the last-known voltage is kept and flagged stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The ADC unit or channel could not be configured (ESP-IDF return code).
    AdcConfig(i32),
    /// A oneshot conversion failed (ESP-IDF return code).
    ReadFailed(i32),
    /// The sampler was asked for zero samples.
    NoSamples,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcConfig(rc) => write!(f, "ADC configuration failed (rc={rc})"),
            Self::ReadFailed(rc) => write!(f, "ADC read failed (rc={rc})"),
            Self::NoSamples => write!(f, "no samples requested"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
