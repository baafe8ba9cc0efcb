//! Power controller configuration.
//!
//! All tunable thresholds, windows and timings for the battery monitor.
//! Defaults match the deployed switch node; values can be overridden via
//! NVS (see [`NvsAdapter`](crate::adapters::nvs::NvsAdapter)).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::window::{TimeOfDay, TimeWindow};

/// Voltage band boundaries used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// At or below this the node hibernates immediately.
    pub hibernate_immediate_v: f32,
    /// Below this the node warns that hibernation is near.
    pub prepare_v: f32,
    /// Below this the node runs in reduced consumption.
    pub reduced_v: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            hibernate_immediate_v: 3.10,
            prepare_v: 3.30,
            reduced_v: 3.50,
        }
    }
}

/// Measurement circuit geometry and acquisition profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Settle time after closing the relay, before the first conversion.
    pub relay_settle_ms: u32,
    /// Raw conversions averaged into one reading.
    pub samples: u8,
    /// Gap between conversions.
    pub sample_interval_ms: u32,
    /// ADC full-scale input voltage at 12 dB attenuation.
    pub adc_ref_v: f32,
    /// Maximum raw count (12-bit).
    pub adc_full_scale: u16,
    /// Divider upper resistor (kΩ).
    pub divider_r1_kohm: f32,
    /// Divider lower resistor (kΩ).
    pub divider_r2_kohm: f32,
    /// Empirical multiplier applied after the divider ratio.
    pub calibration: f32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            relay_settle_ms: 20,
            samples: 16,
            sample_interval_ms: 2,
            adc_ref_v: 3.3,
            adc_full_scale: 4095,
            divider_r1_kohm: 44.5,
            divider_r2_kohm: 44.5,
            calibration: 1.15,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerConfig {
    // --- Classification ---
    pub thresholds: Thresholds,
    /// Evening light sleep is only taken above this voltage.
    pub light_sleep_min_v: f32,
    /// Below this at wake the node reports it should go back to hibernation.
    pub wake_recovery_v: f32,
    /// Last-known voltage before the first successful measurement.
    pub initial_voltage_v: f32,

    // --- Windows ---
    pub forced_hibernation: TimeWindow,
    pub light_sleep: TimeWindow,

    // --- Timing ---
    /// Delay between publishing "entering hibernation" and committing.
    pub hibernate_grace_ms: u32,
    pub voltage_period_secs: u32,
    pub policy_period_secs: u32,
    /// Battery rest time after the periodic worker takes the gate.
    pub periodic_settle_ms: u32,
    /// Battery rest time after the manual worker takes the gate.
    pub manual_settle_ms: u32,
    pub periodic_gate_timeout_ms: u32,
    pub manual_gate_timeout_ms: u32,
    /// Minimum spacing between accepted manual requests.
    pub manual_debounce_ms: u32,
    /// How long boot waits for SNTP before the wake check.
    pub clock_sync_wait_secs: u32,
    /// Button / provisioning poll period of the input loop.
    pub input_poll_ms: u32,
    /// An unprovisioned boot suppresses sleep for at most this long.
    pub provisioning_timeout_secs: u32,
    /// Relay/voltage diagnostic period; 0 disables the monitor worker.
    pub circuit_monitor_secs: u32,

    // --- Warning beep ---
    pub warning_tone_hz: u32,
    pub warning_duration_ms: u32,

    pub sampler: SamplerConfig,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            light_sleep_min_v: 3.50,
            wake_recovery_v: 3.70,
            initial_voltage_v: 3.70,

            forced_hibernation: TimeWindow::new(
                TimeOfDay { hour: 3, minute: 0 },
                TimeOfDay { hour: 9, minute: 0 },
            ),
            light_sleep: TimeWindow::new(
                TimeOfDay { hour: 18, minute: 30 },
                TimeOfDay { hour: 20, minute: 0 },
            ),

            hibernate_grace_ms: 2_000,
            voltage_period_secs: 20 * 60,
            policy_period_secs: 30,
            periodic_settle_ms: 20_000,
            manual_settle_ms: 5_000,
            periodic_gate_timeout_ms: 100,
            manual_gate_timeout_ms: 1_000,
            manual_debounce_ms: 10_000,
            clock_sync_wait_secs: 30,
            input_poll_ms: 20,
            provisioning_timeout_secs: 30 * 60,
            circuit_monitor_secs: 0,

            warning_tone_hz: 3_000,
            warning_duration_ms: 800,

            sampler: SamplerConfig::default(),
        }
    }
}

fn finite_positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

impl PowerConfig {
    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        if !(finite_positive(t.hibernate_immediate_v)
            && finite_positive(t.prepare_v)
            && finite_positive(t.reduced_v))
        {
            return Err(ConfigError::ValidationFailed("thresholds must be positive"));
        }
        if !(t.hibernate_immediate_v < t.prepare_v && t.prepare_v < t.reduced_v) {
            return Err(ConfigError::ValidationFailed(
                "thresholds must ascend: hibernate < prepare < reduced",
            ));
        }
        if !(self.light_sleep_min_v.is_finite() && self.light_sleep_min_v >= t.reduced_v) {
            return Err(ConfigError::ValidationFailed(
                "light_sleep_min_v must be >= reduced_v",
            ));
        }
        if !(self.wake_recovery_v.is_finite() && self.wake_recovery_v >= t.reduced_v) {
            return Err(ConfigError::ValidationFailed(
                "wake_recovery_v must be >= reduced_v",
            ));
        }
        if !finite_positive(self.initial_voltage_v) {
            return Err(ConfigError::ValidationFailed("initial_voltage_v must be positive"));
        }
        if !self.forced_hibernation.is_valid() || !self.light_sleep.is_valid() {
            return Err(ConfigError::ValidationFailed("window times out of range"));
        }
        if self.voltage_period_secs == 0 || self.policy_period_secs == 0 {
            return Err(ConfigError::ValidationFailed("worker periods must be non-zero"));
        }
        if self.input_poll_ms == 0 || self.input_poll_ms > 1_000 {
            return Err(ConfigError::ValidationFailed("input_poll_ms must be 1-1000"));
        }
        if self.periodic_gate_timeout_ms == 0 || self.manual_gate_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("gate timeouts must be non-zero"));
        }
        let s = &self.sampler;
        if !(1..=64).contains(&s.samples) {
            return Err(ConfigError::ValidationFailed("sampler.samples must be 1-64"));
        }
        if s.adc_full_scale == 0 || !finite_positive(s.adc_ref_v) {
            return Err(ConfigError::ValidationFailed("ADC scale must be positive"));
        }
        if !(finite_positive(s.divider_r1_kohm)
            && finite_positive(s.divider_r2_kohm)
            && finite_positive(s.calibration))
        {
            return Err(ConfigError::ValidationFailed(
                "divider resistors and calibration must be positive",
            ));
        }
        Ok(())
    }
}
