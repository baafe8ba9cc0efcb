//! Battery voltage sampler.
//!
//! Drives one enable → settle → N conversions → disable sequence on the
//! relay-gated divider and converts the mean raw count to volts:
//!
//! ```text
//!   v_adc  = raw × adc_ref / full_scale
//!   v_batt = v_adc × (R1 + R2) / R2 × calibration
//! ```
//!
//! The relay is released by a guard, so the circuit is disconnected on
//! every exit path, including ADC configuration and read failures.

use core::ops::{Deref, DerefMut};

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use log::debug;

use crate::app::ports::MeasurementCircuit;
use crate::config::SamplerConfig;
use crate::error::SensorError;
use crate::power::VoltageReading;

/// Upper bound on conversions per reading (matches config validation).
pub const MAX_SAMPLES: usize = 64;

/// Keeps the divider connected for its lifetime.
struct EnabledCircuit<'a, C: MeasurementCircuit + ?Sized> {
    circuit: &'a mut C,
}

impl<'a, C: MeasurementCircuit + ?Sized> EnabledCircuit<'a, C> {
    fn new(circuit: &'a mut C) -> Self {
        circuit.enable();
        Self { circuit }
    }
}

impl<C: MeasurementCircuit + ?Sized> Deref for EnabledCircuit<'_, C> {
    type Target = C;
    fn deref(&self) -> &C {
        self.circuit
    }
}

impl<C: MeasurementCircuit + ?Sized> DerefMut for EnabledCircuit<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.circuit
    }
}

impl<C: MeasurementCircuit + ?Sized> Drop for EnabledCircuit<'_, C> {
    fn drop(&mut self) {
        self.circuit.disable();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatterySampler {
    cfg: SamplerConfig,
}

impl BatterySampler {
    pub fn new(cfg: SamplerConfig) -> Self {
        Self { cfg }
    }

    /// Convert one raw count to battery volts.
    pub fn raw_to_volts(&self, raw: u16) -> f32 {
        let c = &self.cfg;
        let v_adc = f32::from(raw) * c.adc_ref_v / f32::from(c.adc_full_scale);
        v_adc * (c.divider_r1_kohm + c.divider_r2_kohm) / c.divider_r2_kohm * c.calibration
    }

    /// Take one averaged reading. The caller must hold the measurement gate.
    pub fn sample_voltage<C, D>(
        &self,
        circuit: &mut C,
        delay: &mut D,
    ) -> Result<VoltageReading, SensorError>
    where
        C: MeasurementCircuit + ?Sized,
        D: DelayNs,
    {
        self.sample_voltage_after(circuit, delay, 0)
    }

    /// Like [`sample_voltage`](Self::sample_voltage), but keeps the divider
    /// connected for an extra `rest_ms` before the relay settle so the
    /// battery recovers from the last load spike.
    pub fn sample_voltage_after<C, D>(
        &self,
        circuit: &mut C,
        delay: &mut D,
        rest_ms: u32,
    ) -> Result<VoltageReading, SensorError>
    where
        C: MeasurementCircuit + ?Sized,
        D: DelayNs,
    {
        let n = usize::from(self.cfg.samples).min(MAX_SAMPLES);
        if n == 0 {
            return Err(SensorError::NoSamples);
        }

        let mut raws: Vec<u16, MAX_SAMPLES> = Vec::new();
        {
            let mut circuit = EnabledCircuit::new(circuit);
            if rest_ms > 0 {
                delay.delay_ms(rest_ms);
            }
            delay.delay_ms(self.cfg.relay_settle_ms);
            circuit.configure()?;

            for i in 0..n {
                let raw = circuit.read_raw()?;
                if raws.push(raw).is_err() {
                    break;
                }
                if i + 1 < n {
                    delay.delay_ms(self.cfg.sample_interval_ms);
                }
            }
        }

        let sum: f32 = raws.iter().map(|&r| self.raw_to_volts(r)).sum();
        let volts = sum / raws.len() as f32;
        debug!(
            "Sampler: n={} raw=[{}..{}] -> {:.3} V",
            raws.len(),
            raws.iter().min().copied().unwrap_or(0),
            raws.iter().max().copied().unwrap_or(0),
            volts
        );
        Ok(VoltageReading::new(volts))
    }
}
