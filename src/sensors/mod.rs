//! Battery sensing: the sampler, the exclusive gate, and the gated
//! measurement procedure every worker shares.
//!
//! ```text
//!   worker ──▶ BatteryMonitor::measure
//!                 │ gate (bounded wait)  ── busy ──▶ MeasurementBusy
//!                 │ sampler (rest + settle + N samples)
//!                 │        ── fault ──▶ SensorUnavailable, last-known stale
//!                 ▼
//!            VoltageStore::publish ──▶ VoltageMeasured
//! ```

pub mod battery;
pub mod gate;

use std::sync::Arc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{info, warn};
use serde::Serialize;

use crate::app::events::PowerEvent;
use crate::app::ports::{EventSink, MeasurementCircuit};
use crate::error::SensorError;
use crate::power::VoltageReading;
use crate::state::SharedState;
use battery::BatterySampler;
use gate::MeasurementGate;

/// Who asked for a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MeasurementSource {
    Periodic,
    Manual,
    Wake,
}

impl MeasurementSource {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::Manual => "manual",
            Self::Wake => "wake",
        }
    }
}

/// Result of one gated measurement attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasureOutcome {
    Measured(VoltageReading),
    /// Gate held by another worker; nothing was touched.
    Busy,
    /// The circuit could not be sampled; last-known value kept, now stale.
    Unavailable(SensorError),
}

/// Gate + sampler + shared store. Cheap to clone; every worker gets one.
pub struct BatteryMonitor<C> {
    gate: Arc<MeasurementGate<C>>,
    sampler: BatterySampler,
    shared: Arc<SharedState>,
}

impl<C> Clone for BatteryMonitor<C> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            sampler: self.sampler,
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: MeasurementCircuit> BatteryMonitor<C> {
    pub fn new(gate: Arc<MeasurementGate<C>>, sampler: BatterySampler, shared: Arc<SharedState>) -> Self {
        Self {
            gate,
            sampler,
            shared,
        }
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub fn gate(&self) -> &MeasurementGate<C> {
        &self.gate
    }

    /// Acquire the gate, sample, publish, release.
    ///
    /// `rest_ms` keeps the divider connected before the relay settle. The
    /// reading is published while the gate is still held, so the voltage
    /// store only ever has one writer at a time.
    pub fn measure<D, S>(
        &self,
        source: MeasurementSource,
        gate_timeout: Duration,
        rest_ms: u32,
        delay: &mut D,
        sink: &mut S,
    ) -> MeasureOutcome
    where
        D: DelayNs,
        S: EventSink + ?Sized,
    {
        let Ok(mut circuit) = self.gate.with_exclusive_access(gate_timeout) else {
            match source {
                MeasurementSource::Manual => {
                    warn!("Monitor: manual measurement skipped - circuit busy");
                }
                _ => info!("Monitor: {} measurement skipped - circuit busy", source.name()),
            }
            sink.emit(&PowerEvent::MeasurementBusy(source));
            return MeasureOutcome::Busy;
        };

        match self.sampler.sample_voltage_after(&mut *circuit, delay, rest_ms) {
            Ok(reading) => {
                self.shared.voltage.publish(reading);
                drop(circuit);
                info!("Monitor: {} reading {:.2} V", source.name(), reading.rounded());
                sink.emit(&PowerEvent::VoltageMeasured { reading, source });
                MeasureOutcome::Measured(reading)
            }
            Err(error) => {
                self.shared.voltage.mark_stale();
                drop(circuit);
                let last_known = self.shared.voltage.latest();
                warn!(
                    "Monitor: {} measurement failed ({}), keeping {:.2} V (stale)",
                    source.name(),
                    error,
                    last_known.volts
                );
                sink.emit(&PowerEvent::SensorUnavailable {
                    source,
                    error,
                    last_known,
                });
                MeasureOutcome::Unavailable(error)
            }
        }
    }

    /// Diagnostic: log the relay line and last-known voltage.
    pub fn report_circuit_level<S: EventSink + ?Sized>(&self, sink: &mut S) {
        let relay_enabled = match self.gate.with_exclusive_access(Duration::ZERO) {
            Ok(circuit) => circuit.is_enabled(),
            // Someone is sampling right now, so the relay is closed.
            Err(_) => true,
        };
        sink.emit(&PowerEvent::CircuitLevel {
            relay_enabled,
            last_known: self.shared.voltage.latest(),
        });
    }
}
