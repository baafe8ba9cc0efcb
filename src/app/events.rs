//! Outbound power-controller events.
//!
//! Workers and the [`PowerController`](super::service::PowerController)
//! emit these through the [`EventSink`](super::ports::EventSink) port.
//! Adapters on the other side decide what to do with them: log to serial,
//! write the cloud voltage/status parameters, etc.

use serde::Serialize;

use crate::error::SensorError;
use crate::fsm::{HibernateReason, IdleReason, PowerState};
use crate::power::{PowerStatus, StatusLabel, VoltageReading};
use crate::sensors::MeasurementSource;

/// Structured events emitted by the power controller.
#[derive(Debug, Clone, PartialEq)]
pub enum PowerEvent {
    /// A fresh reading replaced the last-known voltage.
    VoltageMeasured {
        reading: VoltageReading,
        source: MeasurementSource,
    },

    /// The circuit could not be sampled; `last_known` is now stale.
    SensorUnavailable {
        source: MeasurementSource,
        error: SensorError,
        last_known: VoltageReading,
    },

    /// The measurement gate was held by another worker.
    MeasurementBusy(MeasurementSource),

    /// Published status label changed (edge-triggered).
    StatusChanged(StatusLabel),

    /// The sleep policy moved between states.
    StateChanged { from: PowerState, to: PowerState },

    /// Low-battery warning tone played.
    WarningSounded,

    /// Entering reversible light sleep.
    EnteringIdle(IdleReason),

    /// Back from light sleep.
    Resumed,

    /// Grace delay elapsed; hibernation is being committed.
    HibernationCommitted(HibernateReason),

    /// Result of the one-shot check after a reset.
    WakeChecked {
        status: PowerStatus,
        should_hibernate: bool,
    },

    /// Diagnostic snapshot of the relay line.
    CircuitLevel {
        relay_enabled: bool,
        last_known: VoltageReading,
    },
}

/// Snapshot handed to the reporting layer for the cloud parameters.
#[derive(Debug, Clone, Serialize)]
pub struct PowerReport {
    /// Rounded to two decimals.
    pub voltage: f32,
    pub percent: u8,
    pub stale: bool,
    pub status: Option<&'static str>,
}

impl PowerReport {
    pub fn new(reading: VoltageReading, stale: bool, status: Option<StatusLabel>) -> Self {
        Self {
            voltage: reading.rounded(),
            percent: reading.percent(),
            stale,
            status: status.map(StatusLabel::as_str),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
