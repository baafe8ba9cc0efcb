//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every [`PowerEvent`] as one
//! structured line to the ESP-IDF logger (UART / USB-CDC in production).
//! Voltage lines carry the [`PowerReport`] JSON the reporting layer would
//! push to the cloud parameters.

use log::{error, info, warn};

use crate::app::events::{PowerEvent, PowerReport};
use crate::app::ports::EventSink;
use crate::power::StatusLabel;

/// Adapter that logs every [`PowerEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    /// Last published label, echoed in voltage reports.
    status: Option<StatusLabel>,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn report(&self, reading: crate::power::VoltageReading, stale: bool) -> String {
        PowerReport::new(reading, stale, self.status)
            .to_json()
            .unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &PowerEvent) {
        match event {
            PowerEvent::VoltageMeasured { reading, source } => {
                info!("VOLT | {} | {}", source.name(), self.report(*reading, false));
            }
            PowerEvent::SensorUnavailable {
                source,
                error: err,
                last_known,
            } => {
                warn!(
                    "VOLT | {} | unavailable: {} | {}",
                    source.name(),
                    err,
                    self.report(*last_known, true)
                );
            }
            PowerEvent::MeasurementBusy(source) => {
                info!("GATE | {} | busy, skipped", source.name());
            }
            PowerEvent::StatusChanged(label) => {
                self.status = Some(*label);
                info!("STATUS | {}", label);
            }
            PowerEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from.name(), to.name());
            }
            PowerEvent::WarningSounded => {
                warn!("WARN | low battery tone");
            }
            PowerEvent::EnteringIdle(reason) => {
                info!("IDLE | enter ({:?})", reason);
            }
            PowerEvent::Resumed => {
                info!("IDLE | resumed");
            }
            PowerEvent::HibernationCommitted(reason) => {
                error!("HIBERNATE | committing ({:?})", reason);
            }
            PowerEvent::WakeChecked {
                status,
                should_hibernate,
            } => {
                info!(
                    "WAKE | status={:?} | should_hibernate={}",
                    status, should_hibernate
                );
            }
            PowerEvent::CircuitLevel {
                relay_enabled,
                last_known,
            } => {
                info!(
                    "CIRCUIT | relay={} | last={:.2} V",
                    if *relay_enabled { "closed" } else { "open" },
                    last_known.rounded()
                );
            }
        }
    }
}
