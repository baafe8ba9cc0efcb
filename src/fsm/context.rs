//! Inputs sampled once per policy tick.
//!
//! The policy engine never reads shared state itself; the controller
//! gathers the last-known voltage, the local time and the provisioning
//! flag into a [`PolicyInputs`] and hands it over.

use crate::window::TimeOfDay;

/// Snapshot the sleep policy evaluates against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyInputs {
    /// Last-known battery voltage (may be several ticks stale).
    pub volts: f32,
    /// Local time, `None` while the wall clock is unsynchronised.
    pub local_time: Option<TimeOfDay>,
    /// Network provisioning in progress; suppresses every sleep decision.
    pub provisioning: bool,
}

impl PolicyInputs {
    /// Local time if present and in range. Garbage from an unsynchronised
    /// RTC is treated the same as no time at all.
    pub fn synced_time(&self) -> Option<TimeOfDay> {
        self.local_time.filter(TimeOfDay::is_valid)
    }
}
