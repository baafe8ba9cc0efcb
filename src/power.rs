//! Voltage readings, power status levels and the status classifier.
//!
//! ```text
//!   volts ──▶ classify(thresholds) ──▶ PowerStatus ──▶ StatusLabel ──▶ reporting
//!
//!   ──────────┬──────────────────┬──────────────────┬──────────────▶ V
//!   Hibernating│ PrepareHibernation│ ReducedConsumption│ Normal
//!          ≤ 3.10              < 3.30              < 3.50
//! ```
//!
//! [`classify`] is the only place thresholds are compared against a
//! voltage for status purposes; the periodic policy and the wake check
//! both go through it.

use serde::Serialize;

use crate::config::Thresholds;

// ---------------------------------------------------------------------------
// Voltage reading
// ---------------------------------------------------------------------------

/// Empty / full cell voltages for the informational percentage.
const CELL_EMPTY_V: f32 = 3.10;
const CELL_FULL_V: f32 = 4.20;

/// One averaged battery measurement, in volts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoltageReading {
    pub volts: f32,
}

impl VoltageReading {
    pub const fn new(volts: f32) -> Self {
        Self { volts }
    }

    /// Value published upstream: rounded to two decimals.
    pub fn rounded(&self) -> f32 {
        (self.volts * 100.0).round() / 100.0
    }

    /// Rough state of charge for display, linear over the Li-ion span.
    pub fn percent(&self) -> u8 {
        let span = CELL_FULL_V - CELL_EMPTY_V;
        let frac = ((self.volts - CELL_EMPTY_V) / span).clamp(0.0, 1.0);
        if frac.is_nan() {
            return 0;
        }
        (frac * 100.0).round() as u8
    }
}

// ---------------------------------------------------------------------------
// Status levels
// ---------------------------------------------------------------------------

/// Battery health, ordered from least to most healthy so that `<` reads as
/// "worse than".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum PowerStatus {
    Hibernating = 0,
    PrepareHibernation = 1,
    ReducedConsumption = 2,
    Normal = 3,
}

impl PowerStatus {
    /// Label reported upstream for this level.
    pub const fn label(self) -> StatusLabel {
        match self {
            Self::Normal => StatusLabel::Ok,
            Self::ReducedConsumption => StatusLabel::ReducedConsumption,
            Self::PrepareHibernation => StatusLabel::PrepareHibernation,
            Self::Hibernating => StatusLabel::EnteringHibernation,
        }
    }
}

/// Textual status published to the reporting collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusLabel {
    Ok,
    ReducedConsumption,
    PrepareHibernation,
    EnteringHibernation,
    /// Wake check only: the node woke in conditions that would normally
    /// send it back to hibernation.
    ShouldReturnToHibernation,
}

impl StatusLabel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::ReducedConsumption => "Reduced consumption",
            Self::PrepareHibernation => "Prepare hibernation",
            Self::EnteringHibernation => "Entering hibernation",
            Self::ShouldReturnToHibernation => "Should return to hibernation",
        }
    }
}

impl core::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Map a voltage onto a [`PowerStatus`]. Pure and total.
///
/// Bands are checked lowest first, so a voltage sitting exactly on a
/// boundary resolves to the more conservative status, except at
/// `reduced_v` itself which is already [`PowerStatus::Normal`].
///
/// NaN cannot be placed on the scale; it maps to
/// [`PowerStatus::PrepareHibernation`], which warns without committing to
/// anything irreversible. Infinities are ordered like any other value.
pub fn classify(volts: f32, t: &Thresholds) -> PowerStatus {
    if volts.is_nan() {
        return PowerStatus::PrepareHibernation;
    }
    if volts <= t.hibernate_immediate_v {
        PowerStatus::Hibernating
    } else if volts < t.prepare_v {
        PowerStatus::PrepareHibernation
    } else if volts < t.reduced_v {
        PowerStatus::ReducedConsumption
    } else {
        PowerStatus::Normal
    }
}
