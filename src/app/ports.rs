//! Port traits: the hexagonal boundary between the power controller and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ workers / PowerController (domain)
//! ```
//!
//! Hardware, clock, platform sleep primitives, event sinks and persistent
//! config are all reached through these traits, so the domain core builds
//! and tests on the host.

use crate::config::PowerConfig;
use crate::error::SensorError;
use crate::window::TimeOfDay;

// ───────────────────────────────────────────────────────────────
// Measurement circuit port (driven adapter: hardware ↔ sampler)
// ───────────────────────────────────────────────────────────────

/// The relay-gated battery divider and its ADC channel.
///
/// Only the holder of the [`MeasurementGate`](crate::sensors::gate::MeasurementGate)
/// may call these; the gate owns the implementation.
pub trait MeasurementCircuit {
    /// Connect the divider to the ADC input.
    fn enable(&mut self);

    /// Disconnect the divider. Must be safe to call when already disabled.
    fn disable(&mut self);

    /// Prepare the ADC channel (width, attenuation).
    fn configure(&mut self) -> Result<(), SensorError>;

    /// One raw conversion.
    fn read_raw(&mut self) -> Result<u16, SensorError>;

    /// Whether the divider is currently connected (diagnostics only).
    fn is_enabled(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: SNTP / RTC → domain)
// ───────────────────────────────────────────────────────────────

/// Wall-clock and monotonic time.
pub trait LocalClock {
    /// Local time of day, or `None` while the wall clock is unsynchronised.
    fn local_time(&self) -> Option<TimeOfDay>;

    /// Milliseconds since boot (monotonic).
    fn uptime_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Platform power primitives (driven adapter: domain → SoC)
// ───────────────────────────────────────────────────────────────

/// Low-power primitives and the audible warning.
pub trait PowerPlatform {
    /// Reversible light sleep. Suspends every worker; returns on resume.
    fn enter_idle(&mut self);

    /// Irreversible hibernation. Only a hardware reset leaves it.
    fn commit_hibernation(&mut self) -> !;

    /// Audible low-battery warning.
    fn sound_warning(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / reporting)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`PowerEvent`](super::events::PowerEvent)s
/// through this port. Adapters decide where they go (serial log, cloud
/// parameters, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::PowerEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`PowerConfig`].
///
/// Implementations MUST call [`PowerConfig::validate`] before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// never clamped: a bad threshold could hibernate the node for good.
pub trait ConfigPort {
    /// Load configuration. Returns [`PowerConfig::default()`] if nothing is
    /// stored.
    fn load(&self) -> Result<PowerConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &PowerConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Credential store port (driven adapter: NVS → provisioning window)
// ───────────────────────────────────────────────────────────────

/// Whether network credentials have been stored, i.e. provisioning has
/// produced something the node can connect with.
pub trait CredentialStore {
    fn wifi_provisioned(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
