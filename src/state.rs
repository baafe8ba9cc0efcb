//! State shared between workers and external collaborators.
//!
//! One [`SharedState`] is created at boot and handed to every worker as an
//! `Arc`. Everything in it is lock-free so it can be read from any task,
//! including the cloud/provisioning callbacks.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::PowerConfig;
use crate::power::VoltageReading;

// ---------------------------------------------------------------------------
// Provisioning flag
// ---------------------------------------------------------------------------

/// "Provisioning in progress", written by the provisioning collaborator and
/// only read by the power controller.
#[derive(Debug, Default)]
pub struct ProvisioningFlag(AtomicBool);

impl ProvisioningFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Set on provisioning start / restart, cleared on timeout or once the
    /// cloud link is up.
    pub fn set(&self, active: bool) {
        let was = self.0.swap(active, Ordering::AcqRel);
        if was != active {
            log::info!("Provisioning: {}", if active { "started" } else { "ended" });
        }
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Last-known voltage
// ---------------------------------------------------------------------------

/// Last-known battery voltage. Written by whichever worker holds the
/// measurement gate, read by anyone.
///
/// Never reset: a failed measurement only flags the held value as stale.
#[derive(Debug)]
pub struct VoltageStore {
    bits: AtomicU32,
    stale: AtomicBool,
    updates: AtomicU32,
}

impl VoltageStore {
    /// Seed with a default; stays stale until the first real measurement.
    pub fn new(initial_volts: f32) -> Self {
        Self {
            bits: AtomicU32::new(initial_volts.to_bits()),
            stale: AtomicBool::new(true),
            updates: AtomicU32::new(0),
        }
    }

    pub fn publish(&self, reading: VoltageReading) {
        self.bits.store(reading.volts.to_bits(), Ordering::Release);
        self.stale.store(false, Ordering::Release);
        self.updates.fetch_add(1, Ordering::AcqRel);
    }

    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    pub fn latest(&self) -> VoltageReading {
        VoltageReading::new(f32::from_bits(self.bits.load(Ordering::Acquire)))
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Successful measurements since boot.
    pub fn update_count(&self) -> u32 {
        self.updates.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SharedState {
    pub provisioning: ProvisioningFlag,
    pub voltage: VoltageStore,
}

impl SharedState {
    pub fn new(cfg: &PowerConfig) -> Self {
        Self {
            provisioning: ProvisioningFlag::new(),
            voltage: VoltageStore::new(cfg.initial_voltage_v),
        }
    }
}
