//! Inbound control surface of a running node.
//!
//! ```text
//!   cloud "measure now" param ─┐
//!   BOOT button (InputWorker) ─┼─▶ ControlHandle ──▶ ManualTrigger ──▶ RequestChannel
//!   provisioning callbacks ────┘        │
//!                                       └──▶ SharedState::provisioning
//! ```
//!
//! [`ControlHandle`] is cheap to clone and is the only thing the reporting
//! and provisioning layers are given. [`ProvisioningWindow`] drives the
//! provisioning flag on an unprovisioned boot until credentials appear or
//! the window times out.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use crate::state::SharedState;
use crate::trigger::{ManualTrigger, TriggerOutcome};

#[derive(Clone)]
pub struct ControlHandle {
    trigger: Arc<Mutex<ManualTrigger>>,
    shared: Arc<SharedState>,
}

impl ControlHandle {
    pub fn new(trigger: ManualTrigger, shared: Arc<SharedState>) -> Self {
        Self {
            trigger: Arc::new(Mutex::new(trigger)),
            shared,
        }
    }

    fn trigger(&self) -> MutexGuard<'_, ManualTrigger> {
        self.trigger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A write of the "measure now" parameter. Only a false→true edge is a
    /// request.
    pub fn measure_param(&self, level: bool, now_ms: u64) -> Option<TriggerOutcome> {
        self.trigger().on_edge(level, now_ms)
    }

    /// The reporting layer cleared the parameter without a write event.
    pub fn measure_param_cleared(&self) {
        self.trigger().reset_level();
    }

    /// A request with no level attached (button press).
    pub fn request_measurement(&self, now_ms: u64) -> TriggerOutcome {
        self.trigger().request_measurement(now_ms)
    }

    /// Provisioning started or restarted (`true`), or ended by timeout or a
    /// connected cloud link (`false`).
    pub fn set_provisioning(&self, active: bool) {
        self.shared.provisioning.set(active);
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }
}

/// Provisioning suppression for a node that booted without credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisioningWindow {
    /// `None` once closed (or never opened).
    deadline_ms: Option<u64>,
}

impl ProvisioningWindow {
    /// Open the window on an unprovisioned boot; a provisioned boot leaves
    /// the flag alone.
    pub fn open(control: &ControlHandle, provisioned: bool, now_ms: u64, timeout_ms: u64) -> Self {
        if provisioned {
            return Self { deadline_ms: None };
        }
        info!("Provisioning: window open for {} s", timeout_ms / 1000);
        control.set_provisioning(true);
        Self {
            deadline_ms: Some(now_ms.saturating_add(timeout_ms)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.deadline_ms.is_some()
    }

    /// Close on stored credentials or timeout. Returns whether the window is
    /// still open.
    pub fn poll(&mut self, control: &ControlHandle, now_ms: u64, credentials_stored: bool) -> bool {
        let Some(deadline) = self.deadline_ms else {
            return false;
        };
        if credentials_stored {
            info!("Provisioning: credentials stored");
        } else if now_ms >= deadline {
            warn!("Provisioning: timed out, sleep rules re-enabled");
        } else {
            return true;
        }
        self.deadline_ms = None;
        control.set_provisioning(false);
        false
    }
}
