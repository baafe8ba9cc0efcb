//! Exclusive access to the measurement circuit.
//!
//! The gate owns the circuit. A worker that wants to sample must acquire a
//! [`GateGuard`] with a bounded wait; the guard derefs to the circuit and
//! releases the gate when dropped.
//!
//! ```text
//!   voltage worker ──┐
//!                    ├──▶ MeasurementGate ──▶ GateGuard ──▶ circuit
//!   manual worker  ──┘      (busy flag + condvar, bounded wait)
//! ```
//!
//! Acquisition order is not fair. A caller that times out gets
//! [`Error::GateTimeout`] and decides locally what to do with it.

use core::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};

pub struct MeasurementGate<C> {
    busy: Mutex<bool>,
    released: Condvar,
    circuit: Mutex<C>,
}

impl<C> MeasurementGate<C> {
    pub fn new(circuit: C) -> Self {
        Self {
            busy: Mutex::new(false),
            released: Condvar::new(),
            circuit: Mutex::new(circuit),
        }
    }

    /// Wait up to `timeout` for the circuit.
    pub fn with_exclusive_access(&self, timeout: Duration) -> Result<GateGuard<'_, C>> {
        let busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut busy, _) = self
            .released
            .wait_timeout_while(busy, timeout, |held| *held)
            .unwrap_or_else(PoisonError::into_inner);
        if *busy {
            debug!("Gate: still held after {:?}", timeout);
            return Err(Error::GateTimeout);
        }
        *busy = true;
        drop(busy);

        // The busy flag already grants exclusivity; this lock never contends
        // for longer than a releasing guard takes to finish dropping.
        let circuit = self.circuit.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(GateGuard {
            gate: self,
            circuit,
        })
    }

    /// Whether some worker currently holds the gate.
    pub fn is_busy(&self) -> bool {
        *self.busy.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        *busy = false;
        drop(busy);
        self.released.notify_one();
    }
}

/// Proof of exclusive ownership of the circuit.
pub struct GateGuard<'a, C> {
    gate: &'a MeasurementGate<C>,
    circuit: MutexGuard<'a, C>,
}

impl<C> Deref for GateGuard<'_, C> {
    type Target = C;
    fn deref(&self) -> &C {
        &self.circuit
    }
}

impl<C> DerefMut for GateGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.circuit
    }
}

impl<C> Drop for GateGuard<'_, C> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
