//! Debounced manual "measure now" trigger.
//!
//! The reporting layer exposes a boolean "measure now" parameter. A
//! rising edge on it becomes a request; requests closer than the debounce
//! interval to the last accepted one are dropped, and accepted ones go
//! through a bounded `embassy-sync` channel to the manual worker.
//!
//! ```text
//!   param false→true ──▶ ManualTrigger ──try_send──▶ RequestChannel (depth 2)
//!                           │ < 10 s since last                │
//!                           ▼                                  ▼
//!                       Debounced                       ManualWorker
//! ```

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info, warn};

/// Pending requests the manual worker may fall behind by.
pub const REQUEST_QUEUE_DEPTH: usize = 2;

/// One accepted manual request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasureRequest {
    /// Monotonic time the request was accepted.
    pub requested_at_ms: u64,
}

/// Trigger → manual worker.
pub type RequestChannel = Channel<CriticalSectionRawMutex, MeasureRequest, REQUEST_QUEUE_DEPTH>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Forwarded to the manual worker.
    Accepted,
    /// Inside the cool-down window; nothing happened.
    Debounced,
    /// Passed debounce but the channel was full; nothing queued.
    Dropped,
}

pub struct ManualTrigger {
    channel: Arc<RequestChannel>,
    debounce_ms: u64,
    /// `None` until the first accepted request, so the first one always passes.
    last_accepted_ms: Option<u64>,
    last_level: bool,
}

impl ManualTrigger {
    pub fn new(channel: Arc<RequestChannel>, debounce_ms: u32) -> Self {
        Self {
            channel,
            debounce_ms: u64::from(debounce_ms),
            last_accepted_ms: None,
            last_level: false,
        }
    }

    /// Handle one request at monotonic time `now_ms`.
    pub fn request_measurement(&mut self, now_ms: u64) -> TriggerOutcome {
        let debounced = self
            .last_accepted_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < self.debounce_ms);
        if debounced {
            debug!("Trigger: request at {} ms debounced", now_ms);
            return TriggerOutcome::Debounced;
        }

        match self.channel.try_send(MeasureRequest {
            requested_at_ms: now_ms,
        }) {
            Ok(()) => {
                self.last_accepted_ms = Some(now_ms);
                info!("Trigger: manual measurement requested");
                TriggerOutcome::Accepted
            }
            Err(_) => {
                warn!("Trigger: request queue full, request dropped");
                TriggerOutcome::Dropped
            }
        }
    }

    /// Feed the current level of the "measure now" parameter. Only a
    /// false→true edge counts as a request; returns `None` otherwise.
    pub fn on_edge(&mut self, level: bool, now_ms: u64) -> Option<TriggerOutcome> {
        let rising = level && !self.last_level;
        self.last_level = level;
        rising.then(|| self.request_measurement(now_ms))
    }

    /// The reporting layer writes the parameter back to `false` after every
    /// edge; mirror that so the next `true` is seen as a new edge.
    pub fn reset_level(&mut self) {
        self.last_level = false;
    }
}
