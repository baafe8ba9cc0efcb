//! Power controller: the hexagonal core.
//!
//! [`PowerController`] owns the sleep policy and the status publisher and
//! carries out each decision through the [`PowerPlatform`] port. It is the
//! only writer of the published status label.
//!
//! ```text
//!  VoltageStore ─┐
//!  LocalClock   ─┼─▶ ┌──────────────────────────┐ ──▶ EventSink
//!  Provisioning ─┘   │     PowerController      │
//!                    │  SleepPolicy · Publisher │ ──▶ PowerPlatform
//!                    └──────────────────────────┘     (idle / hibernate / beep)
//! ```

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::config::PowerConfig;
use crate::error::Result;
use crate::fsm::context::PolicyInputs;
use crate::fsm::{HibernateReason, IdleReason, PolicyAction, PowerState, SleepPolicy};
use crate::power::{PowerStatus, StatusLabel, VoltageReading};
use crate::state::SharedState;

use super::events::PowerEvent;
use super::ports::{EventSink, LocalClock, PowerPlatform};

// ───────────────────────────────────────────────────────────────
// Edge-triggered status publisher
// ───────────────────────────────────────────────────────────────

/// Forwards a status label only when it differs from the last one sent.
#[derive(Debug, Default)]
pub struct StatusPublisher {
    last: Option<StatusLabel>,
}

impl StatusPublisher {
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Returns `true` if the label was new and got emitted.
    pub fn publish<S: EventSink + ?Sized>(&mut self, label: StatusLabel, sink: &mut S) -> bool {
        if self.last == Some(label) {
            return false;
        }
        info!("Status: {}", label);
        self.last = Some(label);
        sink.emit(&PowerEvent::StatusChanged(label));
        true
    }

    pub fn last(&self) -> Option<StatusLabel> {
        self.last
    }
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

/// What one policy tick did (hibernation never returns, so it has no variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Provisioning in progress; no decision made.
    Suppressed,
    Stayed,
    Warned,
    /// Went through one light sleep and resumed.
    Idled(IdleReason),
}

/// Result of the one-shot check after a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeVerdict {
    pub status: PowerStatus,
    /// Conditions would normally send the node back to hibernation.
    /// Reported only; the wake check never hibernates by itself.
    pub should_hibernate: bool,
}

pub struct PowerController<P, K> {
    policy: SleepPolicy,
    publisher: StatusPublisher,
    shared: Arc<SharedState>,
    platform: P,
    clock: K,
    grace_ms: u32,
    wake_recovery_v: f32,
}

impl<P: PowerPlatform, K: LocalClock> PowerController<P, K> {
    pub fn new(cfg: &PowerConfig, shared: Arc<SharedState>, platform: P, clock: K) -> Self {
        Self {
            policy: SleepPolicy::new(cfg),
            publisher: StatusPublisher::new(),
            shared,
            platform,
            clock,
            grace_ms: cfg.hibernate_grace_ms,
            wake_recovery_v: cfg.wake_recovery_v,
        }
    }

    pub fn state(&self) -> PowerState {
        self.policy.state()
    }

    pub fn last_status(&self) -> Option<StatusLabel> {
        self.publisher.last()
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one policy tick against the last-known voltage.
    ///
    /// Does not return if the policy decides to hibernate.
    pub fn tick<D, S>(&mut self, delay: &mut D, sink: &mut S) -> Result<TickOutcome>
    where
        D: DelayNs,
        S: EventSink + ?Sized,
    {
        let inputs = PolicyInputs {
            volts: self.shared.voltage.latest().volts,
            local_time: self.clock.local_time(),
            provisioning: self.shared.provisioning.is_active(),
        };
        let decision = self.policy.evaluate(&inputs)?;

        if decision.from != decision.state {
            sink.emit(&PowerEvent::StateChanged {
                from: decision.from,
                to: decision.state,
            });
        }
        if let Some(label) = decision.label {
            self.publisher.publish(label, sink);
        }

        match decision.action {
            PolicyAction::Stay if inputs.provisioning => Ok(TickOutcome::Suppressed),
            PolicyAction::Stay => Ok(TickOutcome::Stayed),
            PolicyAction::Warn => {
                warn!("Controller: battery low ({:.2} V), sounding warning", inputs.volts);
                self.platform.sound_warning();
                sink.emit(&PowerEvent::WarningSounded);
                Ok(TickOutcome::Warned)
            }
            PolicyAction::Idle(reason) => {
                self.idle(reason, decision.state, sink);
                Ok(TickOutcome::Idled(reason))
            }
            PolicyAction::Hibernate(reason) => self.hibernate(reason, delay, sink),
        }
    }

    fn idle<S: EventSink + ?Sized>(&mut self, reason: IdleReason, state: PowerState, sink: &mut S) {
        info!("Controller: light sleep ({:?})", reason);
        sink.emit(&PowerEvent::EnteringIdle(reason));
        self.platform.enter_idle();
        self.policy.resume();
        sink.emit(&PowerEvent::StateChanged {
            from: state,
            to: self.policy.state(),
        });
        sink.emit(&PowerEvent::Resumed);
    }

    /// Grace delay, then the irreversible commit. The label was already
    /// published by `tick`.
    fn hibernate<D, S>(&mut self, reason: HibernateReason, delay: &mut D, sink: &mut S) -> !
    where
        D: DelayNs,
        S: EventSink + ?Sized,
    {
        warn!(
            "Controller: hibernating ({:?}) in {} ms - hardware reset required to wake",
            reason, self.grace_ms
        );
        delay.delay_ms(self.grace_ms);
        sink.emit(&PowerEvent::HibernationCommitted(reason));
        self.platform.commit_hibernation()
    }

    // ── Wake-time check ───────────────────────────────────────

    /// One-shot evaluation after a reset, before the workers start.
    ///
    /// Publishes the classified status, then flags whether the node would
    /// normally go straight back to hibernation. It never hibernates here.
    pub fn wake_check<S: EventSink + ?Sized>(&mut self, reading: VoltageReading, sink: &mut S) -> WakeVerdict {
        let status = self.policy.classify(reading.volts);
        self.publisher.publish(status.label(), sink);

        let in_forced_window = self
            .clock
            .local_time()
            .filter(|t| t.is_valid())
            .is_some_and(|t| self.policy.forced_window().contains(t));
        // NaN compares false, so it counts as low
        let below_recovery = !(reading.volts >= self.wake_recovery_v);
        let should_hibernate = in_forced_window || below_recovery;

        if should_hibernate {
            warn!(
                "Wake: would return to hibernation (forced_window={}, {:.2} V) - not re-entering automatically",
                in_forced_window, reading.volts
            );
            self.publisher.publish(StatusLabel::ShouldReturnToHibernation, sink);
        } else {
            info!("Wake: battery OK at {:.2} V", reading.volts);
            self.publisher.publish(StatusLabel::Ok, sink);
        }

        sink.emit(&PowerEvent::WakeChecked {
            status,
            should_hibernate,
        });
        WakeVerdict {
            status,
            should_hibernate,
        }
    }
}
