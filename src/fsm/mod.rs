//! Sleep policy state machine.
//!
//! ```text
//!                 ┌────────────────────────────────────────────┐
//!                 │                 Active                     │◀──────┐
//!                 └──┬──────────────┬──────────────┬───────────┘       │
//!   v ≤ reduced_v    │   evening    │  forced window / v ≤ hib_v      │ resume
//!                    ▼   window     ▼              ▼                   │
//!          ┌─────────────┐  ┌──────────────────┐  ┌─────────────┐      │
//!          │ ReducedIdle │  │ LightSleepWindow │  │ Hibernating │      │
//!          └──────┬──────┘  └────────┬─────────┘  └─────────────┘      │
//!                 └──────────────────┴──── enter_idle() returns ───────┘
//! ```
//!
//! Rules are evaluated every tick in priority order; the first match wins:
//!
//! 1. provisioning active → `Active`, no decision
//! 2. inside the forced-hibernation window → `Hibernating`
//! 3. `v ≤ hibernate_immediate_v` → `Hibernating`
//! 4. `v < prepare_v` → warn, stay `Active`
//! 5. `v ≤ reduced_v` → `ReducedIdle`
//! 6. inside the light-sleep window and `v > light_sleep_min_v` → `LightSleepWindow`
//! 7. otherwise `Active`
//!
//! `Hibernating` is terminal. The engine only decides; the
//! [`PowerController`](crate::app::service::PowerController) performs the
//! side effects and calls [`SleepPolicy::resume`] after an idle.

pub mod context;

use context::PolicyInputs;
use log::{debug, error, info};
use serde::Serialize;

use crate::config::{PowerConfig, Thresholds};
use crate::error::{Error, Result};
use crate::power::{classify, PowerStatus, StatusLabel};
use crate::window::TimeWindow;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum PowerState {
    Active = 0,
    ReducedIdle = 1,
    LightSleepWindow = 2,
    Hibernating = 3,
}

impl PowerState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::ReducedIdle => "ReducedIdle",
            Self::LightSleepWindow => "LightSleepWindow",
            Self::Hibernating => "Hibernating",
        }
    }

    /// Only a hardware reset leaves a terminal state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Hibernating)
    }
}

/// Why the node is hibernating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HibernateReason {
    ForcedWindow,
    CriticalVoltage,
}

/// Why the node is taking a light sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IdleReason {
    ReducedConsumption,
    EveningWindow,
}

/// Side effect requested by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    Stay,
    /// Sound the low-battery warning; no state change.
    Warn,
    /// Enter the reversible idle primitive once.
    Idle(IdleReason),
    /// Publish, wait the grace delay, commit. Never returns.
    Hibernate(HibernateReason),
}

/// Outcome of one [`SleepPolicy::evaluate`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub from: PowerState,
    pub state: PowerState,
    pub status: PowerStatus,
    /// Label to publish, `None` when the tick made no decision.
    pub label: Option<StatusLabel>,
    pub action: PolicyAction,
    pub clock_synced: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SleepPolicy {
    thresholds: Thresholds,
    light_sleep_min_v: f32,
    forced_hibernation: TimeWindow,
    light_sleep: TimeWindow,
    state: PowerState,
    tick_count: u64,
}

impl SleepPolicy {
    pub fn new(cfg: &PowerConfig) -> Self {
        Self {
            thresholds: cfg.thresholds,
            light_sleep_min_v: cfg.light_sleep_min_v,
            forced_hibernation: cfg.forced_hibernation,
            light_sleep: cfg.light_sleep,
            state: PowerState::Active,
            tick_count: 0,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Status for a voltage, through the shared classifier.
    pub fn classify(&self, volts: f32) -> PowerStatus {
        classify(volts, &self.thresholds)
    }

    pub fn forced_window(&self) -> TimeWindow {
        self.forced_hibernation
    }

    /// Run one tick of the rule table.
    ///
    /// Returns `Err(ContractViolation)` if called after a hibernation
    /// decision: nothing should be ticking once the node has committed.
    pub fn evaluate(&mut self, inputs: &PolicyInputs) -> Result<Decision> {
        let from = self.state;
        if from.is_terminal() {
            error!("Policy: tick after hibernation commit - fatal design-invariant breach");
            return Err(Error::ContractViolation("policy tick after hibernation"));
        }
        self.tick_count = self.tick_count.wrapping_add(1);

        let volts = inputs.volts;
        let status = self.classify(volts);
        let time = inputs.synced_time();
        let decide = |state, label, action| Decision {
            from,
            state,
            status,
            label,
            action,
            clock_synced: time.is_some(),
        };

        // 1. provisioning suppresses everything
        if inputs.provisioning {
            self.transition(PowerState::Active);
            debug!("Policy: provisioning active, no decision this tick");
            return Ok(decide(PowerState::Active, None, PolicyAction::Stay));
        }

        if time.is_none() {
            debug!("Policy: {} - voltage-only rules", Error::ClockUnsynchronized);
        }

        // 2. forced-hibernation window
        if time.is_some_and(|t| self.forced_hibernation.contains(t)) {
            return Ok(self.hibernate(HibernateReason::ForcedWindow, decide));
        }

        // 3. critical voltage
        if status == PowerStatus::Hibernating {
            return Ok(self.hibernate(HibernateReason::CriticalVoltage, decide));
        }

        // 4. prepare: warn only
        if status == PowerStatus::PrepareHibernation {
            self.transition(PowerState::Active);
            return Ok(decide(
                PowerState::Active,
                Some(StatusLabel::PrepareHibernation),
                PolicyAction::Warn,
            ));
        }

        // 5. reduced consumption (inclusive upper bound)
        if volts <= self.thresholds.reduced_v {
            self.transition(PowerState::ReducedIdle);
            return Ok(decide(
                PowerState::ReducedIdle,
                Some(StatusLabel::ReducedConsumption),
                PolicyAction::Idle(IdleReason::ReducedConsumption),
            ));
        }

        // 6. evening light sleep
        if time.is_some_and(|t| self.light_sleep.contains(t)) && volts > self.light_sleep_min_v {
            self.transition(PowerState::LightSleepWindow);
            return Ok(decide(
                PowerState::LightSleepWindow,
                Some(status.label()),
                PolicyAction::Idle(IdleReason::EveningWindow),
            ));
        }

        // 7. active
        self.transition(PowerState::Active);
        Ok(decide(PowerState::Active, Some(status.label()), PolicyAction::Stay))
    }

    /// The idle primitive returned; go back to `Active`.
    pub fn resume(&mut self) {
        if matches!(self.state, PowerState::ReducedIdle | PowerState::LightSleepWindow) {
            self.transition(PowerState::Active);
        }
    }

    fn hibernate(
        &mut self,
        reason: HibernateReason,
        decide: impl Fn(PowerState, Option<StatusLabel>, PolicyAction) -> Decision,
    ) -> Decision {
        self.transition(PowerState::Hibernating);
        decide(
            PowerState::Hibernating,
            Some(StatusLabel::EnteringHibernation),
            PolicyAction::Hibernate(reason),
        )
    }

    fn transition(&mut self, next: PowerState) {
        if self.state != next {
            info!("Policy: {} -> {}", self.state.name(), next.name());
            self.state = next;
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
