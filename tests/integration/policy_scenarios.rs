//! End-to-end policy scenarios: shared voltage store → PowerController →
//! platform and sink, driven through the PolicyWorker the firmware runs.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::mock_hw::{FixedClock, HIBERNATION_PANIC, MockPlatform, NoDelay, PlatformCall, RecordingSink};
use powerwatch::app::events::PowerEvent;
use powerwatch::app::service::{PowerController, TickOutcome};
use powerwatch::config::PowerConfig;
use powerwatch::fsm::{HibernateReason, IdleReason, PowerState};
use powerwatch::power::{StatusLabel, VoltageReading};
use powerwatch::scheduler::PolicyWorker;
use powerwatch::state::SharedState;

type Worker = PolicyWorker<MockPlatform, FixedClock, NoDelay, RecordingSink>;

struct Rig {
    worker: Worker,
    shared: Arc<SharedState>,
    platform: MockPlatform,
    sink: RecordingSink,
    delay: NoDelay,
}

fn rig(volts: f32, clock: FixedClock) -> Rig {
    let cfg = PowerConfig::default();
    let shared = Arc::new(SharedState::new(&cfg));
    shared.voltage.publish(VoltageReading::new(volts));
    let platform = MockPlatform::new();
    let sink = RecordingSink::new();
    let delay = NoDelay::new();
    let controller = PowerController::new(&cfg, Arc::clone(&shared), platform.clone(), clock);
    Rig {
        worker: PolicyWorker::new(&cfg, controller, delay.clone(), sink.clone()),
        shared,
        platform,
        sink,
        delay,
    }
}

/// Run one tick that is expected to hibernate; returns the panic message.
fn tick_expecting_hibernation(rig: &mut Rig) -> String {
    let result = panic::catch_unwind(AssertUnwindSafe(|| rig.worker.run_once()));
    let payload = match result {
        Ok(outcome) => panic!("tick returned {:?} instead of hibernating", outcome),
        Err(p) => p,
    };
    payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| (*s).to_string()))
        .unwrap_or_default()
}

fn status_changes(sink: &RecordingSink) -> Vec<StatusLabel> {
    sink.snapshot()
        .into_iter()
        .filter_map(|e| match e {
            PowerEvent::StatusChanged(l) => Some(l),
            _ => None,
        })
        .collect()
}

// ── Scenario A: healthy battery at noon ───────────────────────

#[test]
fn scenario_a_steady_normal_voltage_takes_no_action() {
    let mut r = rig(3.80, FixedClock::at(12, 0));
    assert_eq!(r.worker.run_once().unwrap(), TickOutcome::Stayed);
    assert_eq!(r.worker.controller().state(), PowerState::Active);
    assert_eq!(status_changes(&r.sink), vec![StatusLabel::Ok]);
    assert!(r.platform.history().is_empty());
}

// ── Scenario B: prepare-hibernation warning ───────────────────

#[test]
fn scenario_b_low_voltage_warns_without_committing() {
    let mut r = rig(3.80, FixedClock::at(12, 0));
    r.worker.run_once().unwrap();

    r.shared.voltage.publish(VoltageReading::new(3.25));
    assert_eq!(r.worker.run_once().unwrap(), TickOutcome::Warned);

    assert_eq!(
        status_changes(&r.sink),
        vec![StatusLabel::Ok, StatusLabel::PrepareHibernation]
    );
    assert_eq!(r.platform.history(), vec![PlatformCall::Warning]);
    assert_eq!(r.sink.count(|e| *e == PowerEvent::WarningSounded), 1);
    assert_eq!(r.worker.controller().state(), PowerState::Active);
}

// ── Scenario C: critical voltage ──────────────────────────────

#[test]
fn scenario_c_critical_voltage_commits_after_grace() {
    let mut r = rig(3.05, FixedClock::at(12, 0));
    let msg = tick_expecting_hibernation(&mut r);

    assert_eq!(msg, HIBERNATION_PANIC);
    assert_eq!(r.platform.history(), vec![PlatformCall::Hibernate]);
    assert_eq!(r.delay.waited_ms(), u64::from(PowerConfig::default().hibernate_grace_ms));
    assert_eq!(status_changes(&r.sink), vec![StatusLabel::EnteringHibernation]);
    // the commit event is the last thing emitted before the platform call
    assert_eq!(
        r.sink.snapshot().last(),
        Some(&PowerEvent::HibernationCommitted(HibernateReason::CriticalVoltage))
    );
}

// ── Scenario D: forced window beats healthy voltage ───────────

#[test]
fn scenario_d_forced_window_commits_regardless_of_voltage() {
    let mut r = rig(3.80, FixedClock::at(4, 0));
    tick_expecting_hibernation(&mut r);

    assert_eq!(r.platform.count(PlatformCall::Hibernate), 1);
    assert_eq!(
        r.sink.snapshot().last(),
        Some(&PowerEvent::HibernationCommitted(HibernateReason::ForcedWindow))
    );
}

// ── Scenario E: provisioning suppresses C and D ───────────────

#[test]
fn scenario_e_provisioning_suppresses_critical_voltage() {
    let mut r = rig(3.05, FixedClock::at(12, 0));
    r.shared.provisioning.set(true);

    for _ in 0..3 {
        assert_eq!(r.worker.run_once().unwrap(), TickOutcome::Suppressed);
    }
    assert_eq!(r.worker.controller().state(), PowerState::Active);
    assert!(r.platform.history().is_empty());
}

#[test]
fn scenario_e_provisioning_suppresses_forced_window() {
    let mut r = rig(3.80, FixedClock::at(4, 0));
    r.shared.provisioning.set(true);
    assert_eq!(r.worker.run_once().unwrap(), TickOutcome::Suppressed);
    assert_eq!(r.platform.count(PlatformCall::Hibernate), 0);

    // provisioning ends: the next tick hibernates
    r.shared.provisioning.set(false);
    tick_expecting_hibernation(&mut r);
    assert_eq!(r.platform.count(PlatformCall::Hibernate), 1);
}

// ── Edge-triggered status notification ────────────────────────

#[test]
fn constant_voltage_notifies_status_once() {
    let mut r = rig(3.80, FixedClock::at(12, 0));
    for _ in 0..10 {
        r.worker.run_once().unwrap();
    }
    assert_eq!(r.sink.count(|e| matches!(e, PowerEvent::StatusChanged(_))), 1);
}

#[test]
fn reduced_consumption_idles_every_tick_but_notifies_once() {
    let mut r = rig(3.40, FixedClock::at(12, 0));
    for _ in 0..4 {
        assert_eq!(
            r.worker.run_once().unwrap(),
            TickOutcome::Idled(IdleReason::ReducedConsumption)
        );
    }
    assert_eq!(r.platform.count(PlatformCall::Idle), 4);
    assert_eq!(status_changes(&r.sink), vec![StatusLabel::ReducedConsumption]);
    assert_eq!(r.worker.controller().state(), PowerState::Active);
}

// ── Windows and clock ─────────────────────────────────────────

#[test]
fn evening_window_light_sleeps_with_healthy_battery() {
    let mut r = rig(3.90, FixedClock::at(19, 0));
    assert_eq!(
        r.worker.run_once().unwrap(),
        TickOutcome::Idled(IdleReason::EveningWindow)
    );
    assert_eq!(r.platform.history(), vec![PlatformCall::Idle]);
}

#[test]
fn evening_window_ends_before_eight() {
    let mut r = rig(3.90, FixedClock::at(20, 0));
    assert_eq!(r.worker.run_once().unwrap(), TickOutcome::Stayed);
}

#[test]
fn unsynchronised_clock_falls_back_to_voltage_rules() {
    // 3.80 V inside what would be the forced window: no clock, no window
    let mut r = rig(3.80, FixedClock::unsynced());
    assert_eq!(r.worker.run_once().unwrap(), TickOutcome::Stayed);

    r.shared.voltage.publish(VoltageReading::new(3.05));
    tick_expecting_hibernation(&mut r);
    assert_eq!(r.platform.count(PlatformCall::Hibernate), 1);
}
