//! Measurement path: gate exclusivity across threads, worker settle times,
//! sensor faults, the manual trigger, and the wake-time check.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::mock_hw::{
    CircuitCall, FixedClock, MockPlatform, NoDelay, RecordingCircuit, RecordingSink,
};
use powerwatch::app::events::PowerEvent;
use powerwatch::app::service::PowerController;
use powerwatch::config::PowerConfig;
use powerwatch::error::SensorError;
use powerwatch::power::{PowerStatus, StatusLabel};
use powerwatch::scheduler::{self, ManualWorker, VoltageWorker};
use powerwatch::sensors::battery::BatterySampler;
use powerwatch::sensors::gate::MeasurementGate;
use powerwatch::sensors::{BatteryMonitor, MeasureOutcome, MeasurementSource};
use powerwatch::state::SharedState;
use powerwatch::trigger::{ManualTrigger, RequestChannel, TriggerOutcome};

/// ≈ 3.80 V with the default divider and calibration.
const RAW_3V80: u16 = 2050;
/// ≈ 3.50 V.
const RAW_3V50: u16 = 1888;

fn monitor(cfg: &PowerConfig, circuit: RecordingCircuit) -> BatteryMonitor<RecordingCircuit> {
    BatteryMonitor::new(
        Arc::new(MeasurementGate::new(circuit)),
        BatterySampler::new(cfg.sampler),
        Arc::new(SharedState::new(cfg)),
    )
}

fn assert_never_double_enabled(calls: &[CircuitCall]) {
    let mut enabled = false;
    for (i, call) in calls.iter().enumerate() {
        match call {
            CircuitCall::Enable => {
                assert!(!enabled, "enable at #{} while another enable is outstanding", i);
                enabled = true;
            }
            CircuitCall::Disable => enabled = false,
            CircuitCall::Configure | CircuitCall::Read => {
                assert!(enabled, "{:?} at #{} with the divider disconnected", call, i);
            }
        }
    }
    assert!(!enabled, "circuit left enabled");
}

// ── Gate exclusivity ──────────────────────────────────────────

#[test]
fn concurrent_measurements_never_interleave_on_the_circuit() {
    let cfg = PowerConfig::default();
    let circuit = RecordingCircuit::new(RAW_3V80).with_read_hold(Duration::from_micros(200));
    let log = circuit.clone();
    let mon = monitor(&cfg, circuit);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mon = mon.clone();
            thread::spawn(move || {
                let mut delay = NoDelay::new();
                let mut sink = RecordingSink::new();
                (0..3)
                    .map(|_| {
                        mon.measure(
                            MeasurementSource::Periodic,
                            Duration::from_secs(10),
                            0,
                            &mut delay,
                            &mut sink,
                        )
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for h in handles {
        for outcome in h.join().unwrap() {
            assert!(matches!(outcome, MeasureOutcome::Measured(_)), "{:?}", outcome);
        }
    }

    let calls = log.calls();
    assert_eq!(calls.iter().filter(|c| **c == CircuitCall::Enable).count(), 12);
    assert_never_double_enabled(&calls);
    assert_eq!(mon.shared().voltage.update_count(), 12);
    assert!(!mon.gate().is_busy());
}

// ── Scenario F: manual request while the gate is held ─────────

#[test]
fn scenario_f_manual_request_reports_busy_once_without_retry() {
    let cfg = PowerConfig {
        manual_gate_timeout_ms: 50,
        ..PowerConfig::default()
    };
    let circuit = RecordingCircuit::new(RAW_3V80);
    let log = circuit.clone();
    let mon = monitor(&cfg, circuit);
    let requests = Arc::new(RequestChannel::new());
    let sink = RecordingSink::new();
    let mut worker = ManualWorker::new(&cfg, mon.clone(), Arc::clone(&requests), NoDelay::new(), sink.clone());
    let mut trigger = ManualTrigger::new(Arc::clone(&requests), cfg.manual_debounce_ms);

    // the periodic worker is mid-sequence
    let held = mon.gate().with_exclusive_access(Duration::ZERO).unwrap();
    assert_eq!(trigger.request_measurement(0), TriggerOutcome::Accepted);

    let (_, outcome) = worker.try_run_once().unwrap();
    assert_eq!(outcome, MeasureOutcome::Busy);
    assert!(worker.try_run_once().is_none(), "request must not be re-queued");
    drop(held);

    assert_eq!(
        sink.count(|e| *e == PowerEvent::MeasurementBusy(MeasurementSource::Manual)),
        1
    );
    assert!(log.calls().is_empty(), "busy request touched the circuit");
}

#[test]
fn manual_request_after_release_is_measured() {
    let cfg = PowerConfig::default();
    let mon = monitor(&cfg, RecordingCircuit::new(RAW_3V80));
    let requests = Arc::new(RequestChannel::new());
    let delay = NoDelay::new();
    let mut worker = ManualWorker::new(&cfg, mon.clone(), Arc::clone(&requests), delay.clone(), RecordingSink::new());
    let mut trigger = ManualTrigger::new(Arc::clone(&requests), cfg.manual_debounce_ms);

    assert_eq!(trigger.on_edge(true, 1_000), Some(TriggerOutcome::Accepted));
    trigger.reset_level();
    // second press 4 s later is debounced and never reaches the worker
    assert_eq!(trigger.on_edge(true, 5_000), Some(TriggerOutcome::Debounced));

    let (req, outcome) = worker.run_once();
    assert_eq!(req.requested_at_ms, 1_000);
    let MeasureOutcome::Measured(reading) = outcome else {
        panic!("expected a reading, got {:?}", outcome);
    };
    assert!((reading.volts - 3.80).abs() < 0.01);
    assert!(worker.try_run_once().is_none());

    // manual rest + relay settle + 15 sample gaps
    let s = cfg.sampler;
    let expected = cfg.manual_settle_ms + s.relay_settle_ms + 15 * s.sample_interval_ms;
    assert_eq!(delay.waited_ms(), u64::from(expected));
}

// ── Periodic worker ───────────────────────────────────────────

#[test]
fn periodic_cycle_rests_then_publishes() {
    let cfg = PowerConfig::default();
    let mon = monitor(&cfg, RecordingCircuit::new(RAW_3V80));
    let delay = NoDelay::new();
    let sink = RecordingSink::new();
    let mut worker = VoltageWorker::new(&cfg, mon.clone(), delay.clone(), sink.clone());

    assert!(mon.shared().voltage.is_stale());
    assert!(matches!(worker.run_once(), MeasureOutcome::Measured(_)));
    assert!(!mon.shared().voltage.is_stale());
    assert!((mon.shared().voltage.latest().volts - 3.80).abs() < 0.01);

    let s = cfg.sampler;
    let expected = cfg.periodic_settle_ms + s.relay_settle_ms + 15 * s.sample_interval_ms;
    assert_eq!(delay.waited_ms(), u64::from(expected));
    assert_eq!(
        sink.count(|e| matches!(e, PowerEvent::VoltageMeasured { source: MeasurementSource::Periodic, .. })),
        1
    );
}

#[test]
fn periodic_cycle_skips_when_gate_busy() {
    let cfg = PowerConfig::default();
    let mon = monitor(&cfg, RecordingCircuit::new(RAW_3V80));
    let sink = RecordingSink::new();
    let mut worker = VoltageWorker::new(&cfg, mon.clone(), NoDelay::new(), sink.clone());

    let _held = mon.gate().with_exclusive_access(Duration::ZERO).unwrap();
    assert_eq!(worker.run_once(), MeasureOutcome::Busy);
    assert_eq!(mon.shared().voltage.update_count(), 0);
}

// ── Sensor fault ──────────────────────────────────────────────

#[test]
fn adc_fault_keeps_last_known_and_marks_stale() {
    let cfg = PowerConfig::default();
    let circuit = RecordingCircuit::failing(SensorError::AdcConfig(-1));
    let log = circuit.clone();
    let mon = monitor(&cfg, circuit);
    let sink = RecordingSink::new();
    let mut worker = VoltageWorker::new(&cfg, mon.clone(), NoDelay::new(), sink.clone());

    assert_eq!(
        worker.run_once(),
        MeasureOutcome::Unavailable(SensorError::AdcConfig(-1))
    );
    assert!(mon.shared().voltage.is_stale());
    assert!((mon.shared().voltage.latest().volts - cfg.initial_voltage_v).abs() < 1e-6);
    // divider still disconnected after the failure
    assert_eq!(
        log.calls(),
        vec![CircuitCall::Enable, CircuitCall::Configure, CircuitCall::Disable]
    );
    assert_eq!(
        sink.count(|e| matches!(e, PowerEvent::SensorUnavailable { .. })),
        1
    );
}

// ── Wake check ────────────────────────────────────────────────

fn wake(raw: u16, clock: FixedClock) -> (powerwatch::app::service::WakeVerdict, MockPlatform, RecordingSink) {
    let cfg = PowerConfig::default();
    let mon = monitor(&cfg, RecordingCircuit::new(raw));
    let platform = MockPlatform::new();
    let mut controller = PowerController::new(
        &cfg,
        Arc::new(SharedState::new(&cfg)),
        platform.clone(),
        clock,
    );
    let mut sink = RecordingSink::new();
    let verdict = scheduler::run_wake_check(&cfg, &mon, &mut controller, &mut NoDelay::new(), &mut sink);
    (verdict, platform, sink)
}

#[test]
fn wake_with_low_battery_flags_but_never_hibernates() {
    let (verdict, platform, sink) = wake(RAW_3V50, FixedClock::at(12, 0));
    assert!(verdict.should_hibernate);
    assert_eq!(verdict.status, PowerStatus::ReducedConsumption);
    assert!(platform.history().is_empty());
    assert_eq!(
        sink.count(|e| *e == PowerEvent::StatusChanged(StatusLabel::ShouldReturnToHibernation)),
        1
    );
}

#[test]
fn wake_with_healthy_battery_reports_ok() {
    let (verdict, _, sink) = wake(RAW_3V80, FixedClock::at(12, 0));
    assert!(!verdict.should_hibernate);
    assert_eq!(verdict.status, PowerStatus::Normal);
    // classified label and the wake verdict are both "OK": one notification
    assert_eq!(sink.count(|e| matches!(e, PowerEvent::StatusChanged(_))), 1);
}

#[test]
fn wake_inside_forced_window_flags_even_when_healthy() {
    let (verdict, platform, _) = wake(RAW_3V80, FixedClock::at(4, 30));
    assert!(verdict.should_hibernate);
    assert!(platform.history().is_empty());
}
