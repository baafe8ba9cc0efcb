//! Inbound control path: cloud parameter and BOOT button through the
//! ControlHandle to a manual measurement, the provisioning window against
//! the policy, and the optional circuit monitor.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::mock_hw::{
    MockCredentials, MockPlatform, NoDelay, PlatformCall, RecordingCircuit, RecordingSink, StepClock,
};
use powerwatch::app::control::{ControlHandle, ProvisioningWindow};
use powerwatch::app::events::PowerEvent;
use powerwatch::app::service::{PowerController, TickOutcome};
use powerwatch::config::PowerConfig;
use powerwatch::drivers::button::MeasureButton;
use powerwatch::drivers::hw_init;
use powerwatch::power::VoltageReading;
use powerwatch::scheduler::{CircuitMonitor, InputWorker, ManualWorker, PolicyWorker};
use powerwatch::sensors::battery::BatterySampler;
use powerwatch::sensors::gate::MeasurementGate;
use powerwatch::sensors::{BatteryMonitor, MeasureOutcome, MeasurementSource};
use powerwatch::state::SharedState;
use powerwatch::trigger::{ManualTrigger, RequestChannel, TriggerOutcome};

/// ≈ 3.80 V with the default divider and calibration.
const RAW_3V80: u16 = 2050;

struct Node {
    cfg: PowerConfig,
    shared: Arc<SharedState>,
    monitor: BatteryMonitor<RecordingCircuit>,
    requests: Arc<RequestChannel>,
    control: ControlHandle,
}

fn node() -> Node {
    let cfg = PowerConfig::default();
    let shared = Arc::new(SharedState::new(&cfg));
    let monitor = BatteryMonitor::new(
        Arc::new(MeasurementGate::new(RecordingCircuit::new(RAW_3V80))),
        BatterySampler::new(cfg.sampler),
        Arc::clone(&shared),
    );
    let requests = Arc::new(RequestChannel::new());
    let control = ControlHandle::new(
        ManualTrigger::new(Arc::clone(&requests), cfg.manual_debounce_ms),
        Arc::clone(&shared),
    );
    Node {
        cfg,
        shared,
        monitor,
        requests,
        control,
    }
}

fn manual_worker(n: &Node, sink: &RecordingSink) -> ManualWorker<RecordingCircuit, NoDelay, RecordingSink> {
    ManualWorker::new(
        &n.cfg,
        n.monitor.clone(),
        Arc::clone(&n.requests),
        NoDelay::new(),
        sink.clone(),
    )
}

fn manual_measurements(sink: &RecordingSink) -> usize {
    sink.count(|e| {
        matches!(
            e,
            PowerEvent::VoltageMeasured {
                source: MeasurementSource::Manual,
                ..
            }
        )
    })
}

// ── Manual measurement sources ────────────────────────────────

#[test]
fn cloud_param_edge_produces_manual_measurement() {
    let n = node();
    let sink = RecordingSink::new();
    let mut worker = manual_worker(&n, &sink);

    // the reporting layer holds a clone
    let cloud = n.control.clone();
    assert_eq!(cloud.measure_param(true, 1_000), Some(TriggerOutcome::Accepted));
    assert_eq!(cloud.measure_param(true, 2_000), None);

    let (req, outcome) = worker.try_run_once().expect("request queued");
    assert_eq!(req.requested_at_ms, 1_000);
    assert!(matches!(outcome, MeasureOutcome::Measured(_)));
    assert!(worker.try_run_once().is_none());
    assert_eq!(manual_measurements(&sink), 1);
    assert!(!n.shared.voltage.is_stale());
}

// Only test in this binary that drives the simulated button line.
#[test]
fn button_press_produces_manual_measurement() {
    let n = node();
    let sink = RecordingSink::new();
    let mut worker = manual_worker(&n, &sink);
    let clock = StepClock::at(12, 0);
    let mut input = InputWorker::new(
        &n.cfg,
        MeasureButton::new(),
        n.control.clone(),
        ProvisioningWindow::open(&n.control, true, 0, 0),
        clock.clone(),
        None::<MockCredentials>,
        NoDelay::new(),
    );

    hw_init::sim_set_button_pressed(false);
    assert_eq!(input.run_once(), None);

    hw_init::sim_set_button_pressed(true);
    clock.set_uptime(1_000);
    assert_eq!(input.run_once(), None);
    clock.set_uptime(1_060);
    assert_eq!(input.run_once(), Some(TriggerOutcome::Accepted));
    // still held
    clock.set_uptime(1_200);
    assert_eq!(input.run_once(), None);

    // release and press again inside the 10 s cool-down
    hw_init::sim_set_button_pressed(false);
    clock.set_uptime(2_000);
    input.run_once();
    hw_init::sim_set_button_pressed(true);
    clock.set_uptime(3_000);
    input.run_once();
    clock.set_uptime(3_100);
    assert_eq!(input.run_once(), Some(TriggerOutcome::Debounced));
    hw_init::sim_set_button_pressed(false);

    let (req, outcome) = worker.try_run_once().expect("press queued a request");
    assert_eq!(req.requested_at_ms, 1_060);
    assert!(matches!(outcome, MeasureOutcome::Measured(_)));
    assert!(worker.try_run_once().is_none());
    assert_eq!(manual_measurements(&sink), 1);
}

// ── Provisioning window ───────────────────────────────────────

#[test]
fn unprovisioned_boot_holds_off_hibernation_until_credentials_arrive() {
    let n = node();
    n.shared.voltage.publish(VoltageReading::new(3.05));
    let clock = StepClock::at(12, 0);
    let credentials = MockCredentials::new();
    let platform = MockPlatform::new();

    let window = ProvisioningWindow::open(&n.control, false, 0, 60_000);
    let mut input = InputWorker::new(
        &n.cfg,
        MeasureButton::new(),
        n.control.clone(),
        window,
        clock.clone(),
        Some(credentials.clone()),
        NoDelay::new(),
    );
    let controller = PowerController::new(&n.cfg, Arc::clone(&n.shared), platform.clone(), clock.clone());
    let mut policy = PolicyWorker::new(&n.cfg, controller, NoDelay::new(), RecordingSink::new());

    assert_eq!(policy.run_once().unwrap(), TickOutcome::Suppressed);
    clock.set_uptime(5_000);
    input.run_once();
    assert!(input.provisioning().is_open());
    assert_eq!(policy.run_once().unwrap(), TickOutcome::Suppressed);

    credentials.store();
    clock.set_uptime(6_000);
    input.run_once();
    assert!(!input.provisioning().is_open());
    assert!(!n.shared.provisioning.is_active());

    let result = panic::catch_unwind(AssertUnwindSafe(|| policy.run_once()));
    assert!(result.is_err(), "critical voltage must hibernate once provisioning ends");
    assert_eq!(platform.count(PlatformCall::Hibernate), 1);
}

#[test]
fn provisioning_window_times_out_without_credentials() {
    let n = node();
    let clock = StepClock::at(12, 0);
    let mut input = InputWorker::new(
        &n.cfg,
        MeasureButton::new(),
        n.control.clone(),
        ProvisioningWindow::open(&n.control, false, 0, 30_000),
        clock.clone(),
        Some(MockCredentials::new()),
        NoDelay::new(),
    );

    clock.set_uptime(29_999);
    input.run_once();
    assert!(n.shared.provisioning.is_active());
    clock.set_uptime(30_000);
    input.run_once();
    assert!(!n.shared.provisioning.is_active());
}

// ── Circuit monitor ───────────────────────────────────────────

#[test]
fn circuit_monitor_disabled_by_default() {
    let n = node();
    assert!(CircuitMonitor::new(&n.cfg, n.monitor.clone(), NoDelay::new(), RecordingSink::new()).is_none());
}

#[test]
fn circuit_monitor_reports_relay_and_last_voltage() {
    let mut n = node();
    n.cfg.circuit_monitor_secs = 10;
    let sink = RecordingSink::new();
    let mut diag = CircuitMonitor::new(&n.cfg, n.monitor.clone(), NoDelay::new(), sink.clone())
        .expect("enabled when the period is non-zero");

    diag.run_once();
    diag.run_once();
    let levels: Vec<_> = sink
        .snapshot()
        .into_iter()
        .filter_map(|e| match e {
            PowerEvent::CircuitLevel {
                relay_enabled,
                last_known,
            } => Some((relay_enabled, last_known.volts)),
            _ => None,
        })
        .collect();
    assert_eq!(levels.len(), 2);
    assert!(levels.iter().all(|(relay, v)| !relay && (*v - n.cfg.initial_voltage_v).abs() < 1e-6));
}
