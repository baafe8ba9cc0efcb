//! Powerwatch Firmware: Main Entry Point
//!
//! Battery monitoring and power-state control for the switch node.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BatteryCircuit      LogEventSink   NvsAdapter   Esp32Time     │
//! │  (MeasurementCircuit)(EventSink)    (ConfigPort) (LocalClock)  │
//! │  EspPlatform (PowerPlatform)                                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │        PowerController · SleepPolicy (pure logic)      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  VoltageWorker · PolicyWorker · ManualWorker (pinned threads)  │
//! │        └──── MeasurementGate ──── SharedState ────┘            │
//! │                                                                │
//! │  main task: InputWorker (BOOT button, provisioning window)     │
//! │             └──── ControlHandle ──▶ ManualTrigger              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};

use powerwatch::adapters::hardware::BatteryCircuit;
use powerwatch::adapters::log_sink::LogEventSink;
use powerwatch::adapters::nvs::NvsAdapter;
use powerwatch::adapters::platform::EspPlatform;
use powerwatch::adapters::time::{self, Esp32TimeAdapter};
use powerwatch::app::control::{ControlHandle, ProvisioningWindow};
use powerwatch::app::ports::{ConfigPort, CredentialStore, LocalClock};
use powerwatch::app::service::PowerController;
use powerwatch::config::PowerConfig;
use powerwatch::error::Error;
use powerwatch::drivers::delay::task_delay;
use powerwatch::drivers::button::MeasureButton;
use powerwatch::drivers::{hw_init, task_pin};
use powerwatch::scheduler::{self, CircuitMonitor, InputWorker, ManualWorker, PolicyWorker, VoltageWorker};
use powerwatch::sensors::battery::BatterySampler;
use powerwatch::sensors::gate::MeasurementGate;
use powerwatch::sensors::BatteryMonitor;
use powerwatch::state::SharedState;
use powerwatch::trigger::{ManualTrigger, RequestChannel};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Powerwatch v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    hw_init::init_peripherals().map_err(|e| {
        error!("HAL init failed: {}", e);
        Error::Init("peripherals")
    })?;

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults", e);
            None
        }
    };
    let config = match nvs.as_ref().map(|n| n.load()) {
        Some(Ok(cfg)) => cfg,
        Some(Err(e)) => {
            warn!("NVS config load failed ({}), using defaults", e);
            PowerConfig::default()
        }
        None => PowerConfig::default(),
    };
    let provisioned = nvs.as_ref().is_some_and(|n| n.wifi_provisioned());

    // ── 3. Shared state, gate, clock ──────────────────────────
    let shared = Arc::new(SharedState::new(&config));
    let gate = Arc::new(MeasurementGate::new(BatteryCircuit::new()));
    let monitor = BatteryMonitor::new(gate, BatterySampler::new(config.sampler), Arc::clone(&shared));

    let _sntp = time::start_sntp();
    let clock = Esp32TimeAdapter::new();
    let mut controller = PowerController::new(
        &config,
        Arc::clone(&shared),
        EspPlatform::new(&config),
        clock.clone(),
    );

    // ── 4. Wake check (provisioned nodes only) ────────────────
    let mut delay = task_delay();
    let mut sink = LogEventSink::new();
    if provisioned {
        scheduler::wait_for_clock(&clock, &mut delay, config.clock_sync_wait_secs);
        let verdict = scheduler::run_wake_check(&config, &monitor, &mut controller, &mut delay, &mut sink);
        info!(
            "Wake check: {:?} (should_hibernate={})",
            verdict.status, verdict.should_hibernate
        );
    } else {
        info!("Node not provisioned: wake check skipped until provisioning completes");
    }

    // ── 5. Control surface ────────────────────────────────────
    // The provisioning window must be open before the policy worker's
    // first tick, or an unprovisioned node could hibernate mid-setup.
    let requests = Arc::new(RequestChannel::new());
    let control = ControlHandle::new(
        ManualTrigger::new(Arc::clone(&requests), config.manual_debounce_ms),
        Arc::clone(&shared),
    );
    let provisioning = ProvisioningWindow::open(
        &control,
        provisioned,
        clock.uptime_ms(),
        u64::from(config.provisioning_timeout_secs) * 1000,
    );

    // ── 6. Workers ────────────────────────────────────────────
    let voltage = VoltageWorker::new(&config, monitor.clone(), task_delay(), LogEventSink::new());
    task_pin::spawn_on_core(task_pin::VOLTAGE_WORKER, move || voltage.run())
        .context("spawning voltage worker")?;

    let manual = ManualWorker::new(
        &config,
        monitor.clone(),
        Arc::clone(&requests),
        task_delay(),
        LogEventSink::new(),
    );
    task_pin::spawn_on_core(task_pin::MANUAL_WORKER, move || manual.run())
        .context("spawning manual worker")?;

    let policy = PolicyWorker::new(&config, controller, task_delay(), sink);
    task_pin::spawn_on_core(task_pin::POLICY_WORKER, move || policy.run())
        .context("spawning policy worker")?;

    monitor.report_circuit_level(&mut LogEventSink::new());
    if let Some(diag) = CircuitMonitor::new(&config, monitor.clone(), task_delay(), LogEventSink::new()) {
        task_pin::spawn_on_core(task_pin::MONITOR_WORKER, move || diag.run())
            .context("spawning circuit monitor")?;
    }

    // ── 7. Input loop (main task) ─────────────────────────────
    // `control` is what the cloud parameter and provisioning callbacks get
    // cloned into; the main task itself serves the BOOT button.
    info!("Boot complete, workers running");
    let input = InputWorker::new(
        &config,
        MeasureButton::new(),
        control,
        provisioning,
        clock,
        nvs,
        task_delay(),
    );
    input.run()
}
