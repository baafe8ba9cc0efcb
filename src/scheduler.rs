//! Periodic and on-demand workers.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  VoltageWorker   every 20 min   gate(100 ms) → rest 20 s     │
//! │                                 → sample → publish           │
//! │  PolicyWorker    every 30 s     PowerController::tick        │
//! │  ManualWorker    on request     gate(1 s) → rest 5 s         │
//! │                                 → sample → publish           │
//! │  InputWorker     every 20 ms    button → ControlHandle,      │
//! │                                 provisioning window          │
//! │  CircuitMonitor  optional       relay level + last voltage   │
//! └───────────────┬──────────────────────────────┬───────────────┘
//!                 │ MeasurementGate (exclusive)  │ VoltageStore
//!                 ▼                              ▼
//!            battery divider              last-known voltage
//! ```
//!
//! Each worker exposes `run_once` (one cycle, used by tests) and `run`
//! (loops forever on its own thread). There is no ordering between the
//! voltage and policy workers beyond the gate; the policy reads whatever
//! reading is current, however stale.

use std::sync::Arc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use futures_lite::future;
use log::{error, info, warn};

use crate::app::control::{ControlHandle, ProvisioningWindow};
use crate::app::ports::{CredentialStore, EventSink, LocalClock, MeasurementCircuit, PowerPlatform};
use crate::app::service::{PowerController, TickOutcome, WakeVerdict};
use crate::config::PowerConfig;
use crate::drivers::button::MeasureButton;
use crate::error::Error;
use crate::sensors::{BatteryMonitor, MeasureOutcome, MeasurementSource};
use crate::trigger::{MeasureRequest, RequestChannel, TriggerOutcome};

// ═══════════════════════════════════════════════════════════════
//  Voltage worker
// ═══════════════════════════════════════════════════════════════

pub struct VoltageWorker<C, D, S> {
    monitor: BatteryMonitor<C>,
    delay: D,
    sink: S,
    period_ms: u32,
    rest_ms: u32,
    gate_timeout: Duration,
}

impl<C, D, S> VoltageWorker<C, D, S>
where
    C: MeasurementCircuit,
    D: DelayNs,
    S: EventSink,
{
    pub fn new(cfg: &PowerConfig, monitor: BatteryMonitor<C>, delay: D, sink: S) -> Self {
        Self {
            monitor,
            delay,
            sink,
            period_ms: cfg.voltage_period_secs.saturating_mul(1000),
            rest_ms: cfg.periodic_settle_ms,
            gate_timeout: Duration::from_millis(u64::from(cfg.periodic_gate_timeout_ms)),
        }
    }

    /// One sampling cycle. A busy gate skips the cycle; there is no early
    /// retry.
    pub fn run_once(&mut self) -> MeasureOutcome {
        self.monitor.measure(
            MeasurementSource::Periodic,
            self.gate_timeout,
            self.rest_ms,
            &mut self.delay,
            &mut self.sink,
        )
    }

    pub fn run(mut self) -> ! {
        info!("VoltageWorker: started (period {} s)", self.period_ms / 1000);
        loop {
            self.run_once();
            self.delay.delay_ms(self.period_ms);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Policy worker
// ═══════════════════════════════════════════════════════════════

pub struct PolicyWorker<P, K, D, S> {
    controller: PowerController<P, K>,
    delay: D,
    sink: S,
    period_ms: u32,
}

impl<P, K, D, S> PolicyWorker<P, K, D, S>
where
    P: PowerPlatform,
    K: LocalClock,
    D: DelayNs,
    S: EventSink,
{
    pub fn new(cfg: &PowerConfig, controller: PowerController<P, K>, delay: D, sink: S) -> Self {
        Self {
            controller,
            delay,
            sink,
            period_ms: cfg.policy_period_secs.saturating_mul(1000),
        }
    }

    /// One policy tick. Never returns if the tick hibernates.
    pub fn run_once(&mut self) -> Result<TickOutcome, Error> {
        self.controller.tick(&mut self.delay, &mut self.sink)
    }

    pub fn controller(&self) -> &PowerController<P, K> {
        &self.controller
    }

    pub fn run(mut self) -> ! {
        info!("PolicyWorker: started (period {} s)", self.period_ms / 1000);
        loop {
            if let Err(e) = self.run_once() {
                // Only reachable as a contract violation: stop deciding.
                error!("PolicyWorker: {} - halting policy evaluation", e);
                park_forever();
            }
            self.delay.delay_ms(self.period_ms);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Manual worker
// ═══════════════════════════════════════════════════════════════

pub struct ManualWorker<C, D, S> {
    monitor: BatteryMonitor<C>,
    requests: Arc<RequestChannel>,
    delay: D,
    sink: S,
    rest_ms: u32,
    gate_timeout: Duration,
}

impl<C, D, S> ManualWorker<C, D, S>
where
    C: MeasurementCircuit,
    D: DelayNs,
    S: EventSink,
{
    pub fn new(
        cfg: &PowerConfig,
        monitor: BatteryMonitor<C>,
        requests: Arc<RequestChannel>,
        delay: D,
        sink: S,
    ) -> Self {
        Self {
            monitor,
            requests,
            delay,
            sink,
            rest_ms: cfg.manual_settle_ms,
            gate_timeout: Duration::from_millis(u64::from(cfg.manual_gate_timeout_ms)),
        }
    }

    /// Block until the next request, then serve it. A busy gate is
    /// reported once and the request is not retried.
    pub fn run_once(&mut self) -> (MeasureRequest, MeasureOutcome) {
        let request = future::block_on(self.requests.receive());
        let outcome = self.serve(request);
        (request, outcome)
    }

    /// Serve a request that is already queued, if any.
    pub fn try_run_once(&mut self) -> Option<(MeasureRequest, MeasureOutcome)> {
        let request = self.requests.try_receive().ok()?;
        Some((request, self.serve(request)))
    }

    fn serve(&mut self, request: MeasureRequest) -> MeasureOutcome {
        info!("ManualWorker: serving request from {} ms", request.requested_at_ms);
        self.monitor.measure(
            MeasurementSource::Manual,
            self.gate_timeout,
            self.rest_ms,
            &mut self.delay,
            &mut self.sink,
        )
    }

    pub fn run(mut self) -> ! {
        info!("ManualWorker: waiting for requests");
        loop {
            self.run_once();
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Input worker
// ═══════════════════════════════════════════════════════════════

/// Credentials are read from flash at most this often.
const CREDENTIAL_POLL_MS: u64 = 1_000;

/// Polls the measure button and the provisioning window. Runs on the main
/// task once boot is done.
pub struct InputWorker<K, N, D> {
    button: MeasureButton,
    control: ControlHandle,
    provisioning: ProvisioningWindow,
    clock: K,
    credentials: Option<N>,
    delay: D,
    poll_ms: u32,
    next_credential_check_ms: u64,
}

impl<K, N, D> InputWorker<K, N, D>
where
    K: LocalClock,
    N: CredentialStore,
    D: DelayNs,
{
    pub fn new(
        cfg: &PowerConfig,
        button: MeasureButton,
        control: ControlHandle,
        provisioning: ProvisioningWindow,
        clock: K,
        credentials: Option<N>,
        delay: D,
    ) -> Self {
        Self {
            button,
            control,
            provisioning,
            clock,
            credentials,
            delay,
            poll_ms: cfg.input_poll_ms,
            next_credential_check_ms: 0,
        }
    }

    /// One poll. Returns the trigger outcome if the button fired.
    pub fn run_once(&mut self) -> Option<TriggerOutcome> {
        let now = self.clock.uptime_ms();

        if self.provisioning.is_open() {
            // Only the flash read is throttled; the timeout is checked every poll.
            let stored = now >= self.next_credential_check_ms && {
                self.next_credential_check_ms = now.saturating_add(CREDENTIAL_POLL_MS);
                self.credentials.as_ref().is_some_and(N::wifi_provisioned)
            };
            self.provisioning.poll(&self.control, now, stored);
        }

        if !self.button.poll(now) {
            return None;
        }
        let outcome = self.control.request_measurement(now);
        info!("InputWorker: button press -> {:?}", outcome);
        Some(outcome)
    }

    pub fn provisioning(&self) -> &ProvisioningWindow {
        &self.provisioning
    }

    pub fn run(mut self) -> ! {
        info!("InputWorker: polling every {} ms", self.poll_ms);
        loop {
            self.run_once();
            self.delay.delay_ms(self.poll_ms);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Circuit monitor
// ═══════════════════════════════════════════════════════════════

/// Periodic relay/voltage diagnostic. Only ever tries the gate with a zero
/// timeout, so it cannot delay a measurement.
pub struct CircuitMonitor<C, D, S> {
    monitor: BatteryMonitor<C>,
    delay: D,
    sink: S,
    period_ms: u32,
}

impl<C, D, S> CircuitMonitor<C, D, S>
where
    C: MeasurementCircuit,
    D: DelayNs,
    S: EventSink,
{
    /// `None` when `circuit_monitor_secs` is 0.
    pub fn new(cfg: &PowerConfig, monitor: BatteryMonitor<C>, delay: D, sink: S) -> Option<Self> {
        (cfg.circuit_monitor_secs > 0).then(|| Self {
            monitor,
            delay,
            sink,
            period_ms: cfg.circuit_monitor_secs.saturating_mul(1000),
        })
    }

    pub fn run_once(&mut self) {
        self.monitor.report_circuit_level(&mut self.sink);
    }

    pub fn run(mut self) -> ! {
        info!("CircuitMonitor: every {} s", self.period_ms / 1000);
        loop {
            self.run_once();
            self.delay.delay_ms(self.period_ms);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Boot-time helpers
// ═══════════════════════════════════════════════════════════════

/// Sample once, bypassing the periodic cadence, and run the wake check.
///
/// If the sample fails the check falls back to the last-known voltage.
pub fn run_wake_check<C, P, K, D, S>(
    cfg: &PowerConfig,
    monitor: &BatteryMonitor<C>,
    controller: &mut PowerController<P, K>,
    delay: &mut D,
    sink: &mut S,
) -> WakeVerdict
where
    C: MeasurementCircuit,
    P: PowerPlatform,
    K: LocalClock,
    D: DelayNs,
    S: EventSink,
{
    let timeout = Duration::from_millis(u64::from(cfg.manual_gate_timeout_ms));
    let reading = match monitor.measure(MeasurementSource::Wake, timeout, 0, delay, sink) {
        MeasureOutcome::Measured(r) => r,
        other => {
            let last = monitor.shared().voltage.latest();
            warn!("Wake: sample failed ({:?}), using last-known {:.2} V", other, last.volts);
            last
        }
    };
    controller.wake_check(reading, sink)
}

/// Poll `clock` until it reports a time or `timeout_secs` elapse.
/// Returns whether the clock synchronised.
pub fn wait_for_clock<K: LocalClock, D: DelayNs>(clock: &K, delay: &mut D, timeout_secs: u32) -> bool {
    for waited in 0..=timeout_secs {
        if clock.local_time().is_some() {
            info!("Clock: synchronised after {} s", waited);
            return true;
        }
        if waited < timeout_secs {
            delay.delay_ms(1000);
        }
    }
    warn!("Clock: not synchronised after {} s, window rules disabled", timeout_secs);
    false
}

fn park_forever() -> ! {
    loop {
        std::thread::park();
    }
}
