//! Mock adapters for integration tests.
//!
//! Every mock records what was asked of it behind an `Arc<Mutex<..>>`, so a
//! test can hand the mock to a worker (possibly on another thread) and
//! still inspect the full call history afterwards.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use powerwatch::app::events::PowerEvent;
use powerwatch::app::ports::{CredentialStore, EventSink, LocalClock, MeasurementCircuit, PowerPlatform};
use powerwatch::error::SensorError;
use powerwatch::window::TimeOfDay;

/// Panic payload of [`MockPlatform::commit_hibernation`].
pub const HIBERNATION_PANIC: &str = "hibernation committed";

// ── Measurement circuit ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitCall {
    Enable,
    Disable,
    Configure,
    Read,
}

#[derive(Clone)]
pub struct RecordingCircuit {
    pub log: Arc<Mutex<Vec<CircuitCall>>>,
    raw: u16,
    configure_fault: Option<SensorError>,
    read_hold: Duration,
    enabled: bool,
}

#[allow(dead_code)]
impl RecordingCircuit {
    pub fn new(raw: u16) -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            raw,
            configure_fault: None,
            read_hold: Duration::ZERO,
            enabled: false,
        }
    }

    pub fn failing(error: SensorError) -> Self {
        Self {
            configure_fault: Some(error),
            ..Self::new(0)
        }
    }

    /// Sleep inside every read so concurrent callers get a chance to
    /// overlap if the gate lets them.
    pub fn with_read_hold(mut self, hold: Duration) -> Self {
        self.read_hold = hold;
        self
    }

    pub fn calls(&self) -> Vec<CircuitCall> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, call: CircuitCall) {
        self.log.lock().unwrap().push(call);
    }
}

impl MeasurementCircuit for RecordingCircuit {
    fn enable(&mut self) {
        self.record(CircuitCall::Enable);
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.record(CircuitCall::Disable);
        self.enabled = false;
    }

    fn configure(&mut self) -> Result<(), SensorError> {
        self.record(CircuitCall::Configure);
        self.configure_fault.map_or(Ok(()), Err)
    }

    fn read_raw(&mut self) -> Result<u16, SensorError> {
        self.record(CircuitCall::Read);
        if !self.read_hold.is_zero() {
            std::thread::sleep(self.read_hold);
        }
        Ok(self.raw)
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ── Platform ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformCall {
    Idle,
    Warning,
    Hibernate,
}

#[derive(Clone, Default)]
pub struct MockPlatform {
    pub calls: Arc<Mutex<Vec<PlatformCall>>>,
}

#[allow(dead_code)]
impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: PlatformCall) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }
}

impl PowerPlatform for MockPlatform {
    fn enter_idle(&mut self) {
        self.calls.lock().unwrap().push(PlatformCall::Idle);
    }

    fn commit_hibernation(&mut self) -> ! {
        self.calls.lock().unwrap().push(PlatformCall::Hibernate);
        panic!("{}", HIBERNATION_PANIC);
    }

    fn sound_warning(&mut self) {
        self.calls.lock().unwrap().push(PlatformCall::Warning);
    }
}

// ── Clock ─────────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub struct FixedClock(pub Option<TimeOfDay>);

#[allow(dead_code)]
impl FixedClock {
    pub fn at(hour: u8, minute: u8) -> Self {
        Self(TimeOfDay::new(hour, minute))
    }

    pub fn unsynced() -> Self {
        Self(None)
    }
}

impl LocalClock for FixedClock {
    fn local_time(&self) -> Option<TimeOfDay> {
        self.0
    }

    fn uptime_ms(&self) -> u64 {
        0
    }
}

/// Fixed time of day with an uptime the test advances by hand.
#[derive(Clone)]
pub struct StepClock {
    time: Option<TimeOfDay>,
    uptime: Arc<AtomicU64>,
}

#[allow(dead_code)]
impl StepClock {
    pub fn at(hour: u8, minute: u8) -> Self {
        Self {
            time: TimeOfDay::new(hour, minute),
            uptime: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set_uptime(&self, ms: u64) {
        self.uptime.store(ms, Ordering::Relaxed);
    }
}

impl LocalClock for StepClock {
    fn local_time(&self) -> Option<TimeOfDay> {
        self.time
    }

    fn uptime_ms(&self) -> u64 {
        self.uptime.load(Ordering::Relaxed)
    }
}

// ── Credentials ───────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockCredentials(pub Arc<AtomicBool>);

#[allow(dead_code)]
impl MockCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl CredentialStore for MockCredentials {
    fn wifi_provisioned(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingSink {
    pub events: Arc<Mutex<Vec<PowerEvent>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<PowerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&PowerEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &PowerEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── Delay ─────────────────────────────────────────────────────

/// Returns immediately; adds up what it was asked to wait.
#[derive(Clone, Default)]
pub struct NoDelay {
    pub total_ms: Arc<AtomicU64>,
}

#[allow(dead_code)]
impl NoDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waited_ms(&self) -> u64 {
        self.total_ms.load(Ordering::Relaxed)
    }
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ms.fetch_add(u64::from(ns) / 1_000_000, Ordering::Relaxed);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms.fetch_add(u64::from(ms), Ordering::Relaxed);
    }
}
