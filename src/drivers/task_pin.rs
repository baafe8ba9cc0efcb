//! Core-pinned worker threads for the ESP32 dual-core.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::spawn` creates a
//! FreeRTOS task pinned to a specific CPU core with explicit priority
//! and stack size. On non-ESP targets, falls back to plain thread spawn.
//!
//! `esp_pthread_set_cfg()` sets thread-local configuration that applies
//! to the *next* `pthread_create()` from the calling thread, so the
//! config→spawn pair must not be interleaved with other thread creation
//! on the same thread.

use std::io;
use std::thread::JoinHandle;

/// CPU core identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): protocol stacks (WiFi, lwIP).
    Pro = 0,
    /// Core 1 (APP_CPU): application logic.
    App = 1,
}

/// Where and how a worker thread runs.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSpec {
    /// Null-terminated for the pthread config, e.g. `"pw-volt\0"`.
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

impl WorkerSpec {
    pub fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

pub const VOLTAGE_WORKER: WorkerSpec = WorkerSpec {
    name: "pw-volt\0",
    core: Core::App,
    priority: 5,
    stack_kb: 6,
};

/// Highest of the three: a late hibernation decision drains the battery.
pub const POLICY_WORKER: WorkerSpec = WorkerSpec {
    name: "pw-policy\0",
    core: Core::App,
    priority: 6,
    stack_kb: 6,
};

pub const MANUAL_WORKER: WorkerSpec = WorkerSpec {
    name: "pw-manual\0",
    core: Core::App,
    priority: 4,
    stack_kb: 6,
};

/// Optional relay/voltage diagnostic. Lowest priority, kept off the
/// application core.
pub const MONITOR_WORKER: WorkerSpec = WorkerSpec {
    name: "pw-monitor\0",
    core: Core::Pro,
    priority: 1,
    stack_kb: 3,
};

/// Spawn a thread pinned to `spec.core` with the given priority and stack.
#[cfg(target_os = "espidf")]
pub fn spawn_on_core(spec: WorkerSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    // SAFETY: config is copied by esp_pthread_set_cfg; `name` is 'static.
    unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = i32::from(spec.priority);
        cfg.stack_size = (spec.stack_kb * 1024) as i32;
        cfg.thread_name = spec.name.as_ptr() as *const _;
        let ret = esp_idf_sys::esp_pthread_set_cfg(&cfg);
        if ret != esp_idf_sys::ESP_OK as i32 {
            return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
        }
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        spec.display_name(),
        spec.core,
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .spawn(f)
}

/// Simulation fallback; ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core(spec: WorkerSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    log::info!(
        "Spawning '{}' (sim, no core pinning, stack={}KB)",
        spec.display_name(),
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        // Host frames are larger than Xtensa ones.
        .stack_size((spec.stack_kb * 1024).max(64 * 1024))
        .spawn(f)
}
