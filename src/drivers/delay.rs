//! Blocking delay for worker threads.
//!
//! On target this is `esp_idf_hal::delay::FreeRtos`, which yields to the
//! scheduler. On the host, [`StdDelay`] sleeps the calling thread.

#[cfg(target_os = "espidf")]
pub type TaskDelay = esp_idf_hal::delay::FreeRtos;

#[cfg(not(target_os = "espidf"))]
pub type TaskDelay = StdDelay;

#[cfg(target_os = "espidf")]
pub fn task_delay() -> TaskDelay {
    esp_idf_hal::delay::FreeRtos
}

#[cfg(not(target_os = "espidf"))]
pub fn task_delay() -> TaskDelay {
    StdDelay
}

/// `std::thread::sleep`-backed [`DelayNs`](embedded_hal::delay::DelayNs).
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl embedded_hal::delay::DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
