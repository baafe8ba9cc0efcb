//! ESP32 time adapter.
//!
//! Provides the wall clock and monotonic uptime behind [`LocalClock`].
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for uptime,
//!   `gettimeofday` + `localtime_r` for the local time of day. SNTP is
//!   started through `esp-idf-svc` ([`start_sntp`]) and the timezone is set
//!   with POSIX `TZ`.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` for uptime and a
//!   settable simulated time of day for host tests.

use crate::app::ports::LocalClock;
use crate::window::TimeOfDay;

#[cfg(not(target_os = "espidf"))]
use std::sync::{Arc, Mutex};

/// Europe/Lisbon.
pub const LOCAL_TZ: &str = "WET0WEST,M3.5.0/1,M10.5.0";

/// Earlier wall-clock readings mean SNTP has not run yet.
#[cfg(target_os = "espidf")]
const EPOCH_2020: i64 = 1_577_836_800;

/// Time adapter for the ESP32 platform. Cheap to clone; every worker that
/// needs the clock gets its own copy.
#[derive(Clone)]
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    sim_time: Arc<Mutex<Option<TimeOfDay>>>,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        set_timezone();
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            sim_time: Arc::new(Mutex::new(None)),
        }
    }

    /// Set the simulated local time (`None` = unsynchronised). Shared by
    /// every clone.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_time(&self, t: Option<TimeOfDay>) {
        let mut guard = match self.sim_time.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = t;
    }
}

/// Start SNTP in the background. The caller keeps the handle alive for as
/// long as the wall clock should stay synchronised.
#[cfg(target_os = "espidf")]
pub fn start_sntp() -> Option<esp_idf_svc::sntp::EspSntp<'static>> {
    match esp_idf_svc::sntp::EspSntp::new_default() {
        Ok(sntp) => {
            log::info!("Clock: SNTP started");
            Some(sntp)
        }
        Err(e) => {
            log::warn!("Clock: SNTP start failed ({:?}), wall clock unsynchronised", e);
            None
        }
    }
}

#[cfg(target_os = "espidf")]
fn set_timezone() {
    // SAFETY: called from the boot task before any worker reads the clock.
    unsafe {
        std::env::set_var("TZ", LOCAL_TZ);
        esp_idf_svc::sys::tzset();
    }
}

#[cfg(not(target_os = "espidf"))]
fn set_timezone() {}

impl LocalClock for Esp32TimeAdapter {
    #[cfg(target_os = "espidf")]
    fn local_time(&self) -> Option<TimeOfDay> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        if i64::from(tv.tv_sec) < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        let hour = u8::try_from(tm.tm_hour).ok()?;
        let minute = u8::try_from(tm.tm_min).ok()?;
        TimeOfDay::new(hour, minute)
    }

    #[cfg(not(target_os = "espidf"))]
    fn local_time(&self) -> Option<TimeOfDay> {
        match self.sim_time.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    #[cfg(target_os = "espidf")]
    fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
