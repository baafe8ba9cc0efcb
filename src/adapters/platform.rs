//! SoC power primitives behind [`PowerPlatform`].
//!
//! - **`target_os = "espidf"`**: light sleep with a timer wakeup, deep
//!   sleep with every wakeup source disabled, and the LEDC buzzer.
//! - **`not(target_os = "espidf")`**: logs only. Hibernation parks the
//!   calling thread.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::{error, info, warn};

use crate::app::ports::PowerPlatform;
use crate::config::PowerConfig;
use crate::drivers::hw_init;
use crate::error::Error;

pub struct EspPlatform {
    idle_wakeup_us: u64,
    tone_hz: u32,
    tone_ms: u32,
}

impl EspPlatform {
    /// Light sleep wakes after one policy period.
    pub fn new(cfg: &PowerConfig) -> Self {
        Self {
            idle_wakeup_us: u64::from(cfg.policy_period_secs) * 1_000_000,
            tone_hz: cfg.warning_tone_hz,
            tone_ms: cfg.warning_duration_ms,
        }
    }
}

impl PowerPlatform for EspPlatform {
    #[cfg(target_os = "espidf")]
    fn enter_idle(&mut self) {
        info!("Platform: light sleep for {} s", self.idle_wakeup_us / 1_000_000);
        // SAFETY: plain ESP-IDF sleep API calls; all workers are suspended
        // by the SoC for the duration and resume where they stopped.
        unsafe {
            let ret = esp_sleep_enable_timer_wakeup(self.idle_wakeup_us);
            if ret != ESP_OK as i32 {
                warn!("Platform: timer wakeup setup failed (rc={}), skipping sleep", ret);
                return;
            }
            let ret = esp_light_sleep_start();
            if ret != ESP_OK as i32 {
                warn!("Platform: light sleep rejected (rc={})", ret);
            }
        }
        info!("Platform: resumed from light sleep");
    }

    #[cfg(not(target_os = "espidf"))]
    fn enter_idle(&mut self) {
        info!(
            "Platform(sim): light sleep for {} s skipped",
            self.idle_wakeup_us / 1_000_000
        );
    }

    fn commit_hibernation(&mut self) -> ! {
        #[cfg(target_os = "espidf")]
        {
            info!("Platform: entering deep sleep, no wakeup sources");
            // SAFETY: no wakeup source is left armed; only a reset exits.
            unsafe {
                esp_sleep_disable_wakeup_source(esp_sleep_source_t_ESP_SLEEP_WAKEUP_ALL);
                esp_deep_sleep_start();
            }
        }

        #[cfg(not(target_os = "espidf"))]
        info!("Platform(sim): deep sleep requested");

        error!(
            "Platform: {}",
            Error::ContractViolation("execution continued past hibernation")
        );
        loop {
            std::thread::park();
        }
    }

    fn sound_warning(&mut self) {
        warn!("Platform: low battery warning ({} Hz, {} ms)", self.tone_hz, self.tone_ms);
        hw_init::buzzer_tone(Some(self.tone_hz));
        #[cfg(target_os = "espidf")]
        esp_idf_hal::delay::FreeRtos::delay_ms(self.tone_ms);
        hw_init::buzzer_tone(None);
    }
}
