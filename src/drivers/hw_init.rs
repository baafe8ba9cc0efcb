//! One-shot and per-sequence peripheral helpers.
//!
//! Configures the relay GPIO, the measure button input, the ADC1 oneshot
//! unit and the buzzer LEDC channel using raw ESP-IDF sys calls. On the host every helper is backed
//! by simulation atomics so the measurement path can be driven from tests.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU16, Ordering};

use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during peripheral configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
}

impl HwInitError {
    /// Underlying `esp_err_t`.
    pub fn rc(self) -> i32 {
        match self {
            Self::AdcInitFailed(rc) | Self::GpioConfigFailed(rc) | Self::LedcInitFailed(rc) => rc,
        }
    }
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
        }
    }
}

// ── Simulation backing store ──────────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_ADC_RAW: AtomicU16 = AtomicU16::new(0);
#[cfg(not(target_os = "espidf"))]
static SIM_ADC_FAULT: AtomicI32 = AtomicI32::new(0);
#[cfg(not(target_os = "espidf"))]
static SIM_RELAY_HIGH: AtomicBool = AtomicBool::new(true);
#[cfg(not(target_os = "espidf"))]
static SIM_BUTTON_PRESSED: AtomicBool = AtomicBool::new(false);

/// Inject the raw ADC count returned by every simulated read.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_battery_adc(raw: u16) {
    SIM_ADC_RAW.store(raw, Ordering::Relaxed);
}

/// Make the next simulated ADC configuration fail with `rc` (0 clears).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc_fault(rc: i32) {
    SIM_ADC_FAULT.store(rc, Ordering::Relaxed);
}

/// Hold the simulated measure button down (`true`) or release it.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_button_pressed(pressed: bool) {
    SIM_BUTTON_PRESSED.store(pressed, Ordering::Relaxed);
}

// ── Boot-time init ────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before any worker is spawned.
    unsafe {
        init_relay_output()?;
        init_button_input()?;
        init_buzzer()?;
    }
    info!(
        "hw_init: relay GPIO{}, button GPIO{}, buzzer GPIO{}; battery tap GPIO{} (ADC1 ch{})",
        pins::MEASURE_RELAY_GPIO,
        pins::MEASURE_BUTTON_GPIO,
        pins::BUZZER_GPIO,
        pins::BATTERY_ADC_GPIO,
        pins::BATTERY_ADC_CHANNEL
    );
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!(
        "hw_init(sim): peripheral init skipped (battery tap GPIO{})",
        pins::BATTERY_ADC_GPIO
    );
    SIM_RELAY_HIGH.store(true, Ordering::Relaxed);
    SIM_BUTTON_PRESSED.store(false, Ordering::Relaxed);
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// Create the ADC1 unit on first use and (re)configure the battery channel
/// for 12-bit width and 12 dB attenuation.
///
/// Only ever called by the holder of the measurement gate, so access to
/// `ADC1_HANDLE` is serialised.
#[cfg(target_os = "espidf")]
pub fn adc1_configure(channel: u32) -> Result<(), HwInitError> {
    // SAFETY: serialised by the measurement gate (see doc comment).
    unsafe {
        if ADC1_HANDLE.is_null() {
            let init_cfg = adc_oneshot_unit_init_cfg_t {
                unit_id: adc_unit_t_ADC_UNIT_1,
                ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..Default::default()
            };
            let ret = adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE);
            if ret != ESP_OK as i32 {
                return Err(HwInitError::AdcInitFailed(ret));
            }
        }
        let chan_cfg = adc_oneshot_chan_cfg_t {
            atten: adc_atten_t_ADC_ATTEN_DB_12,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
        };
        let ret = adc_oneshot_config_channel(ADC1_HANDLE, channel, &chan_cfg);
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_configure(_channel: u32) -> Result<(), HwInitError> {
    match SIM_ADC_FAULT.load(Ordering::Relaxed) {
        0 => Ok(()),
        rc => Err(HwInitError::AdcInitFailed(rc)),
    }
}

#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Result<u16, i32> {
    let mut raw: i32 = 0;
    // SAFETY: handle created in adc1_configure(); gate-serialised access.
    let ret = unsafe { adc_oneshot_read(ADC1_HANDLE, channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return Err(ret);
    }
    Ok(raw.max(0) as u16)
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(_channel: u32) -> Result<u16, i32> {
    Ok(SIM_ADC_RAW.load(Ordering::Relaxed))
}

// ── Relay GPIO ────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_relay_output() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::MEASURE_RELAY_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    // Relay is active-low: start disconnected.
    unsafe { gpio_set_level(pins::MEASURE_RELAY_GPIO, 1) };
    Ok(())
}

/// Button line: input with the internal pull-up as a backstop for the
/// board's external one.
#[cfg(target_os = "espidf")]
unsafe fn init_button_input() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::MEASURE_BUTTON_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: output pin configured in init_peripherals().
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) {
    if pin == pins::MEASURE_RELAY_GPIO {
        SIM_RELAY_HIGH.store(high, Ordering::Relaxed);
    }
}

#[cfg(target_os = "espidf")]
pub fn gpio_level(pin: i32) -> bool {
    // SAFETY: read-only register access.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_level(pin: i32) -> bool {
    match pin {
        pins::MEASURE_RELAY_GPIO => SIM_RELAY_HIGH.load(Ordering::Relaxed),
        // active low
        pins::MEASURE_BUTTON_GPIO => !SIM_BUTTON_PRESSED.load(Ordering::Relaxed),
        _ => false,
    }
}

// ── Buzzer (LEDC) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_buzzer() -> Result<(), HwInitError> {
    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_10_BIT,
        freq_hz: 3_000,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }
    let ret = unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: pins::BUZZER_LEDC_CHANNEL,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: pins::BUZZER_GPIO,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        })
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }
    Ok(())
}

/// Start (`Some(freq)`) or silence (`None`) the buzzer tone.
#[cfg(target_os = "espidf")]
pub fn buzzer_tone(freq_hz: Option<u32>) {
    // SAFETY: LEDC timer/channel configured in init_buzzer(); only the
    // policy worker drives the buzzer.
    unsafe {
        match freq_hz {
            Some(hz) => {
                ledc_set_freq(ledc_mode_t_LEDC_LOW_SPEED_MODE, ledc_timer_t_LEDC_TIMER_0, hz);
                ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, pins::BUZZER_LEDC_CHANNEL, pins::BUZZER_DUTY_ON);
            }
            None => {
                ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, pins::BUZZER_LEDC_CHANNEL, 0);
            }
        }
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, pins::BUZZER_LEDC_CHANNEL);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn buzzer_tone(_freq_hz: Option<u32>) {}
