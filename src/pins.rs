//! GPIO / peripheral pin assignments for the switch node board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Battery measurement circuit
// ---------------------------------------------------------------------------

/// Digital output driving the measurement relay. Active LOW: pulling the
/// pin low connects the battery divider to the ADC input.
pub const MEASURE_RELAY_GPIO: i32 = 19;

/// Battery divider tap. ADC1 channel 6 (GPIO 34 on the ESP32).
pub const BATTERY_ADC_GPIO: i32 = 34;
/// ADC1 channel index for [`BATTERY_ADC_GPIO`].
pub const BATTERY_ADC_CHANNEL: u32 = 6;

// ---------------------------------------------------------------------------
// User input
// ---------------------------------------------------------------------------

/// On-board BOOT button, reused as a local "measure now" request. Active
/// LOW with the board's external pull-up.
pub const MEASURE_BUTTON_GPIO: i32 = 0;

// ---------------------------------------------------------------------------
// Audible warning
// ---------------------------------------------------------------------------

/// Passive buzzer, driven by LEDC at the warning tone frequency.
pub const BUZZER_GPIO: i32 = 18;
/// LEDC channel reserved for the buzzer.
pub const BUZZER_LEDC_CHANNEL: u32 = 0;
/// LEDC timer resolution (bits) for the buzzer channel.
pub const BUZZER_RESOLUTION_BITS: u32 = 10;
/// 50 % duty at [`BUZZER_RESOLUTION_BITS`].
pub const BUZZER_DUTY_ON: u32 = 1 << (BUZZER_RESOLUTION_BITS - 1);
