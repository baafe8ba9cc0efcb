//! Hardware adapter: the relay-gated battery divider behind
//! [`MeasurementCircuit`].
//!
//! This is the only place the measurement path touches peripherals. On
//! non-espidf targets the underlying `hw_init` helpers are simulation stubs,
//! so the adapter can be exercised from host tests.

use crate::app::ports::MeasurementCircuit;
use crate::drivers::hw_init;
use crate::error::SensorError;
use crate::pins;

/// Relay on [`pins::MEASURE_RELAY_GPIO`] (active low) feeding ADC1
/// channel [`pins::BATTERY_ADC_CHANNEL`].
pub struct BatteryCircuit {
    relay_gpio: i32,
    adc_channel: u32,
    enabled: bool,
}

impl Default for BatteryCircuit {
    fn default() -> Self {
        Self::new()
    }
}

impl BatteryCircuit {
    pub fn new() -> Self {
        Self {
            relay_gpio: pins::MEASURE_RELAY_GPIO,
            adc_channel: pins::BATTERY_ADC_CHANNEL,
            enabled: false,
        }
    }
}

// ── MeasurementCircuit implementation ─────────────────────────

impl MeasurementCircuit for BatteryCircuit {
    fn enable(&mut self) {
        // Active low: pulling the line down closes the relay.
        hw_init::gpio_write(self.relay_gpio, false);
        self.enabled = true;
    }

    fn disable(&mut self) {
        hw_init::gpio_write(self.relay_gpio, true);
        self.enabled = false;
    }

    fn configure(&mut self) -> Result<(), SensorError> {
        hw_init::adc1_configure(self.adc_channel).map_err(|e| {
            log::warn!("BatteryCircuit: ch{}: {}", self.adc_channel, e);
            SensorError::AdcConfig(e.rc())
        })
    }

    fn read_raw(&mut self) -> Result<u16, SensorError> {
        hw_init::adc1_read(self.adc_channel).map_err(SensorError::ReadFailed)
    }

    fn is_enabled(&self) -> bool {
        // Read the line back rather than trusting `enabled`: the relay is
        // what matters to the divider.
        !hw_init::gpio_level(self.relay_gpio)
    }
}

impl Drop for BatteryCircuit {
    fn drop(&mut self) {
        if self.enabled {
            self.disable();
        }
    }
}
