//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                  |
//! |------------|--------------------|------------------------------|
//! | `hardware` | MeasurementCircuit | Relay GPIO19, ADC1 CH6       |
//! | `log_sink` | EventSink          | Serial log output            |
//! | `nvs`      | ConfigPort         | NVS / in-memory store        |
//! | `platform` | PowerPlatform      | Light/deep sleep, LEDC buzzer|
//! | `time`     | LocalClock         | SNTP wall clock, esp_timer   |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod platform;
pub mod time;
