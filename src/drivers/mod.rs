//! Peripheral helpers, delays, the measure button and worker thread spawning.

pub mod button;
pub mod delay;
pub mod hw_init;
pub mod task_pin;
