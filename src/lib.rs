//! Powerwatch firmware library.
//!
//! Battery monitoring and power-state control for a battery-powered
//! switch node. Exposes the pure-logic modules for integration testing;
//! all ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod power;
pub mod scheduler;
pub mod state;
pub mod trigger;
pub mod window;

pub mod adapters;
pub mod drivers;
pub mod sensors;
