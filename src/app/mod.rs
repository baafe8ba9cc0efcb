//! Application core: the power controller, its events and its ports.
//!
//! All interaction with hardware, the clock and persistent storage goes
//! through the **port traits** in [`ports`], so this layer is fully
//! testable without real peripherals. [`control`] is the inbound side:
//! what the reporting and provisioning layers may do to a running node.

pub mod control;
pub mod events;
pub mod ports;
pub mod service;
