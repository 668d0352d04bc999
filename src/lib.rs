//! Homecage access-control library.
//!
//! The board side (FSM, sensors, door drivers, service) and the host side
//! (frame extraction, routing, sessions) share one protocol module.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module, so everything else runs in host tests.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod host;
pub mod pins;
pub mod protocol;
pub mod safety;
pub mod sensors;
