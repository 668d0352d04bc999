//! Actuator drivers and board-level peripherals.

pub mod doors;
pub mod watchdog;
