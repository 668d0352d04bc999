//! Sensor subsystem: the weighing pipeline and the RFID readers.
//!
//! ```text
//!   Hx711 ──▶ LoadCell (offset/scale) ──▶ DriftCorrector ──▶ FsmContext
//!                                    └──▶ robust_mean (check_mouse burst)
//!   TagReader (Priority 1 / RWD-QT) ─────────────────────────▶ FsmContext
//! ```

pub mod drift;
pub mod filter;
pub mod hx711;
pub mod loadcell;
pub mod rfid;

pub use drift::{DriftCorrector, WeightSample};
pub use loadcell::{LoadCell, RawAdc};
pub use rfid::{TagId, TagReader};
