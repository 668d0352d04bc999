//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to the USB console in production, not
//! to the host UART carrying the AC protocol).

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={}", state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            AppEvent::Fault { state, error: e } => {
                error!("FAULT | in {} | {} | bit=0b{:08b}", state, e, e.fault_bit());
            }
            AppEvent::OccupancyChanged(present) => {
                info!("OCCUPANCY | {}", if *present { "animal" } else { "empty" });
            }
            AppEvent::CalibrationUpdated(cal) => {
                info!(
                    "CAL | offset={:.1} counts | scale={:.3} counts/g",
                    cal.offset, cal.scale
                );
            }
            AppEvent::CommandRejected(e) => {
                warn!("HOST | rejected line: {}", e);
            }
            AppEvent::Reset => {
                info!("RESET | faults cleared");
            }
        }
    }
}
