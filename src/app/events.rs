//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  They are for operators
//! and logs; the host protocol itself goes through the `HostLink`.

use crate::config::Calibration;
use crate::error::{Error, ProtocolError};
use crate::fsm::StateId;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The application service has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A fault drove the machine into `Error`.
    Fault { state: StateId, error: Error },

    /// The drift corrector changed its occupancy belief.
    OccupancyChanged(bool),

    /// `tare` or `calibrate` produced a new calibration.
    CalibrationUpdated(Calibration),

    /// An inbound host line could not be parsed.
    CommandRejected(ProtocolError),

    /// An external reset cleared the latched faults.
    Reset,
}
