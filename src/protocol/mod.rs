//! Serial protocol between the access-control board and the host.
//!
//! ```text
//!   board ──▶ host   start_<payload>_end          (AcMessage)
//!   host  ──▶ board  <command>\n                  (HostCommand)
//! ```
//!
//! Both directions share this module: the board encodes [`AcMessage`]s
//! and parses [`HostCommand`] lines; the host does the reverse.  Every
//! link (host UART, RFID UART, desktop serial port) is a [`Transport`].

pub mod command;
pub mod line;
pub mod message;
pub mod transport;

pub use command::{DoorAction, HostCommand};
pub use line::LineReader;
pub use message::{AcMessage, CalKind};
pub use transport::Transport;

/// Frame opener on the wire.
pub const FRAME_START: &str = "start_";
/// Frame terminator on the wire.
pub const FRAME_END: &str = "_end";
