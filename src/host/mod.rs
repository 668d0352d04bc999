//! Desktop side of the AC link.
//!
//! ```text
//!   Transport ──▶ AccessControlBoard (FrameExtractor, reply slot)
//!                     │ payloads
//!                     ▼
//!               MessageRouter ──▶ RunLog / PrintConsumer / TaskController
//!                     │
//!                     ▼ SetupEvent (bounded channel)
//!               Supervisor (one entry per setup, nothing shared)
//! ```

pub mod board;
pub mod extractor;
pub mod ports;
pub mod router;
pub mod session;
pub mod store;
pub mod supervisor;

use core::fmt;

use crate::error::ProtocolError;

#[derive(Debug, Clone, PartialEq)]
pub enum HostError {
    /// A visit reached the training chamber with a tag the store does not know.
    UnknownRfid(String),
    /// A command is still waiting for its reply.
    Busy,
    Protocol(ProtocolError),
    /// The serial link or a collaborator failed.
    Link(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRfid(id) => write!(f, "no animal with RFID {id} in the experiment store"),
            Self::Busy => write!(f, "board busy: previous command still awaiting reply"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Link(msg) => write!(f, "link: {msg}"),
        }
    }
}

impl std::error::Error for HostError {}

impl From<ProtocolError> for HostError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}
