//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (the host
//! serial link, a host reconnect) that the
//! [`AppService`](super::service::AppService) interprets and acts upon.

use crate::protocol::HostCommand;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// A parsed host line (`tare`, `calibrate:<g>`, `weigh`, `read_tag`,
    /// `door<N>_<open|close>`).
    Host(HostCommand),

    /// Clear latched faults and re-home to `allow_entry`.
    /// The only way out of `error_state`; the host's `reset` line maps here.
    Reset,
}

impl From<HostCommand> for AppCommand {
    fn from(cmd: HostCommand) -> Self {
        match cmd {
            HostCommand::Reset => Self::Reset,
            other => Self::Host(other),
        }
    }
}
