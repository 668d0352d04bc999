//! Host → board commands: plain ASCII, one per line.
//!
//! `tare`, `calibrate:<grams>`, `weigh`, `read_tag`, `door<N>_open`,
//! `door<N>_close`, `reset`.  Lines may end in `\n` or `\r\n`.
//!
//! `reset` is what the host sends when it (re)connects: it clears a
//! latched fault and re-homes the board to `allow_entry`.

use core::fmt;

use super::message::{AcMessage, CalKind, parse_door_suffix};
use crate::error::ProtocolError;
use crate::fsm::StateId;
use crate::fsm::context::Door;

/// Manual door override.  `Open` releases the magnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorAction {
    Open,
    Close,
}

impl DoorAction {
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostCommand {
    Tare,
    Calibrate(f32),
    Weigh,
    ReadTag,
    Door { door: Door, action: DoorAction },
    Reset,
}

impl HostCommand {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']).trim();
        match line {
            "tare" => return Ok(Self::Tare),
            "weigh" => return Ok(Self::Weigh),
            "read_tag" => return Ok(Self::ReadTag),
            "reset" => return Ok(Self::Reset),
            _ => {}
        }

        if let Some(arg) = line.strip_prefix("calibrate:") {
            let grams: f32 = arg.trim().parse().map_err(|_| ProtocolError::BadArgument)?;
            if !grams.is_finite() || grams <= 0.0 {
                return Err(ProtocolError::BadArgument);
            }
            return Ok(Self::Calibrate(grams));
        }

        if let Some(rest) = line.strip_prefix("door") {
            let (door, open) = parse_door_suffix(rest).map_err(|e| match e {
                ProtocolError::MalformedFrame => ProtocolError::UnknownCommand,
                other => other,
            })?;
            let action = if open { DoorAction::Open } else { DoorAction::Close };
            return Ok(Self::Door { door, action });
        }

        Err(ProtocolError::UnknownCommand)
    }

    /// Whether `msg` is the board's reply to this command.
    pub fn is_reply(&self, msg: &AcMessage) -> bool {
        match (self, msg) {
            (Self::Tare, AcMessage::Calibration(CalKind::Tare, _)) => true,
            (Self::Calibrate(_), AcMessage::Calibration(CalKind::Calibrate, _)) => true,
            (Self::Weigh, AcMessage::Calibration(CalKind::Weigh, _)) => true,
            (Self::ReadTag, AcMessage::Rfid(_)) => true,
            (Self::Door { door, action }, AcMessage::Magnet { door: d, open }) => {
                door == d && action.is_open() == *open
            }
            (Self::Reset, AcMessage::State(StateId::AllowEntry)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for HostCommand {
    /// The command line without its terminator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tare => f.write_str("tare"),
            Self::Calibrate(g) => write!(f, "calibrate:{g}"),
            Self::Weigh => f.write_str("weigh"),
            Self::ReadTag => f.write_str("read_tag"),
            Self::Reset => f.write_str("reset"),
            Self::Door { door, action } => write!(
                f,
                "door{}_{}",
                door.index(),
                if action.is_open() { "open" } else { "close" }
            ),
        }
    }
}
