//! Board → host messages.
//!
//! | Payload                   | Variant                          |
//! |---------------------------|----------------------------------|
//! | `state:<name>`            | `State`                          |
//! | `RFID:<id>` / `RFID:None` | `Rfid`                           |
//! | `weight:<g>`              | `Weight`                         |
//! | `temp_w:<g>`              | `TempWeight`                     |
//! | `temp_w_out:<g>`          | `TempWeightOut`                  |
//! | `calT:` `calC:` `calW:`   | `Calibration`                    |
//! | `door<N>_open|close`      | `Door` (sense edge)              |
//! | `magdoor<N>_open|close`   | `Magnet` (manual override ack)   |
//! | `error:<text>`            | `Error`                          |
//! | `2 mice` … (unframed)     | `Diagnostic`                     |

use core::fmt;

use heapless::String;

use super::{FRAME_END, FRAME_START};
use crate::error::ProtocolError;
use crate::fsm::StateId;
use crate::fsm::context::Door;
use crate::sensors::TagId;

/// Longest error text carried on the wire; longer texts are truncated.
pub const ERROR_TEXT_CAPACITY: usize = 64;

pub type ErrorText = String<ERROR_TEXT_CAPACITY>;

/// Which calibration command a `cal*` reply answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalKind {
    Tare,
    Calibrate,
    Weigh,
}

impl CalKind {
    const fn tag(self) -> &'static str {
        match self {
            Self::Tare => "calT",
            Self::Calibrate => "calC",
            Self::Weigh => "calW",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcMessage {
    State(StateId),
    Rfid(Option<TagId>),
    Weight(f32),
    TempWeight(f32),
    TempWeightOut(f32),
    Calibration(CalKind, f32),
    /// A door switch changed.
    Door { door: Door, open: bool },
    /// Acknowledges a manual `door<N>_<open|close>` command.
    Magnet { door: Door, open: bool },
    Error(ErrorText),
    /// Human-readable occupancy verdict, sent bare.
    Diagnostic(&'static str),
}

impl AcMessage {
    /// Build an `Error` message, truncating `text` on a char boundary.
    pub fn error(text: &str) -> Self {
        let mut out = ErrorText::new();
        for c in text.chars() {
            if out.push(c).is_err() {
                break;
            }
        }
        Self::Error(out)
    }

    /// Everything except diagnostics travels inside `start_…_end`.
    pub const fn is_framed(&self) -> bool {
        !matches!(self, Self::Diagnostic(_))
    }

    /// `cal*` replies are for calibration consumers only.
    pub const fn is_calibration(&self) -> bool {
        matches!(self, Self::Calibration(..))
    }

    /// Write the message exactly as it goes on the wire.
    pub fn write_wire<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        if self.is_framed() {
            write!(out, "{FRAME_START}{self}{FRAME_END}")
        } else {
            write!(out, "{self}")
        }
    }

    /// Decode a frame payload (the text between `start_` and `_end`).
    pub fn parse(payload: &str) -> Result<Self, ProtocolError> {
        let payload = payload.trim();

        if let Some(rest) = payload.strip_prefix("magdoor") {
            return parse_door_suffix(rest).map(|(door, open)| Self::Magnet { door, open });
        }
        if let Some(rest) = payload.strip_prefix("door") {
            return parse_door(rest);
        }

        let (tag, value) = payload
            .split_once(':')
            .ok_or(ProtocolError::MalformedFrame)?;

        match tag {
            "state" => StateId::from_name(value)
                .map(Self::State)
                .ok_or(ProtocolError::MalformedFrame),
            "RFID" => {
                if value == "None" {
                    Ok(Self::Rfid(None))
                } else if value.is_empty() {
                    Err(ProtocolError::MalformedFrame)
                } else {
                    TagId::try_from(value)
                        .map(|id| Self::Rfid(Some(id)))
                        .map_err(|_| ProtocolError::Overflow)
                }
            }
            "weight" => parse_weight(value).map(Self::Weight),
            "temp_w" => parse_weight(value).map(Self::TempWeight),
            "temp_w_out" => parse_weight(value).map(Self::TempWeightOut),
            "calT" => parse_weight(value).map(|w| Self::Calibration(CalKind::Tare, w)),
            "calC" => parse_weight(value).map(|w| Self::Calibration(CalKind::Calibrate, w)),
            "calW" => parse_weight(value).map(|w| Self::Calibration(CalKind::Weigh, w)),
            "error" => Ok(Self::error(value)),
            _ => Err(ProtocolError::MalformedFrame),
        }
    }
}

impl fmt::Display for AcMessage {
    /// The bare payload, without framing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(s) => write!(f, "state:{}", s.name()),
            Self::Rfid(Some(id)) => write!(f, "RFID:{id}"),
            Self::Rfid(None) => f.write_str("RFID:None"),
            Self::Weight(w) => write!(f, "weight:{w:.2}"),
            Self::TempWeight(w) => write!(f, "temp_w:{w:.2}"),
            Self::TempWeightOut(w) => write!(f, "temp_w_out:{w:.2}"),
            Self::Calibration(kind, w) => write!(f, "{}:{w:.2}", kind.tag()),
            Self::Door { door, open } => {
                write!(f, "door{}_{}", door.index(), if *open { "open" } else { "close" })
            }
            Self::Magnet { door, open } => {
                write!(f, "magdoor{}_{}", door.index(), if *open { "open" } else { "close" })
            }
            Self::Error(text) => write!(f, "error:{text}"),
            Self::Diagnostic(text) => f.write_str(text),
        }
    }
}

fn parse_weight(value: &str) -> Result<f32, ProtocolError> {
    value
        .trim()
        .parse::<f32>()
        .map_err(|_| ProtocolError::MalformedFrame)
}

/// `<N>_open` / `<N>_close` (the `door` prefix already stripped).
pub(crate) fn parse_door_suffix(rest: &str) -> Result<(Door, bool), ProtocolError> {
    let (idx, action) = rest.split_once('_').ok_or(ProtocolError::MalformedFrame)?;
    let idx: usize = idx.parse().map_err(|_| ProtocolError::BadDoorIndex)?;
    let door = Door::from_index(idx).ok_or(ProtocolError::BadDoorIndex)?;
    let open = match action {
        "open" => true,
        "close" => false,
        _ => return Err(ProtocolError::MalformedFrame),
    };
    Ok((door, open))
}

fn parse_door(rest: &str) -> Result<AcMessage, ProtocolError> {
    parse_door_suffix(rest).map(|(door, open)| AcMessage::Door { door, open })
}

/// Render a message into a fixed buffer ready for the UART.
pub fn to_wire(msg: &AcMessage) -> Result<String<128>, ProtocolError> {
    let mut out = String::new();
    msg.write_wire(&mut out).map_err(|_| ProtocolError::Overflow)?;
    Ok(out)
}
