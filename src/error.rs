//! Unified error types for the access-control firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's fault handling uniform.  All variants are `Copy` so they
//! can be passed through the safety supervisor and fault handler without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned implausible data.
    Sensor(SensorError),
    /// A door driver pin could not be written.
    Actuator(ActuatorError),
    /// A safety interlock was violated.
    Safety(SafetyFault),
    /// The host link delivered something we could not interpret.
    Protocol(ProtocolError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Safety(e) => write!(f, "safety: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The HX711 never pulled DOUT low within the ready window.
    LoadCellTimeout,
    /// The RFID module never released its CTS line.
    RfidTimeout,
    /// GPIO read returned an error.
    GpioReadFailed,
    /// Serial sub-link read or write failed.
    LinkFailed,
    /// Reading or calibration is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadCellTimeout => write!(f, "load cell does not respond"),
            Self::RfidTimeout => write!(f, "RFID reader does not respond"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
            Self::LinkFailed => write!(f, "sensor link failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Safety faults latch in a bitfield held by the safety supervisor.  Any
/// of them sends the machine to `error_state`, which releases every door.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// A door-boundary state outlived its maximum dwell time.
    DwellExceeded = 0b0000_0001,
    /// A hardware read timed out.
    SensorTimeout = 0b0000_0010,
    /// A door driver could not be commanded.
    DoorDriveFailed = 0b0000_0100,
}

impl SafetyFault {
    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DwellExceeded => write!(f, "state dwell time exceeded"),
            Self::SensorTimeout => write!(f, "sensor timeout"),
            Self::DoorDriveFailed => write!(f, "door drive failed"),
        }
    }
}

impl From<SafetyFault> for Error {
    fn from(e: SafetyFault) -> Self {
        Self::Safety(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Bytes did not form a `start_…_end` frame or a known payload.
    MalformedFrame,
    /// An inbound line matched no known command.
    UnknownCommand,
    /// A command argument could not be parsed (e.g. `calibrate:abc`).
    BadArgument,
    /// A door index outside `0..=3`.
    BadDoorIndex,
    /// A line or frame exceeded the receive buffer.
    Overflow,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedFrame => write!(f, "malformed frame"),
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::BadArgument => write!(f, "bad command argument"),
            Self::BadDoorIndex => write!(f, "door index out of range"),
            Self::Overflow => write!(f, "receive buffer overflow"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl Error {
    /// The safety bit this error latches when it reaches the fault handler.
    pub fn fault_bit(&self) -> u8 {
        match self {
            Self::Safety(f) => f.mask(),
            Self::Sensor(_) => SafetyFault::SensorTimeout.mask(),
            Self::Actuator(_) => SafetyFault::DoorDriveFailed.mask(),
            Self::Protocol(_) | Self::Init(_) | Self::Config(_) => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
