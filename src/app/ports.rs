//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (load cell, doors, RFID, clock, host link, event sinks,
//! storage) implement these traits.  The [`AppService`](super::service::AppService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! ## Safety notes
//!
//! - **DoorPort::release_all** is infallible: it runs on the fault path
//!   and must keep going past individual pin errors.
//! - **ConfigPort** implementations MUST validate before persisting.

use crate::config::{AcConfig, Calibration};
use crate::error::{ActuatorError, ProtocolError, SensorError};
use crate::fsm::context::Door;
use crate::protocol::{AcMessage, HostCommand};
use crate::sensors::TagId;

// ───────────────────────────────────────────────────────────────
// Weight port (driven adapter: load cell → domain)
// ───────────────────────────────────────────────────────────────

/// Calibrated weighing.  Every call is bounded by the ADC ready timeout.
pub trait WeightPort {
    /// Mean of `samples` conversions, in grams (not drift-corrected).
    fn weigh(&mut self, samples: u8) -> Result<f32, SensorError>;

    /// Zero the load cell on whatever is on the platform now.
    fn tare(&mut self, samples: u8) -> Result<(), SensorError>;

    /// Derive the scale from `known_g` grams on the platform.
    fn calibrate(&mut self, known_g: f32, samples: u8) -> Result<(), SensorError>;

    fn calibration(&self) -> Calibration;

    fn set_calibration(&mut self, cal: Calibration);
}

// ───────────────────────────────────────────────────────────────
// Door port (driven adapter: domain ↔ magnets and door switches)
// ───────────────────────────────────────────────────────────────

pub trait DoorPort {
    /// Energise (`true`) or release (`false`) one magnet.
    fn set_locked(&mut self, door: Door, locked: bool) -> Result<(), ActuatorError>;

    /// Position switch: `true` while the door is physically open.
    fn is_open(&mut self, door: Door) -> Result<bool, SensorError>;

    /// Release every magnet, best-effort.
    fn release_all(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Tag port (driven adapter: RFID reader → domain)
// ───────────────────────────────────────────────────────────────

pub trait TagPort {
    /// Poll once.  `Ok(None)` when no tag is in range.
    fn read_tag(&mut self) -> Result<Option<TagId>, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time and blocking delays.  Tests substitute a simulated
/// clock whose `delay_ms` simply advances `now_ms`.
pub trait ClockPort {
    fn now_ms(&self) -> u64;

    fn delay_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Host link (driving + driven: serial line to the desktop)
// ───────────────────────────────────────────────────────────────

/// The board's end of the host serial link.
pub trait HostLink {
    /// Send one message.  Link failures are logged by the adapter; the
    /// control loop never stalls on the host.
    fn send(&mut self, msg: &AcMessage);

    /// At most one complete inbound command line, if any has arrived.
    fn poll_command(&mut self) -> Option<Result<HostCommand, ProtocolError>>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the board configuration, calibration included.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.  A zero scale or an inverted threshold pair
/// would otherwise survive a reboot.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`AcConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<AcConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &AcConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
