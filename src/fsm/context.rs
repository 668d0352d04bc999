//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the blackboard that state handlers read from and write
//! to: the latest sensor snapshot, the commanded door locks, timing,
//! configuration, latched safety faults and the outbox of host messages.

use heapless::Vec;

use crate::config::AcConfig;
use crate::protocol::message::AcMessage;
use crate::sensors::TagId;

// ---------------------------------------------------------------------------
// Doors
// ---------------------------------------------------------------------------

/// The four doors of the access-control cell, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Door {
    /// Home cage ↔ AC cell.
    EntryOuter = 0,
    /// AC cell ↔ task chamber.
    EntryInner = 1,
    /// Task chamber ↔ AC cell (return path).
    ExitInner = 2,
    /// AC cell ↔ home cage (return path).
    ExitOuter = 3,
}

impl Door {
    pub const ALL: [Door; 4] = [
        Door::EntryOuter,
        Door::EntryInner,
        Door::ExitInner,
        Door::ExitOuter,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }
}

/// Commanded lock state of every door.  `true` = magnet energised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorLocks(pub [bool; 4]);

impl DoorLocks {
    /// Everything de-energised, every door free to swing.
    pub const fn released() -> Self {
        Self([false; 4])
    }

    pub const fn all_locked() -> Self {
        Self([true; 4])
    }

    /// All locked except `open`.
    pub fn only_open(open: Door) -> Self {
        let mut locks = Self::all_locked();
        locks.set(open, false);
        locks
    }

    pub fn set(&mut self, door: Door, locked: bool) {
        self.0[door.index()] = locked;
    }

    pub fn is_locked(&self, door: Door) -> bool {
        self.0[door.index()]
    }
}

impl Default for DoorLocks {
    fn default() -> Self {
        Self::released()
    }
}

// ---------------------------------------------------------------------------
// Sensor snapshot (written by the service before each FSM tick)
// ---------------------------------------------------------------------------

/// A point-in-time snapshot of the AC cell.
#[derive(Debug, Clone, Default)]
pub struct SensorSnapshot {
    /// Drift-corrected weight on the platform (g).
    pub weight_g: f32,
    /// Uncorrected load-cell reading (g).
    pub raw_weight_g: f32,
    /// Current empty-chamber baseline (g).
    pub baseline_g: f32,
    /// Drift corrector's occupancy belief.
    pub animal_present: bool,
    /// Position switches, indexed by [`Door::index`].
    pub doors_open: [bool; 4],
    /// Robust mean of the latest `check_mouse` burst, consumed by the handler.
    pub burst_weight_g: Option<f32>,
    /// Tag read this tick, consumed by the handler.
    pub tag: Option<TagId>,
}

impl SensorSnapshot {
    pub fn door_closed(&self, door: Door) -> bool {
        !self.doors_open[door.index()]
    }
}

// ---------------------------------------------------------------------------
// check_mouse sub-phase
// ---------------------------------------------------------------------------

/// `check_mouse` first weighs a burst, then waits for a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckPhase {
    #[default]
    Weighing,
    AwaitingTag { since_ms: u64 },
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// Messages one tick may queue; a tick emits at most a handful.
pub const OUTBOX_CAPACITY: usize = 16;

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Monotonic milliseconds at the start of this tick.
    pub now_ms: u64,
    /// Milliseconds at which the current state was entered.
    pub state_entered_ms: u64,

    // -- Sensor data --
    pub sensors: SensorSnapshot,

    // -- Actuator outputs --
    /// Door locks to apply after the FSM tick.
    pub doors: DoorLocks,

    // -- Per-state scratch --
    pub check: CheckPhase,

    // -- Configuration --
    pub config: AcConfig,

    // -- Safety --
    /// Latched safety fault bitmask (see `SafetyFault::mask()`).
    pub fault_flags: u8,

    // -- Host messages --
    /// Messages produced by handlers, flushed to the host link by the service.
    pub outbox: Vec<AcMessage, OUTBOX_CAPACITY>,
}

impl FsmContext {
    pub fn new(config: AcConfig) -> Self {
        Self {
            now_ms: 0,
            state_entered_ms: 0,
            sensors: SensorSnapshot::default(),
            doors: DoorLocks::released(),
            check: CheckPhase::Weighing,
            config,
            fault_flags: 0,
            outbox: Vec::new(),
        }
    }

    /// Milliseconds spent in the current state.
    pub fn ms_in_state(&self) -> u64 {
        self.now_ms.saturating_sub(self.state_entered_ms)
    }

    /// Queue a host message.  Drops the message (with a warning) if the
    /// outbox is full rather than stalling the control loop.
    pub fn emit(&mut self, msg: AcMessage) {
        if let Err(msg) = self.outbox.push(msg) {
            log::warn!("FSM outbox full, dropping {:?}", msg);
        }
    }

    pub fn has_faults(&self) -> bool {
        self.fault_flags != 0
    }

    pub fn has_fault(&self, fault: crate::error::SafetyFault) -> bool {
        self.fault_flags & fault.mask() != 0
    }

    pub fn below_one_mouse(&self) -> bool {
        self.sensors.weight_g < self.config.one_mouse_g
    }
}
