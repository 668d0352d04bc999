//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                       │
//! │  ┌─────────────────────────┬──────────┬─────────┬──────────────┐  │
//! │  │ StateId                 │ on_enter │ on_exit │ on_update    │  │
//! │  ├─────────────────────────┼──────────┼─────────┼──────────────┤  │
//! │  │ AllowEntry              │ fn(ctx)  │ fn(ctx) │ fn -> Option │  │
//! │  │ WaitClose               │   …      │   …     │   …          │  │
//! │  │ …                       │          │         │              │  │
//! │  │ Error                   │ fn(ctx)  │  None   │ fn -> None   │  │
//! │  └─────────────────────────┴──────────┴─────────┴──────────────┘  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  Every entry queues exactly one `state:<name>`
//! message in the context outbox.

pub mod context;
pub mod states;

use context::FsmContext;
use log::info;

use crate::protocol::message::AcMessage;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all access-control states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    AllowEntry = 0,
    WaitClose = 1,
    CheckMouse = 2,
    EnterTrainingChamber = 3,
    CheckMouseInTraining = 4,
    MouseTraining = 5,
    CheckMouseInAc = 6,
    AllowExit = 7,
    CheckExit = 8,
    Error = 9,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 10;

    pub const ALL: [StateId; Self::COUNT] = [
        Self::AllowEntry,
        Self::WaitClose,
        Self::CheckMouse,
        Self::EnterTrainingChamber,
        Self::CheckMouseInTraining,
        Self::MouseTraining,
        Self::CheckMouseInAc,
        Self::AllowExit,
        Self::CheckExit,
        Self::Error,
    ];

    /// Convert an index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `Error` in release.
    pub fn from_index(idx: usize) -> Self {
        match Self::ALL.get(idx) {
            Some(id) => *id,
            None => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Error
            }
        }
    }

    /// Name used on the wire (`state:<name>`).
    pub const fn name(self) -> &'static str {
        match self {
            Self::AllowEntry => "allow_entry",
            Self::WaitClose => "wait_close",
            Self::CheckMouse => "check_mouse",
            Self::EnterTrainingChamber => "enter_training_chamber",
            Self::CheckMouseInTraining => "check_mouse_in_training",
            Self::MouseTraining => "mouse_training",
            Self::CheckMouseInAc => "check_mouse_in_ac",
            Self::AllowExit => "allow_exit",
            Self::CheckExit => "check_exit",
            Self::Error => "error_state",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.name() == name)
    }

    /// States that wait on a door switch and are covered by the dwell watchdog.
    pub const fn is_door_check(self) -> bool {
        matches!(
            self,
            Self::WaitClose | Self::CheckMouseInTraining | Self::CheckMouseInAc | Self::CheckExit
        )
    }
}

impl core::fmt::Display for StateId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Monotonically increasing tick counter.
    tick_count: u64,
    /// Number of transitions taken since start.
    transitions: u64,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id as usize == i),
            "state table out of order"
        );
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        let id = self.current_state();
        info!("FSM starting in state: {}", id);
        ctx.state_entered_ms = ctx.now_ms;
        ctx.emit(AcMessage::State(id));
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    pub fn tick(&mut self, ctx: &mut FsmContext) {
        self.tick_count += 1;

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Force an immediate transition (fault handler → `Error`, reset →
    /// `AllowEntry`).  A no-op if already in `next`.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut FsmContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].id, self.table[next_idx].id
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions += 1;
        ctx.state_entered_ms = ctx.now_ms;
        ctx.emit(AcMessage::State(next_id));

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
