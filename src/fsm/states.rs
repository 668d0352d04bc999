//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  ALLOW_ENTRY ─[w > 1]─▶ WAIT_CLOSE ─[door0 shut, w ≥ 1]─▶ CHECK_MOUSE
//!      ▲  ▲                   │ [w < 1]                      │ │ │
//!      │  └───────────────────┘        [0 mice]◀─────────────┘ │ │[2 mice / no tag]
//!      │                                                        │ ▼
//!      │                           [tag] ENTER_TRAINING ◀───────┘ ALLOW_EXIT ◀──┐
//!      │                                   │ ▲                    │ [w < 1]     │
//!      │                         [w < 1]   ▼ │ [w ≥ 1]            ▼             │
//!      │                        CHECK_MOUSE_IN_TRAINING        CHECK_EXIT ──────┘
//!      │                                   │ [door1 shut, w < 1]  │ [door3 shut, w < 1]
//!      │                                   ▼                      │
//!      │       MOUSE_TRAINING ◀──[w < 1]── CHECK_MOUSE_IN_AC      │
//!      │            │ [w > 1]              ▲   │ [door2 shut, w ≥ 1] → ALLOW_EXIT
//!      │            └──────────────────────┘                      │
//!      └──────────────────────────────────────────────────────────┘
//!
//!  Any state ──[fault]──▶ ERROR  (left only by an external reset)
//! ```
//!
//! `1` above is the one-animal threshold; `2 mice` is the two-animal one.

use log::{info, warn};

use super::context::{CheckPhase, Door, DoorLocks, FsmContext};
use super::{StateDescriptor, StateId};
use crate::protocol::message::AcMessage;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::AllowEntry,
            on_enter: Some(allow_entry_enter),
            on_exit: Some(allow_entry_exit),
            on_update: allow_entry_update,
        },
        StateDescriptor {
            id: StateId::WaitClose,
            on_enter: None,
            on_exit: Some(wait_close_exit),
            on_update: wait_close_update,
        },
        StateDescriptor {
            id: StateId::CheckMouse,
            on_enter: Some(check_mouse_enter),
            on_exit: None,
            on_update: check_mouse_update,
        },
        StateDescriptor {
            id: StateId::EnterTrainingChamber,
            on_enter: Some(enter_training_enter),
            on_exit: None,
            on_update: enter_training_update,
        },
        StateDescriptor {
            id: StateId::CheckMouseInTraining,
            on_enter: Some(check_in_training_enter),
            on_exit: None,
            on_update: check_in_training_update,
        },
        StateDescriptor {
            id: StateId::MouseTraining,
            on_enter: Some(mouse_training_enter),
            on_exit: Some(mouse_training_exit),
            on_update: mouse_training_update,
        },
        StateDescriptor {
            id: StateId::CheckMouseInAc,
            on_enter: None,
            on_exit: None,
            on_update: check_in_ac_update,
        },
        StateDescriptor {
            id: StateId::AllowExit,
            on_enter: Some(allow_exit_enter),
            on_exit: Some(allow_exit_exit),
            on_update: allow_exit_update,
        },
        StateDescriptor {
            id: StateId::CheckExit,
            on_enter: None,
            on_exit: None,
            on_update: check_exit_update,
        },
        StateDescriptor {
            id: StateId::Error,
            on_enter: Some(error_enter),
            on_exit: Some(error_exit),
            on_update: error_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  ALLOW_ENTRY: home-cage door free, waiting for an animal
// ═══════════════════════════════════════════════════════════════════════════

fn allow_entry_enter(ctx: &mut FsmContext) {
    ctx.doors = DoorLocks::only_open(Door::EntryOuter);
}

fn allow_entry_exit(ctx: &mut FsmContext) {
    ctx.doors.set(Door::EntryOuter, true);
}

fn allow_entry_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.sensors.weight_g > ctx.config.one_mouse_g {
        info!("ALLOW_ENTRY: {:.1} g on platform", ctx.sensors.weight_g);
        return Some(StateId::WaitClose);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  WAIT_CLOSE
// ═══════════════════════════════════════════════════════════════════════════

fn wait_close_exit(ctx: &mut FsmContext) {
    ctx.doors = DoorLocks::all_locked();
}

fn wait_close_update(ctx: &mut FsmContext) -> Option<StateId> {
    if !ctx.sensors.door_closed(Door::EntryOuter) {
        return None;
    }
    if ctx.below_one_mouse() {
        // Door swung shut behind nothing.
        Some(StateId::AllowEntry)
    } else {
        Some(StateId::CheckMouse)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHECK_MOUSE: exactly one animal, and who is it?
// ═══════════════════════════════════════════════════════════════════════════

fn check_mouse_enter(ctx: &mut FsmContext) {
    ctx.check = CheckPhase::Weighing;
    ctx.sensors.burst_weight_g = None;
    ctx.sensors.tag = None;
}

fn check_mouse_update(ctx: &mut FsmContext) -> Option<StateId> {
    match ctx.check {
        CheckPhase::Weighing => {
            let w = ctx.sensors.burst_weight_g.take()?;
            ctx.emit(AcMessage::Weight(w));

            if w > ctx.config.two_mice_g {
                warn!("CHECK_MOUSE: {:.1} g, more than one animal", w);
                ctx.emit(AcMessage::Diagnostic("2 mice"));
                Some(StateId::AllowExit)
            } else if w < ctx.config.one_mouse_g {
                info!("CHECK_MOUSE: {:.1} g, chamber empty", w);
                ctx.emit(AcMessage::Diagnostic("0 mice"));
                Some(StateId::AllowEntry)
            } else {
                info!("CHECK_MOUSE: {:.1} g, one animal, reading tag", w);
                ctx.emit(AcMessage::Diagnostic("1 mice"));
                ctx.check = CheckPhase::AwaitingTag {
                    since_ms: ctx.now_ms,
                };
                None
            }
        }
        CheckPhase::AwaitingTag { since_ms } => {
            if let Some(tag) = ctx.sensors.tag.take() {
                info!("CHECK_MOUSE: tag {}", tag);
                ctx.emit(AcMessage::Rfid(Some(tag)));
                return Some(StateId::EnterTrainingChamber);
            }
            if ctx.now_ms.saturating_sub(since_ms) > ctx.config.rfid_timeout_ms() {
                warn!("CHECK_MOUSE: no tag after {} s", ctx.config.rfid_timeout_secs);
                ctx.emit(AcMessage::Rfid(None));
                return Some(StateId::AllowExit);
            }
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  ENTER_TRAINING_CHAMBER
// ═══════════════════════════════════════════════════════════════════════════

fn enter_training_enter(ctx: &mut FsmContext) {
    ctx.doors = DoorLocks::only_open(Door::EntryInner);
}

fn enter_training_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.below_one_mouse().then_some(StateId::CheckMouseInTraining)
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHECK_MOUSE_IN_TRAINING
// ═══════════════════════════════════════════════════════════════════════════

fn check_in_training_enter(ctx: &mut FsmContext) {
    ctx.doors.set(Door::EntryInner, true);
}

fn check_in_training_update(ctx: &mut FsmContext) -> Option<StateId> {
    if !ctx.below_one_mouse() {
        return Some(StateId::EnterTrainingChamber);
    }
    ctx.sensors
        .door_closed(Door::EntryInner)
        .then_some(StateId::MouseTraining)
}

// ═══════════════════════════════════════════════════════════════════════════
//  MOUSE_TRAINING: the task controller has the animal
// ═══════════════════════════════════════════════════════════════════════════

fn mouse_training_enter(ctx: &mut FsmContext) {
    ctx.doors = DoorLocks::only_open(Door::ExitInner);
}

fn mouse_training_exit(ctx: &mut FsmContext) {
    ctx.doors.set(Door::ExitInner, true);
}

fn mouse_training_update(ctx: &mut FsmContext) -> Option<StateId> {
    (ctx.sensors.weight_g > ctx.config.one_mouse_g).then_some(StateId::CheckMouseInAc)
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHECK_MOUSE_IN_AC
// ═══════════════════════════════════════════════════════════════════════════

fn check_in_ac_update(ctx: &mut FsmContext) -> Option<StateId> {
    if !ctx.sensors.door_closed(Door::ExitInner) {
        return None;
    }
    if ctx.below_one_mouse() {
        // Opened and closed the door without coming through.
        Some(StateId::MouseTraining)
    } else {
        Some(StateId::AllowExit)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  ALLOW_EXIT
// ═══════════════════════════════════════════════════════════════════════════

fn allow_exit_enter(ctx: &mut FsmContext) {
    ctx.doors = DoorLocks::only_open(Door::ExitOuter);
}

fn allow_exit_exit(ctx: &mut FsmContext) {
    ctx.doors.set(Door::ExitOuter, true);
}

fn allow_exit_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.emit(AcMessage::TempWeightOut(ctx.sensors.weight_g));
    ctx.below_one_mouse().then_some(StateId::CheckExit)
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHECK_EXIT
// ═══════════════════════════════════════════════════════════════════════════

fn check_exit_update(ctx: &mut FsmContext) -> Option<StateId> {
    if !ctx.sensors.door_closed(Door::ExitOuter) {
        return None;
    }
    if ctx.below_one_mouse() {
        info!("CHECK_EXIT: cycle complete");
        Some(StateId::AllowEntry)
    } else {
        Some(StateId::AllowExit)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  ERROR: every magnet released, latched until reset
// ═══════════════════════════════════════════════════════════════════════════

fn error_enter(ctx: &mut FsmContext) {
    ctx.doors = DoorLocks::released();
    warn!(
        "ERROR: all doors released, fault_flags=0b{:08b}",
        ctx.fault_flags
    );
}

fn error_exit(ctx: &mut FsmContext) {
    info!("ERROR: reset, resuming normal operation");
    ctx.fault_flags = 0;
}

fn error_update(ctx: &mut FsmContext) -> Option<StateId> {
    // Keep re-asserting fail-open in case a manual override locked a door.
    ctx.doors = DoorLocks::released();
    None
}
