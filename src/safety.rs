//! Safety supervisor.
//!
//! The supervisor runs **every tick before the FSM** and accumulates a
//! fault bitmask that the service copies into `FsmContext.fault_flags`.
//!
//! ## Fault lifecycle
//!
//! 1. A condition triggers a fault (an animal parked on a door boundary
//!    past `max_dwell_secs`, a sensor timeout, a failed door drive).
//! 2. The supervisor sets the corresponding bit.
//! 3. The service forces the FSM into `Error`; `error_enter` releases
//!    every magnet.
//! 4. Faults **latch**.  Silently resuming with the animal's position
//!    unknown is unsafe, so only an explicit reset clears them.

use log::{error, info};

use crate::config::AcConfig;
use crate::error::SafetyFault;
use crate::fsm::StateId;

/// Safety supervisor.
pub struct SafetySupervisor {
    /// Dwell limit for door-boundary states; `None` disables the check.
    max_dwell_ms: Option<u64>,
    /// Latched fault bitmask.
    faults: u8,
}

impl SafetySupervisor {
    pub fn new(config: &AcConfig) -> Self {
        Self {
            max_dwell_ms: config.max_dwell_ms(),
            faults: 0,
        }
    }

    /// Evaluate the dwell watchdog for the current state.
    /// Returns the updated fault bitmask.
    pub fn evaluate(&mut self, state: StateId, ms_in_state: u64) -> u8 {
        // ── Dwell watchdog ────────────────────────────────────────
        if let Some(limit) = self.max_dwell_ms {
            if state.is_door_check() && ms_in_state > limit {
                self.raise(SafetyFault::DwellExceeded);
            }
        }

        self.faults
    }

    /// Latch a fault reported by the service (sensor or actuator error).
    pub fn raise(&mut self, fault: SafetyFault) {
        if self.faults & fault.mask() == 0 {
            error!("SAFETY FAULT SET: {fault}");
        }
        self.faults |= fault.mask();
    }

    /// Latch raw bits (from `Error::fault_bit`).
    pub fn raise_bits(&mut self, bits: u8) {
        for fault in [
            SafetyFault::DwellExceeded,
            SafetyFault::SensorTimeout,
            SafetyFault::DoorDriveFailed,
        ] {
            if bits & fault.mask() != 0 {
                self.raise(fault);
            }
        }
    }

    /// Clear every latched fault (external reset).
    pub fn clear(&mut self) {
        if self.faults != 0 {
            info!("SAFETY FAULTS CLEARED: 0b{:08b}", self.faults);
        }
        self.faults = 0;
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }
}
