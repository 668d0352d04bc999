//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the load cell, the door bank, the RFID reader and the clock,
//! exposing them through [`WeightPort`], [`DoorPort`], [`TagPort`] and
//! [`ClockPort`].  Every driver is generic over `embedded-hal` traits, so
//! the same adapter runs on ESP-IDF pins and on test doubles.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::{ClockPort, DoorPort, TagPort, WeightPort};
use crate::config::Calibration;
use crate::drivers::doors::DoorBank;
use crate::error::{ActuatorError, SensorError};
use crate::fsm::context::Door;
use crate::sensors::{LoadCell, RawAdc, TagId, TagReader};

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<A, O, I, R, K> {
    loadcell: LoadCell<A>,
    doors: DoorBank<O, I>,
    reader: R,
    clock: K,
}

impl<A, O, I, R, K> HardwareAdapter<A, O, I, R, K>
where
    A: RawAdc,
    O: OutputPin,
    I: InputPin,
    R: TagReader,
    K: ClockPort,
{
    pub fn new(loadcell: LoadCell<A>, doors: DoorBank<O, I>, reader: R, clock: K) -> Self {
        Self {
            loadcell,
            doors,
            reader,
            clock,
        }
    }

    pub fn loadcell_mut(&mut self) -> &mut LoadCell<A> {
        &mut self.loadcell
    }
}

// ── WeightPort implementation ─────────────────────────────────

impl<A: RawAdc, O, I, R, K> WeightPort for HardwareAdapter<A, O, I, R, K> {
    fn weigh(&mut self, samples: u8) -> Result<f32, SensorError> {
        self.loadcell.weigh(samples)
    }

    fn tare(&mut self, samples: u8) -> Result<(), SensorError> {
        self.loadcell.tare(samples)
    }

    fn calibrate(&mut self, known_g: f32, samples: u8) -> Result<(), SensorError> {
        self.loadcell.calibrate(known_g, samples)
    }

    fn calibration(&self) -> Calibration {
        self.loadcell.calibration()
    }

    fn set_calibration(&mut self, cal: Calibration) {
        self.loadcell.set_calibration(cal);
    }
}

// ── DoorPort implementation ───────────────────────────────────

impl<A, O: OutputPin, I: InputPin, R, K> DoorPort for HardwareAdapter<A, O, I, R, K> {
    fn set_locked(&mut self, door: Door, locked: bool) -> Result<(), ActuatorError> {
        self.doors.set_locked(door, locked)
    }

    fn is_open(&mut self, door: Door) -> Result<bool, SensorError> {
        self.doors.is_open(door)
    }

    fn release_all(&mut self) {
        self.doors.release_all();
    }
}

// ── TagPort implementation ────────────────────────────────────

impl<A, O, I, R: TagReader, K> TagPort for HardwareAdapter<A, O, I, R, K> {
    fn read_tag(&mut self) -> Result<Option<TagId>, SensorError> {
        self.reader.read_tag()
    }
}

// ── ClockPort implementation ──────────────────────────────────

impl<A, O, I, R, K: ClockPort> ClockPort for HardwareAdapter<A, O, I, R, K> {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.delay_ms(ms);
    }
}
