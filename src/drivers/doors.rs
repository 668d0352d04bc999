//! Four-door electromagnetic lock driver.
//!
//! Each magnet hangs between a high-side and a low-side driver input:
//!
//! | high | low | coil             |
//! |------|-----|------------------|
//! | 1    | 0   | energised (lock) |
//! | 0    | 0   | released         |
//! | 1    | 1   | shoot-through    |
//!
//! Both pins are only ever written through [`DoorBank::drive`], which
//! drops the inactive side before raising the active one, so the third
//! row is unreachable.  Door switches read HIGH while the door is open.

use embedded_hal::digital::{InputPin, OutputPin};
use log::{info, warn};

use crate::error::{ActuatorError, SensorError};
use crate::fsm::context::Door;

pub struct DoorBank<O, I> {
    high: [O; 4],
    low: [O; 4],
    enable: [O; 2],
    sense: [I; 4],
    locked: [bool; 4],
}

impl<O: OutputPin, I: InputPin> DoorBank<O, I> {
    /// Take ownership of the pins, release every magnet, then enable the
    /// bridge drivers.
    pub fn new(high: [O; 4], low: [O; 4], enable: [O; 2], sense: [I; 4]) -> Result<Self, ActuatorError> {
        let mut bank = Self {
            high,
            low,
            enable,
            sense,
            locked: [true; 4],
        };
        for door in Door::ALL {
            bank.drive(door, false)?;
        }
        for pin in &mut bank.enable {
            pin.set_high().map_err(|_| ActuatorError::GpioWriteFailed)?;
        }
        info!("Doors: drivers enabled, all magnets released");
        Ok(bank)
    }

    pub fn set_locked(&mut self, door: Door, locked: bool) -> Result<(), ActuatorError> {
        if self.locked[door.index()] == locked {
            return Ok(());
        }
        self.drive(door, locked)
    }

    /// Position switch: `true` while the door is open.
    pub fn is_open(&mut self, door: Door) -> Result<bool, SensorError> {
        self.sense[door.index()]
            .is_high()
            .map_err(|_| SensorError::GpioReadFailed)
    }

    /// Release every magnet.  Keeps going past pin errors so one bad
    /// output cannot hold another door shut.
    pub fn release_all(&mut self) {
        for door in Door::ALL {
            if let Err(e) = self.drive(door, false) {
                warn!("Doors: failed to release {:?}: {}", door, e);
            }
        }
    }

    pub fn is_locked(&self, door: Door) -> bool {
        self.locked[door.index()]
    }

    /// Disable the bridge drivers (power-down path).
    pub fn disable(&mut self) {
        self.release_all();
        for pin in &mut self.enable {
            let _ = pin.set_low();
        }
    }

    /// The only place that touches the magnet pins.
    fn drive(&mut self, door: Door, locked: bool) -> Result<(), ActuatorError> {
        let i = door.index();
        let (off, on) = (&mut self.low[i], &mut self.high[i]);
        if locked {
            off.set_low().map_err(|_| ActuatorError::GpioWriteFailed)?;
            on.set_high().map_err(|_| ActuatorError::GpioWriteFailed)?;
        } else {
            on.set_low().map_err(|_| ActuatorError::GpioWriteFailed)?;
            off.set_low().map_err(|_| ActuatorError::GpioWriteFailed)?;
        }
        self.locked[i] = locked;
        Ok(())
    }
}
