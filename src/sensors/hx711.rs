//! HX711 24-bit load-cell ADC, bit-banged over two GPIOs.
//!
//! ```text
//!   DOUT ──▶ (low = conversion ready)
//!   SCK  ◀── 24 data pulses + 1..3 gain pulses
//! ```
//!
//! Holding SCK high for more than 60 µs powers the chip down, so the
//! pulse loop must not be preempted for long.  Data is MSB first, 24-bit
//! two's complement.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::SensorError;

use super::loadcell::RawAdc;

/// Ready polls before a read gives up (1 ms apart).
pub const READY_POLLS: u32 = 500;

/// Channel and gain for the *next* conversion, encoded as the number of
/// extra SCK pulses after the 24 data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    /// Channel A, gain 128.
    A128 = 1,
    /// Channel B, gain 32.
    B32 = 2,
    /// Channel A, gain 64.
    A64 = 3,
}

/// HX711 driver.
pub struct Hx711<SCK, DOUT, D> {
    sck: SCK,
    dout: DOUT,
    delay: D,
    gain: Gain,
}

impl<SCK, DOUT, D> Hx711<SCK, DOUT, D>
where
    SCK: OutputPin,
    DOUT: InputPin,
    D: DelayNs,
{
    /// Wake the chip and select `gain` with one discarded conversion.
    pub fn new(sck: SCK, dout: DOUT, delay: D, gain: Gain) -> Result<Self, SensorError> {
        let mut hx = Self {
            sck,
            dout,
            delay,
            gain,
        };
        hx.power_up()?;
        // The gain pulses of the first read program the channel.
        hx.read()?;
        Ok(hx)
    }

    /// True when DOUT is low.
    pub fn is_ready(&mut self) -> Result<bool, SensorError> {
        self.dout.is_low().map_err(|_| SensorError::GpioReadFailed)
    }

    /// Clock out one conversion.
    pub fn read(&mut self) -> Result<i32, SensorError> {
        let mut polls = 0;
        while !self.is_ready()? {
            polls += 1;
            if polls >= READY_POLLS {
                return Err(SensorError::LoadCellTimeout);
            }
            self.delay.delay_ms(1);
        }

        let mut raw: u32 = 0;
        for _ in 0..24 {
            raw = (raw << 1) | u32::from(self.pulse()?);
        }
        for _ in 0..self.gain as u8 {
            self.pulse()?;
        }

        Ok(sign_extend_24(raw))
    }

    pub fn set_gain(&mut self, gain: Gain) -> Result<(), SensorError> {
        self.gain = gain;
        self.read().map(|_| ())
    }

    pub fn power_down(&mut self) -> Result<(), SensorError> {
        self.sck.set_low().map_err(|_| SensorError::GpioReadFailed)?;
        self.sck.set_high().map_err(|_| SensorError::GpioReadFailed)?;
        self.delay.delay_us(100);
        Ok(())
    }

    pub fn power_up(&mut self) -> Result<(), SensorError> {
        self.sck.set_low().map_err(|_| SensorError::GpioReadFailed)
    }

    /// One SCK pulse; returns the DOUT level sampled while high.
    fn pulse(&mut self) -> Result<bool, SensorError> {
        self.sck.set_high().map_err(|_| SensorError::GpioReadFailed)?;
        self.delay.delay_us(1);
        let bit = self.dout.is_high().map_err(|_| SensorError::GpioReadFailed)?;
        self.sck.set_low().map_err(|_| SensorError::GpioReadFailed)?;
        self.delay.delay_us(1);
        Ok(bit)
    }
}

impl<SCK, DOUT, D> RawAdc for Hx711<SCK, DOUT, D>
where
    SCK: OutputPin,
    DOUT: InputPin,
    D: DelayNs,
{
    fn read_raw(&mut self) -> Result<i32, SensorError> {
        self.read()
    }
}

/// Interpret the low 24 bits as two's complement.
fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}
