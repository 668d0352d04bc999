//! Load cell: raw ADC counts → grams.
//!
//! Wraps any [`RawAdc`] with the offset/scale calibration.  Calibration
//! is plain data ([`Calibration`]) so it can be persisted and restored.

use crate::config::Calibration;
use crate::error::SensorError;

/// A single-conversion ADC source.
pub trait RawAdc {
    /// One signed conversion.  Must time out rather than block forever.
    fn read_raw(&mut self) -> Result<i32, SensorError>;
}

/// Calibrated load cell over an ADC.
pub struct LoadCell<A> {
    adc: A,
    cal: Calibration,
}

impl<A: RawAdc> LoadCell<A> {
    pub fn new(adc: A, cal: Calibration) -> Self {
        Self { adc, cal }
    }

    /// Mean of `times` conversions (at least one).
    pub fn read_average(&mut self, times: u8) -> Result<f32, SensorError> {
        let n = times.max(1);
        let mut sum: i64 = 0;
        for _ in 0..n {
            sum += i64::from(self.adc.read_raw()?);
        }
        Ok(sum as f32 / f32::from(n))
    }

    /// Calibrated weight in grams.
    pub fn weigh(&mut self, times: u8) -> Result<f32, SensorError> {
        let avg = self.read_average(times)?;
        Ok((avg - self.cal.offset) / self.cal.scale)
    }

    /// Make the current load read as zero.
    pub fn tare(&mut self, times: u8) -> Result<(), SensorError> {
        self.cal.offset = self.read_average(times)?;
        Ok(())
    }

    /// Derive the scale from a known weight on the platform.  Rejected
    /// inputs leave the previous calibration untouched.
    pub fn calibrate(&mut self, known_weight_g: f32, times: u8) -> Result<(), SensorError> {
        if !(known_weight_g > 0.0 && known_weight_g.is_finite()) {
            return Err(SensorError::OutOfRange);
        }
        let avg = self.read_average(times)?;
        let scale = (avg - self.cal.offset) / known_weight_g;
        if scale == 0.0 || !scale.is_finite() {
            return Err(SensorError::OutOfRange);
        }
        self.cal.scale = scale;
        Ok(())
    }

    pub fn calibration(&self) -> Calibration {
        self.cal
    }

    pub fn set_calibration(&mut self, cal: Calibration) {
        self.cal = cal;
    }

    /// Direct access to the ADC (power management, gain changes).
    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }
}
