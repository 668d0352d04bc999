//! Empty-chamber baseline tracking.
//!
//! Load cells creep with temperature and bedding debris.  The corrector
//! follows the empty-chamber reading with an exponential moving average
//! and freezes it while an animal is believed present:
//!
//! ```text
//!   alpha    = 1 - exp(-dt / tau)
//!   baseline = baseline + alpha * (raw - baseline)     (empty only)
//!   weight   = raw - baseline
//! ```
//!
//! Occupancy is hysteretic: it is raised by an RFID read or a deviation
//! above `threshold_ratio * expected_weight`, and cleared once the
//! deviation falls below `release_ratio` of that threshold.  Residue that
//! settles between the two thresholds (bedding, droppings) would hold
//! occupancy forever, so a reading that stays below the entry threshold
//! for `release_after` seconds also clears it and the baseline absorbs it.

use crate::config::AcConfig;

/// One corrected reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeightSample {
    pub raw_g: f32,
    pub corrected_g: f32,
    pub timestamp_s: f64,
}

pub struct DriftCorrector {
    baseline: f32,
    tau_s: f32,
    enter_threshold: f32,
    release_threshold: f32,
    animal_present: bool,
    last_timestamp: Option<f64>,
    release_after_s: Option<f64>,
    /// When the deviation last dropped into the hysteresis band.
    in_band_since: Option<f64>,
}

impl DriftCorrector {
    pub fn new(tau_s: f32, threshold_ratio: f32, release_ratio: f32, expected_weight_g: f32) -> Self {
        let enter_threshold = threshold_ratio * expected_weight_g;
        Self {
            baseline: 0.0,
            tau_s,
            enter_threshold,
            release_threshold: enter_threshold * release_ratio,
            animal_present: false,
            last_timestamp: None,
            release_after_s: None,
            in_band_since: None,
        }
    }

    /// Also clear occupancy after `secs` below the entry threshold.
    pub fn with_release_after(mut self, secs: f32) -> Self {
        self.release_after_s = (secs > 0.0).then_some(f64::from(secs));
        self
    }

    pub fn from_config(cfg: &AcConfig) -> Self {
        Self::new(
            cfg.drift_tau_secs,
            cfg.drift_threshold_ratio,
            cfg.drift_release_ratio,
            cfg.expected_animal_weight_g,
        )
        .with_release_after(f32::from(cfg.drift_release_secs))
    }

    /// Feed one measurement.  Returns `(baseline, corrected, animal_present)`.
    pub fn update(&mut self, timestamp_s: f64, measurement: f32, rfid_read: bool) -> (f32, f32, bool) {
        let deviation = (measurement - self.baseline).abs();
        if rfid_read || deviation > self.enter_threshold {
            self.animal_present = true;
            self.in_band_since = None;
        } else if self.animal_present {
            if deviation < self.release_threshold {
                self.animal_present = false;
                self.in_band_since = None;
            } else if let Some(limit) = self.release_after_s {
                let since = *self.in_band_since.get_or_insert(timestamp_s);
                if timestamp_s - since >= limit {
                    self.animal_present = false;
                    self.in_band_since = None;
                }
            }
        }

        let dt = match self.last_timestamp {
            Some(last) => timestamp_s - last,
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp_s);

        if !self.animal_present {
            let alpha = self.alpha(dt);
            self.baseline += alpha * (measurement - self.baseline);
        }

        (self.baseline, measurement - self.baseline, self.animal_present)
    }

    /// Convenience wrapper returning a [`WeightSample`].
    pub fn sample(&mut self, timestamp_s: f64, measurement: f32, rfid_read: bool) -> WeightSample {
        let (_, corrected_g, _) = self.update(timestamp_s, measurement, rfid_read);
        WeightSample {
            raw_g: measurement,
            corrected_g,
            timestamp_s,
        }
    }

    /// Subtract the baseline without learning from the measurement.
    pub fn correct(&self, measurement: f32) -> f32 {
        measurement - self.baseline
    }

    /// Forget the baseline (the load cell was just tared).
    pub fn reset(&mut self) {
        self.baseline = 0.0;
        self.animal_present = false;
        self.last_timestamp = None;
        self.in_band_since = None;
    }

    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    pub fn animal_present(&self) -> bool {
        self.animal_present
    }

    fn alpha(&self, dt: f64) -> f32 {
        if !(dt > 0.0) || !dt.is_finite() {
            return 0.0;
        }
        (1.0 - (-dt / f64::from(self.tau_s)).exp()) as f32
    }
}
