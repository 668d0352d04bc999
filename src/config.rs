//! Access-control configuration parameters.
//!
//! All tunable parameters for the AC board and the host supervisor.
//! Board values can be overridden via NVS; calibration is written back
//! there after every `tare`/`calibrate` command.

use serde::{Deserialize, Serialize};

/// Load-cell calibration: raw ADC counts → grams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Raw reading of the empty platform.
    pub offset: f32,
    /// Counts per gram.
    pub scale: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            offset: 0.0,
            scale: 3500.0,
        }
    }
}

/// Core access-control configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcConfig {
    // --- Occupancy thresholds ---
    /// Corrected weight (g) above which one animal is present.
    pub one_mouse_g: f32,
    /// Corrected weight (g) above which two or more animals are present.
    pub two_mice_g: f32,

    // --- Load cell ---
    /// Conversions averaged per routine weight reading.
    pub weigh_samples: u8,
    /// Conversions averaged on the hot paths (chamber entry, exit).
    pub fast_weigh_samples: u8,
    /// Conversions averaged by `tare` and `calibrate`.
    pub tare_samples: u8,
    /// Offset and scale of the load cell.
    pub calibration: Calibration,

    // --- check_mouse burst ---
    /// Maximum samples in the occupancy burst.
    pub check_samples: u8,
    /// Spacing between burst samples (ms).
    pub check_sample_interval_ms: u32,

    // --- RFID ---
    /// How long `check_mouse` waits for a tag (seconds).
    pub rfid_timeout_secs: u16,
    /// Spacing between tag polls while waiting (ms).
    pub rfid_poll_interval_ms: u32,
    /// How long the `read_tag` host command polls (seconds).
    pub read_tag_timeout_secs: u16,
    /// Spacing between polls for `read_tag` (ms).
    pub read_tag_poll_ms: u32,

    // --- Drift correction ---
    /// EMA time constant of the empty-chamber baseline (seconds).
    pub drift_tau_secs: f32,
    /// Fraction of the expected animal weight that marks an animal present.
    pub drift_threshold_ratio: f32,
    /// Fraction of the presence threshold below which the chamber is empty again.
    pub drift_release_ratio: f32,
    /// Seconds a reading may sit between the release and presence
    /// thresholds before it counts as residue, not an animal (0 = never).
    pub drift_release_secs: u16,
    /// Expected weight of one animal (g).
    pub expected_animal_weight_g: f32,

    // --- Timing / safety ---
    /// Mechanical settle time after every transition (ms).
    pub settle_ms: u32,
    /// Maximum dwell in a door-boundary state before faulting (seconds, 0 = off).
    pub max_dwell_secs: u32,
    /// Idle time between control loop iterations (ms).
    pub control_loop_interval_ms: u32,
}

impl Default for AcConfig {
    fn default() -> Self {
        Self {
            // Occupancy
            one_mouse_g: 8.0,
            two_mice_g: 100.0,

            // Load cell
            weigh_samples: 3,
            fast_weigh_samples: 1,
            tare_samples: 15,
            calibration: Calibration::default(),

            // Burst
            check_samples: 50,
            check_sample_interval_ms: 10,

            // RFID
            rfid_timeout_secs: 30,
            rfid_poll_interval_ms: 50,
            read_tag_timeout_secs: 10,
            read_tag_poll_ms: 500,

            // Drift
            drift_tau_secs: 20.0,
            drift_threshold_ratio: 0.4,
            drift_release_ratio: 0.5,
            drift_release_secs: 120,
            expected_animal_weight_g: 20.0,

            // Timing
            settle_ms: 500,
            max_dwell_secs: 300,
            control_loop_interval_ms: 5,
        }
    }
}

/// Largest burst the service will buffer.
pub const MAX_CHECK_SAMPLES: u8 = 64;

impl AcConfig {
    /// Range-check every field.  Returns the first offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(self.one_mouse_g > 0.0) {
            return Err("one_mouse_g must be > 0");
        }
        if self.two_mice_g <= self.one_mouse_g {
            return Err("two_mice_g must be > one_mouse_g");
        }
        if self.weigh_samples == 0 || self.fast_weigh_samples == 0 || self.tare_samples == 0 {
            return Err("sample counts must be >= 1");
        }
        if !(self.calibration.scale.is_finite() && self.calibration.scale != 0.0) {
            return Err("calibration.scale must be finite and non-zero");
        }
        if !self.calibration.offset.is_finite() {
            return Err("calibration.offset must be finite");
        }
        if !(3..=MAX_CHECK_SAMPLES).contains(&self.check_samples) {
            return Err("check_samples must be 3–64");
        }
        if self.rfid_timeout_secs == 0 || self.read_tag_timeout_secs == 0 {
            return Err("RFID timeouts must be >= 1 s");
        }
        if !(self.drift_tau_secs > 0.0) {
            return Err("drift_tau_secs must be > 0");
        }
        if !(self.drift_threshold_ratio > 0.0 && self.drift_threshold_ratio <= 1.0) {
            return Err("drift_threshold_ratio must be in (0, 1]");
        }
        if !(self.drift_release_ratio > 0.0 && self.drift_release_ratio <= 1.0) {
            return Err("drift_release_ratio must be in (0, 1]");
        }
        if !(self.expected_animal_weight_g > 0.0) {
            return Err("expected_animal_weight_g must be > 0");
        }
        if self.settle_ms > 10_000 {
            return Err("settle_ms must be <= 10000");
        }
        Ok(())
    }

    /// RFID wait in `check_mouse`, in milliseconds.
    pub fn rfid_timeout_ms(&self) -> u64 {
        u64::from(self.rfid_timeout_secs) * 1000
    }

    /// Dwell limit in milliseconds, `None` when disabled.
    pub fn max_dwell_ms(&self) -> Option<u64> {
        (self.max_dwell_secs > 0).then(|| u64::from(self.max_dwell_secs) * 1000)
    }
}

// ---------------------------------------------------------------------------
// Host supervisor
// ---------------------------------------------------------------------------

/// Host-side supervisor settings, loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// How long a board command may wait for its reply (ms).
    pub reply_timeout_ms: u64,
    /// Poll period of the supervisor loop (ms).
    pub poll_interval_ms: u64,
    /// Bytes the frame extractor may hold without finding a frame.
    pub frame_buffer_limit: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            // read_tag polls for 10 s on the board
            reply_timeout_ms: 12_000,
            poll_interval_ms: 100,
            frame_buffer_limit: 4096,
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl HostConfig {
    /// Load from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading host config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing host config {}", path.display()))?;
        anyhow::ensure!(cfg.frame_buffer_limit >= 64, "frame_buffer_limit must be >= 64");
        Ok(cfg)
    }
}
