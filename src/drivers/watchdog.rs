//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the board if the control loop stops feeding it.  Every hardware
//! read in the loop is bounded, so a missed feed means the loop itself is
//! wedged; after the reset the door drivers come up released.
//!
//! The timeout is derived from the configuration: the longest legitimate
//! stall is a `read_tag` host command, which polls for
//! `read_tag_timeout_secs`, plus the settle delay of one transition.

use core::cell::Cell;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::{ESP_OK, esp_task_wdt_add, esp_task_wdt_config_t, esp_task_wdt_reconfigure, esp_task_wdt_reset};
use log::{info, warn};

use crate::config::AcConfig;

/// Slack on top of the longest blocking step.
const MARGIN_MS: u32 = 5_000;

pub struct Watchdog {
    timeout_ms: u32,
    armed: bool,
    feeds: Cell<u64>,
}

impl Watchdog {
    /// Subscribe the calling task with a timeout covering every blocking
    /// step `config` allows.
    pub fn for_config(config: &AcConfig) -> Self {
        let read_tag_ms = u32::from(config.read_tag_timeout_secs) * 1000 + config.read_tag_poll_ms;
        Self::new(read_tag_ms + config.settle_ms + MARGIN_MS)
    }

    pub fn new(timeout_ms: u32) -> Self {
        let armed = subscribe(timeout_ms);
        if armed {
            info!("Watchdog: armed, {} ms, panic on trigger", timeout_ms);
        } else {
            warn!("Watchdog: not armed, control loop unsupervised");
        }
        Self {
            timeout_ms,
            armed,
            feeds: Cell::new(0),
        }
    }

    /// Call once per control loop iteration.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        if self.armed {
            // SAFETY: the calling task subscribed in `new`.
            unsafe {
                esp_task_wdt_reset();
            }
        }
        self.feeds.set(self.feeds.get().wrapping_add(1));
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn feeds(&self) -> u64 {
        self.feeds.get()
    }
}

#[cfg(target_os = "espidf")]
fn subscribe(timeout_ms: u32) -> bool {
    let cfg = esp_task_wdt_config_t {
        timeout_ms,
        idle_core_mask: 0,
        trigger_panic: true,
    };
    // SAFETY: plain FFI calls on the current task; `cfg` outlives them.
    unsafe {
        let ret = esp_task_wdt_reconfigure(&cfg);
        if ret != ESP_OK {
            warn!("TWDT reconfigure returned {} (may already be configured)", ret);
        }
        esp_task_wdt_add(core::ptr::null_mut()) == ESP_OK
    }
}

#[cfg(not(target_os = "espidf"))]
fn subscribe(timeout_ms: u32) -> bool {
    info!("Watchdog(sim): {} ms, no-op", timeout_ms);
    false
}
