//! Mock hardware and link adapters for integration tests.
//!
//! `MockHardware` plays the AC cell: the test sets what is on the
//! platform, which doors are open and which tag is in range, and every
//! magnet command is recorded.  Delays advance a simulated clock.

use std::cell::RefCell;
use std::collections::VecDeque;

use homecage_ac::app::events::AppEvent;
use homecage_ac::app::ports::{
    ClockPort, ConfigError, ConfigPort, DoorPort, EventSink, HostLink, TagPort, WeightPort,
};
use homecage_ac::config::{AcConfig, Calibration};
use homecage_ac::error::{ActuatorError, ProtocolError, SensorError};
use homecage_ac::fsm::context::Door;
use homecage_ac::protocol::message::to_wire;
use homecage_ac::protocol::{AcMessage, HostCommand};
use homecage_ac::sensors::TagId;

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    /// Grams on the platform, before calibration.
    pub weight_g: f32,
    pub doors_open: [bool; 4],
    pub tag: Option<TagId>,
    pub locked: [bool; 4],
    pub lock_calls: Vec<(Door, bool)>,
    pub release_all_calls: u32,
    pub now_ms: u64,
    pub fail_weigh: bool,
    pub fail_door_drive: bool,
    pub tag_polls: u32,
    cal: Calibration,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            weight_g: 0.0,
            doors_open: [false; 4],
            tag: None,
            locked: [false; 4],
            lock_calls: Vec::new(),
            release_all_calls: 0,
            now_ms: 0,
            fail_weigh: false,
            fail_door_drive: false,
            tag_polls: 0,
            cal: Calibration::default(),
        }
    }

    pub fn all_released(&self) -> bool {
        self.locked.iter().all(|l| !l)
    }

    pub fn set_tag(&mut self, id: &str) {
        self.tag = Some(TagId::try_from(id).unwrap());
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightPort for MockHardware {
    fn weigh(&mut self, _samples: u8) -> Result<f32, SensorError> {
        if self.fail_weigh {
            return Err(SensorError::LoadCellTimeout);
        }
        Ok(self.weight_g)
    }

    fn tare(&mut self, _samples: u8) -> Result<(), SensorError> {
        if self.fail_weigh {
            return Err(SensorError::LoadCellTimeout);
        }
        self.cal.offset += self.weight_g * self.cal.scale;
        self.weight_g = 0.0;
        Ok(())
    }

    fn calibrate(&mut self, _known_g: f32, _samples: u8) -> Result<(), SensorError> {
        Ok(())
    }

    fn calibration(&self) -> Calibration {
        self.cal
    }

    fn set_calibration(&mut self, cal: Calibration) {
        self.cal = cal;
    }
}

impl DoorPort for MockHardware {
    fn set_locked(&mut self, door: Door, locked: bool) -> Result<(), ActuatorError> {
        if self.fail_door_drive {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.lock_calls.push((door, locked));
        self.locked[door.index()] = locked;
        Ok(())
    }

    fn is_open(&mut self, door: Door) -> Result<bool, SensorError> {
        Ok(self.doors_open[door.index()])
    }

    fn release_all(&mut self) {
        self.release_all_calls += 1;
        self.locked = [false; 4];
    }
}

impl TagPort for MockHardware {
    fn read_tag(&mut self) -> Result<Option<TagId>, SensorError> {
        self.tag_polls += 1;
        Ok(self.tag.clone())
    }
}

impl ClockPort for MockHardware {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now_ms += u64::from(ms);
    }
}

// ── RecordingLink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingLink {
    pub sent: Vec<AcMessage>,
    pub inbound: VecDeque<Result<HostCommand, ProtocolError>>,
}

#[allow(dead_code)]
impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_command(&mut self, cmd: HostCommand) {
        self.inbound.push_back(Ok(cmd));
    }

    /// Everything sent so far, exactly as it would appear on the UART.
    pub fn wire(&self) -> String {
        self.sent
            .iter()
            .map(|m| to_wire(m).unwrap().as_str().to_owned())
            .collect()
    }

    pub fn states(&self) -> Vec<homecage_ac::fsm::StateId> {
        self.sent
            .iter()
            .filter_map(|m| match m {
                AcMessage::State(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn take(&mut self) -> Vec<AcMessage> {
        std::mem::take(&mut self.sent)
    }
}

impl HostLink for RecordingLink {
    fn send(&mut self, msg: &AcMessage) {
        self.sent.push(msg.clone());
    }

    fn poll_command(&mut self) -> Option<Result<HostCommand, ProtocolError>> {
        self.inbound.pop_front()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MemConfig ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MemConfig {
    pub stored: RefCell<Option<AcConfig>>,
    pub saves: RefCell<u32>,
}

impl ConfigPort for MemConfig {
    fn load(&self) -> Result<AcConfig, ConfigError> {
        Ok(self.stored.borrow().clone().unwrap_or_default())
    }

    fn save(&self, config: &AcConfig) -> Result<(), ConfigError> {
        config.validate().map_err(ConfigError::ValidationFailed)?;
        *self.stored.borrow_mut() = Some(config.clone());
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}
