//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the FSM, safety supervisor, drift corrector and
//! shared context.  It exposes a clean, hardware-agnostic API.  All I/O
//! flows through port traits injected at call sites, making the entire
//! service testable with mock adapters.
//!
//! ```text
//!   WeightPort ──▶ ┌─────────────────────────┐ ──▶ HostLink
//!      TagPort ──▶ │        AppService       │ ──▶ EventSink
//!    ClockPort ──▶ │  Drift · FSM · Safety   │
//!     DoorPort ◀──▶└─────────────────────────┘
//! ```
//!
//! One [`tick`](AppService::tick):
//!
//! 1. Poll the RFID reader (only while `check_mouse` waits for a tag).
//! 2. Weigh, drift-correct, read door switches and echo edges.
//! 3. Run the weighing burst (only when `check_mouse` is weighing).
//! 4. Dwell watchdog.
//! 5. FSM tick, flush its messages, apply door locks, settle.
//! 6. Handle at most one host command.
//!
//! Any `Err` in steps 1–6 goes through [`AppService::fault`].

use core::fmt::Write as _;

use log::{error, info, warn};

use crate::config::{AcConfig, MAX_CHECK_SAMPLES};
use crate::error::{Error, Result, SafetyFault, SensorError};
use crate::fsm::context::{CheckPhase, Door, DoorLocks, FsmContext};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::protocol::message::ErrorText;
use crate::protocol::{AcMessage, CalKind, HostCommand};
use crate::safety::SafetySupervisor;
use crate::sensors::DriftCorrector;
use crate::sensors::filter::{mean, robust_mean};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{ClockPort, ConfigPort, DoorPort, EventSink, HostLink, TagPort, WeightPort};

/// How long a config change may sit unsaved.
const AUTO_SAVE_DELAY_MS: u64 = 5_000;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
    safety: SafetySupervisor,
    drift: DriftCorrector,
    /// Door switches as last sensed; `None` until the first read.
    last_doors_open: Option<[bool; 4]>,
    tick_count: u64,
    config_dirty: bool,
    dirty_since_ms: u64,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the FSM: call [`start`](Self::start) next.
    pub fn new(config: AcConfig) -> Self {
        let safety = SafetySupervisor::new(&config);
        let drift = DriftCorrector::from_config(&config);
        let ctx = FsmContext::new(config);
        let fsm = Fsm::new(build_state_table(), StateId::AllowEntry);

        Self {
            fsm,
            ctx,
            safety,
            drift,
            last_doors_open: None,
            tick_count: 0,
            config_dirty: false,
            dirty_since_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enter `allow_entry`, announce it and drive the doors.
    pub fn start<H>(&mut self, hw: &mut H, link: &mut impl HostLink, sink: &mut impl EventSink)
    where
        H: WeightPort + DoorPort + ClockPort,
    {
        self.ctx.now_ms = hw.now_ms();
        hw.set_calibration(self.ctx.config.calibration);
        self.fsm.start(&mut self.ctx);
        self.flush_outbox(link);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("AppService started in {}", self.fsm.current_state());

        if let Err(e) = self.apply_doors(hw) {
            self.fault(e, hw, link, sink);
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle, then service one host command.
    ///
    /// The `hw` parameter satisfies every hardware port at once: this
    /// avoids overlapping mutable borrows while keeping the port
    /// boundary explicit.
    pub fn tick<H>(&mut self, hw: &mut H, link: &mut impl HostLink, sink: &mut impl EventSink)
    where
        H: WeightPort + DoorPort + TagPort + ClockPort,
    {
        self.tick_count += 1;

        if let Err(e) = self.step(hw, link, sink) {
            self.fault(e, hw, link, sink);
        }

        match link.poll_command() {
            Some(Ok(cmd)) => self.handle_command(AppCommand::from(cmd), hw, link, sink),
            Some(Err(e)) => {
                warn!("Rejected host line: {}", e);
                sink.emit(&AppEvent::CommandRejected(e));
            }
            None => {}
        }
    }

    /// The fault backstop: release every magnet, enter `error_state`
    /// (announced once) and report the error text to the host.
    pub fn fault<H>(&mut self, err: Error, hw: &mut H, link: &mut impl HostLink, sink: &mut impl EventSink)
    where
        H: DoorPort + ClockPort,
    {
        let prev = self.fsm.current_state();
        error!("Fault in {}: {}", prev, err);

        hw.release_all();
        self.ctx.doors = DoorLocks::released();
        self.safety.raise_bits(err.fault_bit());
        self.ctx.fault_flags = self.safety.faults();
        self.ctx.now_ms = hw.now_ms();

        self.fsm.force_transition(StateId::Error, &mut self.ctx);
        self.flush_outbox(link);

        let mut text = ErrorText::new();
        // Overlong texts are cut at the buffer end.
        let _ = write!(text, "{err}");
        link.send(&AcMessage::Error(text));

        sink.emit(&AppEvent::Fault { state: prev, error: err });
        if prev != StateId::Error {
            sink.emit(&AppEvent::StateChanged {
                from: prev,
                to: StateId::Error,
            });
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.  Host commands run in every state,
    /// `error_state` included.
    pub fn handle_command<H>(
        &mut self,
        cmd: AppCommand,
        hw: &mut H,
        link: &mut impl HostLink,
        sink: &mut impl EventSink,
    ) where
        H: WeightPort + DoorPort + TagPort + ClockPort,
    {
        match cmd {
            AppCommand::Host(host) => {
                if let Err(e) = self.handle_host(host, hw, link, sink) {
                    self.fault(e, hw, link, sink);
                }
            }
            AppCommand::Reset => self.reset(hw, link, sink),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Current latched fault bitmask (0 = no faults).
    pub fn fault_flags(&self) -> u8 {
        self.ctx.fault_flags
    }

    /// Door locks as last commanded.
    pub fn doors(&self) -> DoorLocks {
        self.ctx.doors
    }

    /// Latest drift-corrected weight (g).
    pub fn weight_g(&self) -> f32 {
        self.ctx.sensors.weight_g
    }

    pub fn baseline_g(&self) -> f32 {
        self.drift.baseline()
    }

    pub fn animal_present(&self) -> bool {
        self.drift.animal_present()
    }

    /// Clone of the live configuration (for persistence or read-back).
    pub fn current_config(&self) -> AcConfig {
        self.ctx.config.clone()
    }

    // ── Internal ──────────────────────────────────────────────

    fn step<H>(&mut self, hw: &mut H, link: &mut impl HostLink, sink: &mut impl EventSink) -> Result<()>
    where
        H: WeightPort + DoorPort + TagPort + ClockPort,
    {
        let prev_state = self.fsm.current_state();
        self.ctx.now_ms = hw.now_ms();

        if prev_state == StateId::Error {
            // Latched: no sensing, just keep every magnet released.
            self.fsm.tick(&mut self.ctx);
            hw.release_all();
            return Ok(());
        }

        // 1. RFID
        let awaiting_tag = prev_state == StateId::CheckMouse
            && matches!(self.ctx.check, CheckPhase::AwaitingTag { .. });
        if awaiting_tag {
            self.ctx.sensors.tag = hw.read_tag()?;
            if self.ctx.sensors.tag.is_none() {
                hw.delay_ms(self.ctx.config.rfid_poll_interval_ms);
            }
        }

        // 2. Weight, occupancy, door switches
        self.sense(hw, link, sink, prev_state)?;

        // 3. check_mouse burst
        let weighing = prev_state == StateId::CheckMouse
            && self.ctx.check == CheckPhase::Weighing
            && self.ctx.sensors.burst_weight_g.is_none();
        if weighing {
            self.ctx.sensors.burst_weight_g = Some(self.weigh_burst(hw, link)?);
        }

        // 4. Dwell watchdog
        self.ctx.now_ms = hw.now_ms();
        self.safety.evaluate(prev_state, self.ctx.ms_in_state());
        self.ctx.fault_flags = self.safety.faults();
        if self.safety.has_fault(SafetyFault::DwellExceeded) {
            return Err(SafetyFault::DwellExceeded.into());
        }

        // 5. FSM
        self.fsm.tick(&mut self.ctx);
        self.flush_outbox(link);
        self.apply_doors(hw)?;

        let new_state = self.fsm.current_state();
        if new_state != prev_state {
            sink.emit(&AppEvent::StateChanged {
                from: prev_state,
                to: new_state,
            });
            // Let door slams and the animal's footing settle before the
            // next reading.
            hw.delay_ms(self.ctx.config.settle_ms);
        }
        Ok(())
    }

    fn sense<H>(
        &mut self,
        hw: &mut H,
        link: &mut impl HostLink,
        sink: &mut impl EventSink,
        state: StateId,
    ) -> Result<()>
    where
        H: WeightPort + DoorPort + ClockPort,
    {
        let samples = match state {
            StateId::AllowExit | StateId::EnterTrainingChamber => self.ctx.config.fast_weigh_samples,
            _ => self.ctx.config.weigh_samples,
        };
        let raw = hw.weigh(samples)?;
        let was_present = self.drift.animal_present();
        let rfid_read = self.ctx.sensors.tag.is_some();
        let sample = self.drift.sample(hw.now_ms() as f64 / 1000.0, raw, rfid_read);

        let snap = &mut self.ctx.sensors;
        snap.raw_weight_g = sample.raw_g;
        snap.weight_g = sample.corrected_g;
        snap.baseline_g = self.drift.baseline();
        snap.animal_present = self.drift.animal_present();

        if snap.animal_present != was_present {
            sink.emit(&AppEvent::OccupancyChanged(snap.animal_present));
        }

        let mut open = [false; 4];
        for door in Door::ALL {
            open[door.index()] = hw.is_open(door)?;
        }
        if let Some(prev) = self.last_doors_open {
            for door in Door::ALL {
                let now_open = open[door.index()];
                if prev[door.index()] != now_open {
                    link.send(&AcMessage::Door { door, open: now_open });
                }
            }
        }
        self.last_doors_open = Some(open);
        self.ctx.sensors.doors_open = open;
        Ok(())
    }

    /// Up to `check_samples` single reads, each echoed as `temp_w`.
    /// Stops early once the chamber is clearly empty.
    fn weigh_burst<H>(&mut self, hw: &mut H, link: &mut impl HostLink) -> Result<f32>
    where
        H: WeightPort + ClockPort,
    {
        let cfg = &self.ctx.config;
        let n = cfg.check_samples.min(MAX_CHECK_SAMPLES);
        let mut samples: heapless::Vec<f32, { MAX_CHECK_SAMPLES as usize }> = heapless::Vec::new();

        for _ in 0..n {
            let w = self.drift.correct(hw.weigh(cfg.fast_weigh_samples)?);
            link.send(&AcMessage::TempWeight(w));
            hw.delay_ms(cfg.check_sample_interval_ms);
            if samples.push(w).is_err() {
                break;
            }
            if samples.len() > 2 && mean(&samples) < cfg.one_mouse_g {
                break;
            }
        }

        Ok(robust_mean(&samples).unwrap_or(0.0))
    }

    fn handle_host<H>(
        &mut self,
        cmd: HostCommand,
        hw: &mut H,
        link: &mut impl HostLink,
        sink: &mut impl EventSink,
    ) -> Result<()>
    where
        H: WeightPort + DoorPort + TagPort + ClockPort,
    {
        info!("Host command: {}", cmd);
        let cfg = &self.ctx.config;
        match cmd {
            HostCommand::Tare => {
                hw.tare(cfg.tare_samples)?;
                self.drift.reset();
                let w = hw.weigh(cfg.weigh_samples)?;
                link.send(&AcMessage::Calibration(CalKind::Tare, w));
                self.store_calibration(hw, sink);
            }
            HostCommand::Calibrate(known_g) => {
                let accepted = match hw.calibrate(known_g, cfg.tare_samples) {
                    Ok(()) => true,
                    // Nothing (or the wrong thing) on the platform: the old
                    // scale stays and the reply shows what it reads.
                    Err(SensorError::OutOfRange) => {
                        warn!("Calibration with {} g rejected, keeping previous scale", known_g);
                        false
                    }
                    Err(e) => return Err(e.into()),
                };
                let w = hw.weigh(cfg.weigh_samples)?;
                link.send(&AcMessage::Calibration(CalKind::Calibrate, w));
                if accepted {
                    self.store_calibration(hw, sink);
                }
            }
            HostCommand::Weigh => {
                let w = hw.weigh(cfg.weigh_samples)?;
                link.send(&AcMessage::Calibration(CalKind::Weigh, w));
            }
            HostCommand::ReadTag => {
                let deadline = hw.now_ms() + u64::from(cfg.read_tag_timeout_secs) * 1000;
                let poll_ms = cfg.read_tag_poll_ms;
                let tag = loop {
                    if let Some(tag) = hw.read_tag()? {
                        break Some(tag);
                    }
                    if hw.now_ms() >= deadline {
                        break None;
                    }
                    hw.delay_ms(poll_ms);
                };
                link.send(&AcMessage::Rfid(tag));
            }
            HostCommand::Door { door, action } => {
                let locked = !action.is_open();
                hw.set_locked(door, locked)?;
                self.ctx.doors.set(door, locked);
                warn!("Manual override: {:?} {}", door, if locked { "locked" } else { "released" });
                link.send(&AcMessage::Magnet {
                    door,
                    open: action.is_open(),
                });
            }
            HostCommand::Reset => self.reset(hw, link, sink),
        }
        Ok(())
    }

    fn store_calibration(&mut self, hw: &impl WeightPort, sink: &mut impl EventSink) {
        let cal = hw.calibration();
        self.ctx.config.calibration = cal;
        self.mark_config_dirty();
        sink.emit(&AppEvent::CalibrationUpdated(cal));
    }

    fn reset<H>(&mut self, hw: &mut H, link: &mut impl HostLink, sink: &mut impl EventSink)
    where
        H: WeightPort + DoorPort + ClockPort,
    {
        let prev = self.fsm.current_state();
        info!("Reset requested in {}", prev);
        self.safety.clear();
        self.ctx.fault_flags = 0;
        self.ctx.now_ms = hw.now_ms();
        self.last_doors_open = None;

        self.fsm.force_transition(StateId::AllowEntry, &mut self.ctx);
        self.flush_outbox(link);
        sink.emit(&AppEvent::Reset);
        if prev != StateId::AllowEntry {
            sink.emit(&AppEvent::StateChanged {
                from: prev,
                to: StateId::AllowEntry,
            });
        }

        if let Err(e) = self.apply_doors(hw) {
            self.fault(e, hw, link, sink);
        }
    }

    /// Drive every magnet to the commanded pattern.
    fn apply_doors(&self, hw: &mut impl DoorPort) -> Result<()> {
        for door in Door::ALL {
            hw.set_locked(door, self.ctx.doors.is_locked(door))?;
        }
        Ok(())
    }

    fn flush_outbox(&mut self, link: &mut impl HostLink) {
        for msg in self.ctx.outbox.iter() {
            link.send(msg);
        }
        self.ctx.outbox.clear();
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified.
    pub fn mark_config_dirty(&mut self) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_ms = self.ctx.now_ms;
        }
    }

    /// Check if auto-save should trigger (5 seconds after last change).
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        if self.ctx.now_ms.saturating_sub(self.dirty_since_ms) < AUTO_SAVE_DELAY_MS {
            return false;
        }
        match storage.save(&self.ctx.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config auto-saved to NVS");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {}", e);
                false
            }
        }
    }

    /// Force-save if dirty (call before a deliberate restart).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(&self.ctx.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config force-saved");
            }
            Err(e) => {
                warn!("Config force-save failed: {}", e);
            }
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}
