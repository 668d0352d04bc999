//! Integration tests for the AppService → FSM → doors pipeline.
//!
//! A simulated cell drives the service tick by tick: the test puts
//! weight on the platform, opens and closes doors and presents tags, and
//! checks the states, magnet patterns and wire traffic that result.

use super::mock_hw::{MemConfig, MockHardware, RecordingLink, RecordingSink};

use homecage_ac::app::commands::AppCommand;
use homecage_ac::app::events::AppEvent;
use homecage_ac::app::service::AppService;
use homecage_ac::config::AcConfig;
use homecage_ac::fsm::StateId;
use homecage_ac::fsm::context::{Door, DoorLocks};
use homecage_ac::protocol::{AcMessage, DoorAction, HostCommand};

struct Rig {
    app: AppService,
    hw: MockHardware,
    link: RecordingLink,
    sink: RecordingSink,
}

impl Rig {
    fn new() -> Self {
        Self::with_config(AcConfig::default())
    }

    fn with_config(config: AcConfig) -> Self {
        let mut rig = Self {
            app: AppService::new(config),
            hw: MockHardware::new(),
            link: RecordingLink::new(),
            sink: RecordingSink::default(),
        };
        rig.app.start(&mut rig.hw, &mut rig.link, &mut rig.sink);
        rig
    }

    fn tick(&mut self) -> StateId {
        self.app.tick(&mut self.hw, &mut self.link, &mut self.sink);
        self.app.state()
    }

    fn weigh_then_tick(&mut self, grams: f32) -> StateId {
        self.hw.weight_g = grams;
        self.tick()
    }

    /// Walk one animal from an empty cell into `target`.
    fn drive_to(&mut self, target: StateId) {
        // (grams on the platform, tag in range) for each tick of a clean visit
        const VISIT: [(f32, bool); 10] = [
            (20.0, false),
            (20.0, false),
            (20.0, false),
            (20.0, true),
            (0.0, false),
            (0.0, false),
            (20.0, false),
            (20.0, false),
            (0.0, false),
            (0.0, false),
        ];
        for (grams, tag) in VISIT {
            if self.app.state() == target {
                return;
            }
            if tag {
                self.hw.set_tag("900200000123");
            }
            self.weigh_then_tick(grams);
            self.hw.tag = None;
        }
        assert_eq!(self.app.state(), target, "could not reach {target}");
    }
}

fn locks_for(state: StateId) -> DoorLocks {
    match state {
        StateId::AllowEntry => DoorLocks::only_open(Door::EntryOuter),
        StateId::EnterTrainingChamber => DoorLocks::only_open(Door::EntryInner),
        StateId::MouseTraining => DoorLocks::only_open(Door::ExitInner),
        StateId::AllowExit => DoorLocks::only_open(Door::ExitOuter),
        StateId::Error => DoorLocks::released(),
        _ => DoorLocks::all_locked(),
    }
}

// ── Start-up ──────────────────────────────────────────────────

#[test]
fn start_announces_allow_entry_and_opens_entry_door() {
    let rig = Rig::new();
    assert_eq!(rig.app.state(), StateId::AllowEntry);
    assert_eq!(rig.link.wire(), "start_state:allow_entry_end");
    assert_eq!(rig.hw.locked, [false, true, true, true]);
    assert!(matches!(rig.sink.events[0], AppEvent::Started(StateId::AllowEntry)));
}

// ── Entry ─────────────────────────────────────────────────────

#[test]
fn entry_waits_for_outer_door_to_close() {
    let mut rig = Rig::new();
    let mut seen = Vec::new();

    for (i, grams) in [0.0, 0.0, 9.0, 9.0, 9.0].into_iter().enumerate() {
        rig.hw.doors_open[Door::EntryOuter.index()] = i == 3;
        seen.push(rig.weigh_then_tick(grams));
    }

    assert_eq!(
        seen,
        [
            StateId::AllowEntry,
            StateId::AllowEntry,
            StateId::WaitClose,
            StateId::WaitClose,
            StateId::CheckMouse,
        ]
    );
    let wire = rig.link.wire();
    assert!(wire.contains("start_door0_open_end"));
    assert!(wire.contains("start_door0_close_end"));
}

#[test]
fn animal_backing_out_returns_to_allow_entry() {
    let mut rig = Rig::new();
    assert_eq!(rig.weigh_then_tick(20.0), StateId::WaitClose);
    assert_eq!(rig.weigh_then_tick(0.0), StateId::AllowEntry);
    assert_eq!(rig.app.doors(), locks_for(StateId::AllowEntry));
}

#[test]
fn wait_close_locks_every_door() {
    let mut rig = Rig::new();
    rig.hw.doors_open[Door::EntryOuter.index()] = true;
    rig.weigh_then_tick(20.0);
    assert_eq!(rig.app.state(), StateId::WaitClose);
    rig.tick();
    assert_eq!(rig.app.doors(), DoorLocks::all_locked());
    assert_eq!(rig.hw.locked, [true; 4]);
}

// ── Full visit ────────────────────────────────────────────────

#[test]
fn single_animal_full_visit() {
    let mut rig = Rig::new();

    assert_eq!(rig.weigh_then_tick(0.0), StateId::AllowEntry);
    assert_eq!(rig.weigh_then_tick(20.0), StateId::WaitClose);
    assert_eq!(rig.tick(), StateId::CheckMouse);

    // Burst: 1 animal, now waiting for a tag.
    assert_eq!(rig.tick(), StateId::CheckMouse);
    assert_eq!(rig.hw.tag_polls, 0);

    rig.hw.set_tag("900200000123");
    assert_eq!(rig.tick(), StateId::EnterTrainingChamber);
    rig.hw.tag = None;
    assert_eq!(rig.hw.locked, [true, false, true, true]);

    assert_eq!(rig.weigh_then_tick(0.0), StateId::CheckMouseInTraining);
    assert_eq!(rig.tick(), StateId::MouseTraining);
    assert_eq!(rig.hw.locked, [true, true, false, true]);

    assert_eq!(rig.weigh_then_tick(20.0), StateId::CheckMouseInAc);
    assert_eq!(rig.tick(), StateId::AllowExit);
    assert_eq!(rig.hw.locked, [true, true, true, false]);

    assert_eq!(rig.weigh_then_tick(0.0), StateId::CheckExit);
    assert_eq!(rig.tick(), StateId::AllowEntry);
    assert_eq!(rig.hw.locked, [false, true, true, true]);

    assert_eq!(
        rig.link.states(),
        [
            StateId::AllowEntry,
            StateId::WaitClose,
            StateId::CheckMouse,
            StateId::EnterTrainingChamber,
            StateId::CheckMouseInTraining,
            StateId::MouseTraining,
            StateId::CheckMouseInAc,
            StateId::AllowExit,
            StateId::CheckExit,
            StateId::AllowEntry,
        ]
    );

    let wire = rig.link.wire();
    assert!(wire.contains("start_temp_w:20.00_end"));
    assert!(wire.contains("start_weight:20.00_end1 mice"));
    assert!(wire.contains("start_RFID:900200000123_end"));
    assert!(wire.contains("start_temp_w_out:0.00_end"));
}

#[test]
fn burst_samples_are_paced_and_echoed() {
    let mut rig = Rig::new();
    rig.drive_to(StateId::CheckMouse);
    rig.link.take();
    let before = rig.hw.now_ms;

    rig.tick();

    let cfg = AcConfig::default();
    let temp_w = rig
        .link
        .sent
        .iter()
        .filter(|m| matches!(m, AcMessage::TempWeight(_)))
        .count();
    assert_eq!(temp_w, usize::from(cfg.check_samples));
    assert!(
        rig.hw.now_ms - before
            >= u64::from(cfg.check_samples) * u64::from(cfg.check_sample_interval_ms)
    );
}

#[test]
fn two_animals_are_sent_back_out() {
    let mut rig = Rig::new();
    rig.weigh_then_tick(150.0);
    rig.tick();
    assert_eq!(rig.tick(), StateId::AllowExit);

    let wire = rig.link.wire();
    assert!(wire.contains("start_weight:150.00_end2 mice"));
    assert!(!wire.contains("RFID"));
    assert_eq!(rig.hw.locked, [true, true, true, false]);
}

#[test]
fn empty_burst_returns_to_allow_entry() {
    let mut rig = Rig::new();
    rig.weigh_then_tick(20.0);
    rig.weigh_then_tick(9.0);
    assert_eq!(rig.app.state(), StateId::CheckMouse);

    // Animal slipped off before the burst.
    rig.link.take();
    assert_eq!(rig.weigh_then_tick(0.0), StateId::AllowEntry);

    let temp_w = rig
        .link
        .sent
        .iter()
        .filter(|m| matches!(m, AcMessage::TempWeight(_)))
        .count();
    assert_eq!(temp_w, 3, "burst stops once the mean is clearly empty");
    assert!(rig.link.wire().contains("0 mice"));
}

#[test]
fn missing_tag_times_out_to_allow_exit() {
    let mut rig = Rig::new();
    rig.drive_to(StateId::CheckMouse);
    rig.tick();
    rig.link.take();

    let timeout_ms = AcConfig::default().rfid_timeout_ms();
    rig.hw.now_ms += timeout_ms + 1;
    assert_eq!(rig.tick(), StateId::AllowExit);
    assert_eq!(rig.link.sent[0], AcMessage::Rfid(None));
}

#[test]
fn animal_returning_from_chamber_can_go_back_in() {
    let mut rig = Rig::new();
    rig.drive_to(StateId::MouseTraining);

    rig.hw.doors_open[Door::ExitInner.index()] = true;
    assert_eq!(rig.weigh_then_tick(20.0), StateId::CheckMouseInAc);
    assert_eq!(rig.weigh_then_tick(0.0), StateId::CheckMouseInAc);

    // Door closed with the platform empty: the animal went back.
    rig.hw.doors_open[Door::ExitInner.index()] = false;
    assert_eq!(rig.tick(), StateId::MouseTraining);
}

#[test]
fn settle_delay_follows_every_transition() {
    let mut rig = Rig::new();
    let before = rig.hw.now_ms;
    rig.weigh_then_tick(20.0);
    assert!(rig.hw.now_ms - before >= u64::from(AcConfig::default().settle_ms));

    let before = rig.hw.now_ms;
    rig.hw.doors_open[0] = true;
    rig.tick();
    assert_eq!(rig.hw.now_ms, before, "no transition, no settle");
}

// ── Faults ────────────────────────────────────────────────────

#[test]
fn load_cell_fault_opens_every_door_in_every_state() {
    for target in [
        StateId::AllowEntry,
        StateId::WaitClose,
        StateId::CheckMouse,
        StateId::EnterTrainingChamber,
        StateId::CheckMouseInTraining,
        StateId::MouseTraining,
        StateId::CheckMouseInAc,
        StateId::AllowExit,
        StateId::CheckExit,
    ] {
        let mut rig = Rig::new();
        rig.drive_to(target);
        rig.link.take();

        rig.hw.fail_weigh = true;
        assert_eq!(rig.tick(), StateId::Error, "fault from {target}");
        assert!(rig.hw.all_released(), "doors locked after fault in {target}");
        assert_eq!(
            rig.link.wire(),
            "start_state:error_state_end\
             start_error:sensor: load cell does not respond_end",
            "wire after fault in {target}"
        );
        assert!(rig.app.fault_flags() != 0);
    }
}

#[test]
fn error_state_is_latched_and_silent() {
    let mut rig = Rig::new();
    rig.hw.fail_weigh = true;
    rig.tick();
    rig.link.take();

    rig.hw.fail_weigh = false;
    rig.hw.weight_g = 20.0;
    for _ in 0..5 {
        assert_eq!(rig.tick(), StateId::Error);
    }
    assert!(rig.link.sent.is_empty());
    assert!(rig.hw.all_released());
}

#[test]
fn door_drive_failure_faults_and_releases() {
    let mut rig = Rig::new();
    rig.hw.fail_door_drive = true;
    rig.weigh_then_tick(20.0);

    assert_eq!(rig.app.state(), StateId::Error);
    assert!(rig.hw.release_all_calls >= 1);
    assert!(rig.link.wire().contains("start_error:actuator: GPIO write failed_end"));
}

#[test]
fn reset_leaves_error_for_allow_entry() {
    let mut rig = Rig::new();
    rig.drive_to(StateId::MouseTraining);
    rig.hw.fail_weigh = true;
    rig.tick();
    rig.hw.fail_weigh = false;
    rig.link.take();

    rig.app
        .handle_command(AppCommand::Reset, &mut rig.hw, &mut rig.link, &mut rig.sink);

    assert_eq!(rig.app.state(), StateId::AllowEntry);
    assert_eq!(rig.app.fault_flags(), 0);
    assert_eq!(rig.link.wire(), "start_state:allow_entry_end");
    assert_eq!(rig.hw.locked, [false, true, true, true]);
    assert!(rig.sink.events.iter().any(|e| matches!(e, AppEvent::Reset)));
}

#[test]
fn host_reset_line_recovers_from_error_state() {
    let mut rig = Rig::new();
    rig.hw.fail_door_drive = true;
    rig.weigh_then_tick(20.0);
    assert_eq!(rig.app.state(), StateId::Error);
    rig.hw.fail_door_drive = false;
    rig.tick();
    assert_eq!(rig.app.state(), StateId::Error);

    rig.link.take();
    rig.link.push_command(HostCommand::Reset);
    rig.tick();

    assert_eq!(rig.app.state(), StateId::AllowEntry);
    assert_eq!(rig.app.fault_flags(), 0);
    assert!(rig.link.wire().ends_with("start_state:allow_entry_end"));
    assert_eq!(rig.hw.locked, [false, true, true, true]);
}

#[test]
fn dwell_watchdog_faults_a_stuck_door() {
    let mut rig = Rig::new();
    rig.hw.doors_open[Door::EntryOuter.index()] = true;
    rig.weigh_then_tick(20.0);
    assert_eq!(rig.app.state(), StateId::WaitClose);
    rig.link.take();

    rig.hw.now_ms += AcConfig::default().max_dwell_ms().unwrap() + 1;
    assert_eq!(rig.tick(), StateId::Error);
    assert!(rig.link.wire().ends_with("start_error:safety: state dwell time exceeded_end"));
    assert!(rig.hw.all_released());
}

#[test]
fn dwell_watchdog_ignores_training_chamber() {
    let mut rig = Rig::new();
    rig.drive_to(StateId::MouseTraining);
    rig.hw.now_ms += 3_600_000;
    assert_eq!(rig.tick(), StateId::MouseTraining);
}

// ── Host commands ─────────────────────────────────────────────

#[test]
fn tare_replies_and_updates_calibration() {
    let mut rig = Rig::new();
    rig.hw.weight_g = 1.5;
    rig.link.take();
    rig.link.push_command(HostCommand::Tare);
    rig.tick();

    assert!(rig.link.sent.contains(&AcMessage::Calibration(
        homecage_ac::protocol::CalKind::Tare,
        0.0
    )));
    assert!(rig.app.is_config_dirty());
    assert!(rig
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::CalibrationUpdated(_))));
}

#[test]
fn weigh_command_replies_with_cal_w() {
    let mut rig = Rig::new();
    rig.hw.weight_g = 4.0;
    rig.link.take();
    rig.link.push_command(HostCommand::Weigh);
    rig.tick();
    assert!(rig.link.wire().ends_with("start_calW:4.00_end"));
}

#[test]
fn read_tag_command_times_out_with_none() {
    let mut rig = Rig::new();
    rig.link.take();
    let before = rig.hw.now_ms;
    rig.link.push_command(HostCommand::ReadTag);
    rig.tick();

    assert_eq!(rig.link.sent.last(), Some(&AcMessage::Rfid(None)));
    let timeout_ms = u64::from(AcConfig::default().read_tag_timeout_secs) * 1000;
    assert!(rig.hw.now_ms - before >= timeout_ms);
}

#[test]
fn read_tag_command_reports_tag_in_range() {
    let mut rig = Rig::new();
    rig.hw.set_tag("0007A1B2C3");
    rig.link.take();
    rig.link.push_command(HostCommand::ReadTag);
    rig.tick();
    assert!(rig.link.wire().ends_with("start_RFID:0007A1B2C3_end"));
}

#[test]
fn manual_door_override_drives_one_magnet() {
    let mut rig = Rig::new();
    rig.link.take();
    rig.link.push_command(HostCommand::Door {
        door: Door::ExitOuter,
        action: DoorAction::Open,
    });
    rig.tick();

    assert!(!rig.hw.locked[Door::ExitOuter.index()]);
    assert!(rig.link.wire().ends_with("start_magdoor3_open_end"));
    assert_eq!(rig.app.state(), StateId::AllowEntry);
}

#[test]
fn host_commands_run_in_error_state() {
    let mut rig = Rig::new();
    rig.hw.fail_weigh = true;
    rig.tick();
    rig.hw.fail_weigh = false;
    rig.link.take();

    rig.link.push_command(HostCommand::Weigh);
    rig.tick();
    assert_eq!(rig.app.state(), StateId::Error);
    assert!(rig.link.wire().ends_with("start_calW:0.00_end"));
}

#[test]
fn rejected_line_is_reported_to_sink() {
    let mut rig = Rig::new();
    rig.link
        .inbound
        .push_back(Err(homecage_ac::error::ProtocolError::UnknownCommand));
    rig.tick();
    assert!(rig
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::CommandRejected(_))));
    assert_eq!(rig.app.state(), StateId::AllowEntry);
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn calibration_auto_saves_after_quiet_period() {
    let mut rig = Rig::new();
    let store = MemConfig::default();

    rig.link.push_command(HostCommand::Calibrate(20.0));
    rig.tick();
    assert!(rig.app.is_config_dirty());
    assert!(!rig.app.auto_save_if_needed(&store));

    rig.hw.now_ms += 5_000;
    rig.tick();
    assert!(rig.app.auto_save_if_needed(&store));
    assert!(!rig.app.is_config_dirty());
    assert_eq!(*store.saves.borrow(), 1);
    assert!(store.stored.borrow().is_some());
}

#[test]
fn raised_threshold_ignores_light_load() {
    let mut cfg = AcConfig::default();
    cfg.one_mouse_g = 30.0;
    cfg.two_mice_g = 120.0;
    let mut rig = Rig::with_config(cfg);

    // 20 g no longer counts as an animal.
    assert_eq!(rig.weigh_then_tick(20.0), StateId::AllowEntry);
}
