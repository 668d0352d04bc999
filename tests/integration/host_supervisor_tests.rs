//! End-to-end tests: firmware service ↔ byte pipe ↔ host supervisor.
//!
//! The board side runs the real `AppService` behind a `SerialHostLink`;
//! the host side runs the real `Supervisor`.  Both ends share an
//! in-memory pipe, so every message crosses the actual wire format.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::mock_hw::{MockHardware, RecordingSink};

use homecage_ac::adapters::serial_link::SerialHostLink;
use homecage_ac::app::service::AppService;
use homecage_ac::config::{AcConfig, HostConfig};
use homecage_ac::fsm::StateId;
use homecage_ac::host::HostError;
use homecage_ac::host::ports::{PrintConsumer, Recipient, RunLog, TaskController};
use homecage_ac::host::router::SetupEvent;
use homecage_ac::host::store::{AnimalRecord, JsonExperimentStore};
use homecage_ac::host::supervisor::Supervisor;
use homecage_ac::protocol::{HostCommand, Transport};

// ── Pipe ──────────────────────────────────────────────────────

type Bytes = Rc<RefCell<VecDeque<u8>>>;

/// One end of a full-duplex in-memory serial line.
struct PipeEnd {
    rx: Bytes,
    tx: Bytes,
}

fn pipe() -> (PipeEnd, PipeEnd) {
    let a: Bytes = Rc::default();
    let b: Bytes = Rc::default();
    (
        PipeEnd {
            rx: a.clone(),
            tx: b.clone(),
        },
        PipeEnd { rx: b, tx: a },
    )
}

impl Transport for PipeEnd {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let mut rx = self.rx.borrow_mut();
        let n = buf.len().min(rx.len());
        for (slot, byte) in buf.iter_mut().zip(rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        self.tx.borrow_mut().extend(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn available(&self) -> bool {
        !self.rx.borrow().is_empty()
    }
}

// ── Recording collaborators ───────────────────────────────────

#[derive(Clone, Default)]
struct SharedLog(Rc<RefCell<Vec<String>>>);

impl RunLog for SharedLog {
    fn append(&mut self, line: &str, timestamp_ms: u64) {
        self.0.borrow_mut().push(format!("{line}_{timestamp_ms}"));
    }
}

#[derive(Clone, Default)]
struct SharedPrinter(Rc<RefCell<Vec<(Recipient, String)>>>);

impl PrintConsumer for SharedPrinter {
    fn print(&mut self, recipient: Recipient, text: &str) {
        self.0.borrow_mut().push((recipient, text.to_owned()));
    }
}

#[derive(Clone, Default)]
struct SharedTasks {
    running: Rc<RefCell<Option<String>>>,
    history: Rc<RefCell<Vec<String>>>,
}

impl TaskController for SharedTasks {
    fn start_task(&mut self, task: &str) -> Result<(), HostError> {
        *self.running.borrow_mut() = Some(task.to_owned());
        self.history.borrow_mut().push(format!("start {task}"));
        Ok(())
    }

    fn stop_task(&mut self) -> Result<(), HostError> {
        if let Some(task) = self.running.borrow_mut().take() {
            self.history.borrow_mut().push(format!("stop {task}"));
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.borrow().is_some()
    }
}

// ── Fixture ───────────────────────────────────────────────────

const SETUP: &str = "setup1";
const TAG: &str = "900200000123";

struct Cell {
    app: AppService,
    hw: MockHardware,
    link: SerialHostLink<PipeEnd>,
    sink: RecordingSink,
}

struct Lab {
    cell: Cell,
    sup: Supervisor<PipeEnd>,
    store: JsonExperimentStore,
    log: SharedLog,
    printer: SharedPrinter,
    tasks: SharedTasks,
    events: Vec<SetupEvent>,
    errors: Vec<HostError>,
}

impl Lab {
    fn new(assigned: bool) -> Self {
        let (board_end, host_end) = pipe();
        let mut cell = Cell {
            app: AppService::new(AcConfig::default()),
            hw: MockHardware::new(),
            link: SerialHostLink::new(board_end),
            sink: RecordingSink::default(),
        };
        cell.app.start(&mut cell.hw, &mut cell.link, &mut cell.sink);

        let log = SharedLog::default();
        let printer = SharedPrinter::default();
        let tasks = SharedTasks::default();
        let mut sup = Supervisor::new(HostConfig::default());
        sup.add_setup(
            SETUP,
            host_end,
            Box::new(log.clone()),
            Box::new(printer.clone()),
            Box::new(tasks.clone()),
        )
        .unwrap();

        let store = JsonExperimentStore::new(vec![AnimalRecord {
            animal_id: "m01".into(),
            rfid: TAG.into(),
            assigned_task: "lever_press".into(),
            is_assigned: assigned,
        }]);

        let mut lab = Self {
            cell,
            sup,
            store,
            log,
            printer,
            tasks,
            events: Vec::new(),
            errors: Vec::new(),
        };
        lab.poll();
        lab
    }

    fn poll(&mut self) {
        let out = self.sup.poll(&self.store, self.cell.hw.now_ms);
        for (id, ev) in out.events {
            assert_eq!(id, SETUP);
            self.events.push(ev);
        }
        for (id, err) in out.errors {
            assert_eq!(id, SETUP);
            self.errors.push(err);
        }
    }

    /// One board tick followed by one supervisor poll.
    fn step(&mut self, grams: f32) -> StateId {
        let c = &mut self.cell;
        c.hw.weight_g = grams;
        c.app.tick(&mut c.hw, &mut c.link, &mut c.sink);
        self.poll();
        self.cell.app.state()
    }

    /// Walk the animal from an empty cell into the training chamber.
    fn enter_training(&mut self) {
        self.step(20.0);
        self.step(20.0);
        self.step(20.0);
        self.cell.hw.set_tag(TAG);
        self.step(20.0);
        self.cell.hw.tag = None;
        self.step(0.0);
        assert_eq!(self.step(0.0), StateId::MouseTraining);
    }

    fn logged(&self) -> Vec<String> {
        self.log.0.borrow().clone()
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[test]
fn full_visit_runs_the_assigned_task() {
    let mut lab = Lab::new(true);
    lab.enter_training();

    assert_eq!(*lab.tasks.running.borrow(), Some("lever_press".to_owned()));
    assert!(lab.events.contains(&SetupEvent::TaskStarted {
        rfid: TAG.into(),
        task: "lever_press".into(),
    }));

    lab.step(20.0);
    assert_eq!(lab.step(20.0), StateId::AllowExit);
    assert!(lab.tasks.running.borrow().is_none());

    let session = lab
        .events
        .iter()
        .find_map(|e| match e {
            SetupEvent::SessionCompleted(s) => Some(s.clone()),
            _ => None,
        })
        .expect("session completed");
    assert_eq!(session.rfid, TAG);
    assert_eq!(session.task, "lever_press");
    assert_eq!(session.weight_g, Some(20.0));
    assert!(!session.errored);
    assert!(session.exit_ms > session.entry_ms);

    lab.step(0.0);
    assert_eq!(lab.step(0.0), StateId::AllowEntry);
    assert_eq!(
        *lab.tasks.history.borrow(),
        ["start lever_press", "stop lever_press"]
    );
    assert!(lab.errors.is_empty(), "{:?}", lab.errors);
    assert_eq!(lab.sup.setup(SETUP).unwrap().router().last_state(), Some(StateId::AllowEntry));
}

#[test]
fn run_log_holds_bare_payloads() {
    let mut lab = Lab::new(true);
    lab.enter_training();

    let log = lab.logged();
    assert_eq!(log[0], "state:allow_entry_0");
    assert!(log.iter().all(|l| !l.contains("start_") && !l.contains("_end")));
    assert!(log.iter().any(|l| l.starts_with(&format!("RFID:{TAG}_"))));
    assert!(log.iter().any(|l| l.starts_with("weight:20.00_")));
    // Occupancy diagnostics travel unframed and never reach the log.
    assert!(log.iter().all(|l| !l.contains("mice")));
    assert_eq!(lab.sup.setup(SETUP).unwrap().board().malformed(), 0);
}

#[test]
fn state_changes_are_published_in_order() {
    let mut lab = Lab::new(true);
    lab.enter_training();

    let states: Vec<StateId> = lab
        .events
        .iter()
        .filter_map(|e| match e {
            SetupEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        [
            StateId::AllowEntry,
            StateId::WaitClose,
            StateId::CheckMouse,
            StateId::EnterTrainingChamber,
            StateId::CheckMouseInTraining,
            StateId::MouseTraining,
        ]
    );
}

#[test]
fn unassigned_animal_trains_without_a_task() {
    let mut lab = Lab::new(false);
    lab.enter_training();

    assert!(!lab.tasks.is_running());
    assert!(lab.errors.is_empty());
    assert!(!lab
        .events
        .iter()
        .any(|e| matches!(e, SetupEvent::TaskStarted { .. })));
}

#[test]
fn unknown_tag_is_reported() {
    let mut lab = Lab::new(true);
    lab.store = JsonExperimentStore::new(Vec::new());
    lab.enter_training();

    assert_eq!(lab.errors, [HostError::UnknownRfid(TAG.into())]);
    assert!(!lab.tasks.is_running());
}

#[test]
fn board_fault_ends_session_as_errored() {
    let mut lab = Lab::new(true);
    lab.enter_training();

    lab.cell.hw.fail_weigh = true;
    assert_eq!(lab.step(0.0), StateId::Error);

    assert!(!lab.tasks.is_running());
    assert!(lab.events.contains(&SetupEvent::TaskStopped));
    assert!(lab
        .events
        .contains(&SetupEvent::BoardError("sensor: load cell does not respond".into())));
    let session = lab
        .events
        .iter()
        .find_map(|e| match e {
            SetupEvent::SessionCompleted(s) => Some(s.clone()),
            _ => None,
        })
        .expect("session completed");
    assert!(session.errored);
}

#[test]
fn reset_after_fault_rehomes_the_board() {
    let mut lab = Lab::new(true);
    lab.cell.hw.fail_weigh = true;
    assert_eq!(lab.step(0.0), StateId::Error);
    lab.cell.hw.fail_weigh = false;
    assert_eq!(lab.step(0.0), StateId::Error);

    lab.sup.send(SETUP, HostCommand::Reset, lab.cell.hw.now_ms).unwrap();
    assert_eq!(lab.step(0.0), StateId::AllowEntry);

    assert_eq!(lab.sup.setup(SETUP).unwrap().board().pending(), None);
    assert_eq!(lab.cell.hw.locked, [false, true, true, true]);
    assert!(lab.logged().last().unwrap().starts_with("state:allow_entry_"));
}

#[test]
fn calibration_reply_goes_only_to_registered_dialog() {
    let mut lab = Lab::new(true);
    lab.sup.register(SETUP, Recipient::CalibrationDialog).unwrap();
    lab.printer.0.borrow_mut().clear();

    lab.sup.send(SETUP, HostCommand::Weigh, lab.cell.hw.now_ms).unwrap();
    assert_eq!(
        lab.sup.send(SETUP, HostCommand::Tare, lab.cell.hw.now_ms),
        Err(HostError::Busy)
    );

    lab.cell.hw.weight_g = 3.0;
    lab.step(3.0);

    let printed = lab.printer.0.borrow().clone();
    assert_eq!(
        printed,
        [(Recipient::CalibrationDialog, "calW:3.00".to_owned())]
    );
    assert!(lab.logged().iter().all(|l| !l.starts_with("cal")));
    assert_eq!(lab.sup.setup(SETUP).unwrap().board().pending(), None);

    // The slot is free again.
    lab.sup.send(SETUP, HostCommand::Tare, lab.cell.hw.now_ms).unwrap();
    lab.step(3.0);
    assert_eq!(
        lab.printer.0.borrow().last(),
        Some(&(Recipient::CalibrationDialog, "calT:0.00".to_owned()))
    );
}

#[test]
fn unregistered_dialog_misses_calibration_replies() {
    let mut lab = Lab::new(true);
    lab.sup.register(SETUP, Recipient::ConfigureBoxDialog).unwrap();
    lab.sup.unregister(SETUP, Recipient::ConfigureBoxDialog).unwrap();
    lab.printer.0.borrow_mut().clear();

    lab.sup.send(SETUP, HostCommand::Weigh, lab.cell.hw.now_ms).unwrap();
    lab.step(0.0);

    assert!(lab.printer.0.borrow().is_empty());
    assert_eq!(lab.sup.setup(SETUP).unwrap().board().pending(), None);
}

#[test]
fn manual_door_command_round_trips() {
    let mut lab = Lab::new(true);
    lab.sup
        .send(
            SETUP,
            HostCommand::Door {
                door: homecage_ac::fsm::context::Door::ExitOuter,
                action: homecage_ac::protocol::DoorAction::Open,
            },
            lab.cell.hw.now_ms,
        )
        .unwrap();
    lab.step(0.0);

    assert!(!lab.cell.hw.locked[3]);
    assert_eq!(lab.sup.setup(SETUP).unwrap().board().pending(), None);
    assert!(lab.logged().iter().any(|l| l.starts_with("magdoor3_open_")));
}

#[test]
fn stop_setup_halts_task_and_returns_link() {
    let mut lab = Lab::new(true);
    lab.enter_training();
    assert!(lab.tasks.is_running());

    let mut link = lab.sup.stop_setup(SETUP).expect("setup exists");
    assert!(!lab.tasks.is_running());
    assert_eq!(lab.sup.setup_ids().count(), 0);
    assert!(lab.sup.stop_setup(SETUP).is_none());

    // The returned end is still wired to the board.
    link.write_all(b"weigh\n").unwrap();
    let c = &mut lab.cell;
    c.app.tick(&mut c.hw, &mut c.link, &mut c.sink);
    let mut buf = [0u8; 64];
    let n = link.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"start_calW:0.00_end");
}

#[test]
fn duplicate_setup_ids_are_rejected() {
    let mut sup: Supervisor<PipeEnd> = Supervisor::new(HostConfig::default());
    let (a, b) = pipe();
    sup.add_setup(
        "box",
        a,
        Box::new(SharedLog::default()),
        Box::new(SharedPrinter::default()),
        Box::new(SharedTasks::default()),
    )
    .unwrap();
    let err = sup
        .add_setup(
            "box",
            b,
            Box::new(SharedLog::default()),
            Box::new(SharedPrinter::default()),
            Box::new(SharedTasks::default()),
        )
        .unwrap_err();
    assert!(matches!(err, HostError::Link(_)));
    assert_eq!(sup.setup_ids().collect::<Vec<_>>(), ["box"]);
}

#[test]
fn commands_to_unknown_setup_fail() {
    let mut sup: Supervisor<PipeEnd> = Supervisor::new(HostConfig::default());
    assert!(sup.send("nowhere", HostCommand::Tare, 0).is_err());
    assert!(sup.register("nowhere", Recipient::CalibrationDialog).is_err());
}
