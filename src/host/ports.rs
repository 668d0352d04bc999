//! Host-side collaborator ports.
//!
//! The router and supervisor reach the rest of the desktop application
//! (run logs, print consumers, the experiment store, the behavioural task
//! controller) only through these traits.

use super::HostError;
use super::store::AnimalRecord;

/// Named print targets.  Calibration replies only reach the dialogs that
/// registered for them; everything else goes to the system overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    SystemOverview,
    CalibrationDialog,
    ConfigureBoxDialog,
}

/// Append-only text sink for every routed message.
pub trait RunLog {
    fn append(&mut self, line: &str, timestamp_ms: u64);
}

pub trait PrintConsumer {
    fn print(&mut self, recipient: Recipient, text: &str);
}

pub trait ExperimentStore {
    fn lookup_by_rfid(&self, rfid: &str) -> Option<AnimalRecord>;
}

/// The behavioural task controller (pyControl board) handed off to once
/// an animal reaches the training chamber.
pub trait TaskController {
    fn start_task(&mut self, task: &str) -> Result<(), HostError>;

    fn stop_task(&mut self) -> Result<(), HostError>;

    fn is_running(&self) -> bool;
}

/// Print consumer that forwards to the `log` facade.
#[derive(Default)]
pub struct LogPrinter;

impl PrintConsumer for LogPrinter {
    fn print(&mut self, recipient: Recipient, text: &str) {
        log::info!("[{:?}] {}", recipient, text);
    }
}

/// Task controller for setups without a behavioural board attached:
/// records what would run and logs it.
#[derive(Debug, Default)]
pub struct LogTaskController {
    running: Option<String>,
}

impl TaskController for LogTaskController {
    fn start_task(&mut self, task: &str) -> Result<(), HostError> {
        log::info!("Task: start {}", task);
        self.running = Some(task.to_owned());
        Ok(())
    }

    fn stop_task(&mut self) -> Result<(), HostError> {
        if let Some(task) = self.running.take() {
            log::info!("Task: stop {}", task);
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.is_some()
    }
}
