//! Supervisor: owns every setup and polls each once per host tick.
//!
//! A setup is one AC board plus its router and collaborators.  Setups
//! share nothing mutable; the experiment store is borrowed read-only for
//! the duration of a poll.

use log::{info, warn};

use super::HostError;
use super::board::AccessControlBoard;
use super::ports::{ExperimentStore, PrintConsumer, Recipient, RunLog, TaskController};
use super::router::{Collaborators, MessageRouter, SetupEvent};
use crate::config::HostConfig;
use crate::protocol::{HostCommand, Transport};

pub struct Setup<T> {
    id: String,
    board: AccessControlBoard<T>,
    router: MessageRouter,
    log: Box<dyn RunLog>,
    print: Box<dyn PrintConsumer>,
    tasks: Box<dyn TaskController>,
}

impl<T: Transport> Setup<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn board(&self) -> &AccessControlBoard<T> {
        &self.board
    }

    fn poll(&mut self, store: &dyn ExperimentStore, now_ms: u64, out: &mut PollOutcome) {
        let payloads = match self.board.poll(now_ms) {
            Ok(p) => p,
            Err(e) => {
                out.errors.push((self.id.clone(), e));
                return;
            }
        };
        let mut io = Collaborators {
            log: self.log.as_mut(),
            print: self.print.as_mut(),
            store,
            tasks: self.tasks.as_mut(),
        };
        for payload in &payloads {
            if let Err(e) = self.router.route(payload, now_ms, &mut io) {
                warn!("Setup {}: {}", self.id, e);
                out.errors.push((self.id.clone(), e));
            }
        }
        while let Some(ev) = self.router.next_event() {
            out.events.push((self.id.clone(), ev));
        }
    }
}

/// Everything one supervisor tick produced, tagged by setup id.
#[derive(Debug, Default)]
pub struct PollOutcome {
    pub events: Vec<(String, SetupEvent)>,
    pub errors: Vec<(String, HostError)>,
}

pub struct Supervisor<T> {
    cfg: HostConfig,
    setups: Vec<Setup<T>>,
}

impl<T: Transport> Supervisor<T> {
    pub fn new(cfg: HostConfig) -> Self {
        Self {
            cfg,
            setups: Vec::new(),
        }
    }

    /// Register a setup.  Ids must be unique.
    pub fn add_setup(
        &mut self,
        id: &str,
        transport: T,
        log: Box<dyn RunLog>,
        print: Box<dyn PrintConsumer>,
        tasks: Box<dyn TaskController>,
    ) -> Result<(), HostError> {
        if self.setups.iter().any(|s| s.id == id) {
            return Err(HostError::Link(format!("setup {id} already exists")));
        }
        self.setups.push(Setup {
            id: id.to_owned(),
            board: AccessControlBoard::new(transport, &self.cfg),
            router: MessageRouter::new(),
            log,
            print,
            tasks,
        });
        info!("Supervisor: setup {} added", id);
        Ok(())
    }

    /// Stop a setup: halt its task and hand back its link.
    pub fn stop_setup(&mut self, id: &str) -> Option<T> {
        let idx = self.setups.iter().position(|s| s.id == id)?;
        let mut setup = self.setups.remove(idx);
        if setup.tasks.is_running() {
            if let Err(e) = setup.tasks.stop_task() {
                warn!("Supervisor: stopping task on {} failed: {}", id, e);
            }
        }
        info!("Supervisor: setup {} stopped", id);
        Some(setup.board.into_transport())
    }

    pub fn send(&mut self, id: &str, cmd: HostCommand, now_ms: u64) -> Result<(), HostError> {
        self.setup_mut(id)?.board.send(cmd, now_ms)
    }

    pub fn register(&mut self, id: &str, recipient: Recipient) -> Result<(), HostError> {
        self.setup_mut(id)?.router.register(recipient);
        Ok(())
    }

    pub fn unregister(&mut self, id: &str, recipient: Recipient) -> Result<(), HostError> {
        self.setup_mut(id)?.router.unregister(recipient);
        Ok(())
    }

    /// One host tick: poll every setup in turn.
    pub fn poll(&mut self, store: &dyn ExperimentStore, now_ms: u64) -> PollOutcome {
        let mut out = PollOutcome::default();
        for setup in &mut self.setups {
            setup.poll(store, now_ms, &mut out);
        }
        out
    }

    pub fn setup(&self, id: &str) -> Option<&Setup<T>> {
        self.setups.iter().find(|s| s.id == id)
    }

    pub fn setup_ids(&self) -> impl Iterator<Item = &str> {
        self.setups.iter().map(|s| s.id.as_str())
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.cfg.poll_interval_ms
    }

    fn setup_mut(&mut self, id: &str) -> Result<&mut Setup<T>, HostError> {
        self.setups
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| HostError::Link(format!("no setup {id}")))
    }
}
