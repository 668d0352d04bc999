//! Message router: one per setup.
//!
//! ```text
//!   payload ──▶ AcMessage::parse ──┬─ cal* ──▶ registered calibration consumers
//!                                  └─ other ─▶ RunLog + SystemOverview
//!                                              ├─ RFID / weight ─▶ SessionTracker
//!                                              └─ state ─────────▶ TaskController
//!                                                                  + SetupEvent channel
//! ```

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use super::HostError;
use super::ports::{ExperimentStore, PrintConsumer, Recipient, RunLog, TaskController};
use super::session::{MouseSession, SessionTracker};
use crate::fsm::StateId;
use crate::protocol::AcMessage;

/// Capacity of each setup's outbound event queue.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// What a setup reports to the rest of the application.
#[derive(Debug, Clone, PartialEq)]
pub enum SetupEvent {
    StateChanged(StateId),
    TaskStarted { rfid: String, task: String },
    TaskStopped,
    SessionCompleted(MouseSession),
    BoardError(String),
}

/// Everything outside the router that a routed message can touch.
pub struct Collaborators<'a> {
    pub log: &'a mut dyn RunLog,
    pub print: &'a mut dyn PrintConsumer,
    pub store: &'a dyn ExperimentStore,
    pub tasks: &'a mut dyn TaskController,
}

pub struct MessageRouter {
    session: SessionTracker,
    calibration_consumers: Vec<Recipient>,
    events: Channel<NoopRawMutex, SetupEvent, EVENT_QUEUE_DEPTH>,
    last_state: Option<StateId>,
    malformed: u64,
    dropped_events: u64,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRouter {
    pub fn new() -> Self {
        Self {
            session: SessionTracker::new(),
            calibration_consumers: Vec::new(),
            events: Channel::new(),
            last_state: None,
            malformed: 0,
            dropped_events: 0,
        }
    }

    /// Start delivering `cal*` replies to `recipient`.
    pub fn register(&mut self, recipient: Recipient) {
        if !self.calibration_consumers.contains(&recipient) {
            self.calibration_consumers.push(recipient);
        }
    }

    pub fn unregister(&mut self, recipient: Recipient) {
        self.calibration_consumers.retain(|r| *r != recipient);
    }

    /// Route one frame payload.
    ///
    /// Unparseable payloads are counted and reported as
    /// [`HostError::Protocol`]; they never reach a collaborator.
    pub fn route(
        &mut self,
        payload: &str,
        now_ms: u64,
        io: &mut Collaborators<'_>,
    ) -> Result<(), HostError> {
        let msg = match AcMessage::parse(payload) {
            Ok(m) => m,
            Err(e) => {
                self.malformed += 1;
                warn!("Router: dropping {:?}: {}", payload, e);
                return Err(HostError::Protocol(e));
            }
        };

        if msg.is_calibration() {
            for r in &self.calibration_consumers {
                io.print.print(*r, payload);
            }
            return Ok(());
        }

        io.log.append(payload, now_ms);
        io.print.print(Recipient::SystemOverview, payload);

        match msg {
            AcMessage::Rfid(Some(tag)) => self.session.on_rfid(&tag),
            AcMessage::Weight(w) => self.session.on_weight(w),
            AcMessage::State(state) => return self.on_state(state, now_ms, io),
            AcMessage::Error(text) => self.publish(SetupEvent::BoardError(text.as_str().to_owned())),
            _ => {}
        }
        Ok(())
    }

    fn on_state(
        &mut self,
        state: StateId,
        now_ms: u64,
        io: &mut Collaborators<'_>,
    ) -> Result<(), HostError> {
        self.last_state = Some(state);
        self.publish(SetupEvent::StateChanged(state));

        match state {
            StateId::AllowEntry => self.session.reset(),
            StateId::MouseTraining if !io.tasks.is_running() => self.start_session(now_ms, io)?,
            StateId::AllowExit | StateId::Error => {
                if io.tasks.is_running() {
                    io.tasks.stop_task()?;
                    self.publish(SetupEvent::TaskStopped);
                }
                let errored = state == StateId::Error;
                if let Some(done) = self.session.finish(now_ms, errored) {
                    self.publish(SetupEvent::SessionCompleted(done));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn start_session(&mut self, now_ms: u64, io: &mut Collaborators<'_>) -> Result<(), HostError> {
        let rfid = self.session.rfid().unwrap_or("None").to_owned();
        let Some(animal) = io.store.lookup_by_rfid(&rfid) else {
            return Err(HostError::UnknownRfid(rfid));
        };
        if !animal.is_assigned {
            warn!("Router: {} ({}) has no task assigned", animal.animal_id, rfid);
            return Ok(());
        }
        info!("Router: starting {} for {}", animal.assigned_task, animal.animal_id);
        io.tasks.start_task(&animal.assigned_task)?;
        self.session.begin(&animal.assigned_task, now_ms);
        self.publish(SetupEvent::TaskStarted {
            rfid,
            task: animal.assigned_task,
        });
        Ok(())
    }

    fn publish(&mut self, event: SetupEvent) {
        if self.events.try_send(event).is_err() {
            self.dropped_events += 1;
            warn!("Router: event queue full, event dropped");
        }
    }

    /// Next queued event, if any.
    pub fn next_event(&self) -> Option<SetupEvent> {
        self.events.try_receive().ok()
    }

    pub fn drain_events(&self) -> Vec<SetupEvent> {
        core::iter::from_fn(|| self.next_event()).collect()
    }

    pub fn last_state(&self) -> Option<StateId> {
        self.last_state
    }

    pub fn session(&self) -> &SessionTracker {
        &self.session
    }

    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }
}
