//! Per-visit bookkeeping, folded from the board's messages.

use log::info;

/// One completed visit to the training chamber.
#[derive(Debug, Clone, PartialEq)]
pub struct MouseSession {
    pub rfid: String,
    pub weight_g: Option<f32>,
    pub entry_ms: u64,
    pub exit_ms: u64,
    pub task: String,
    /// The visit ended in `error_state` rather than `allow_exit`.
    pub errored: bool,
}

impl MouseSession {
    pub fn duration_ms(&self) -> u64 {
        self.exit_ms.saturating_sub(self.entry_ms)
    }
}

#[derive(Debug, Default)]
pub struct SessionTracker {
    rfid: Option<String>,
    weight_g: Option<f32>,
    started: Option<(u64, String)>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; a new animal may enter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn on_rfid(&mut self, rfid: &str) {
        self.rfid = Some(rfid.to_owned());
    }

    pub fn on_weight(&mut self, weight_g: f32) {
        self.weight_g = Some(weight_g);
    }

    pub fn rfid(&self) -> Option<&str> {
        self.rfid.as_deref()
    }

    pub fn weight_g(&self) -> Option<f32> {
        self.weight_g
    }

    /// A task was started for the current animal.
    pub fn begin(&mut self, task: &str, now_ms: u64) {
        self.started = Some((now_ms, task.to_owned()));
    }

    pub fn in_progress(&self) -> bool {
        self.started.is_some()
    }

    /// Close the visit.  Returns the session only if a task was started;
    /// either way the tracker is reset.
    pub fn finish(&mut self, now_ms: u64, errored: bool) -> Option<MouseSession> {
        let done = self.started.take().map(|(entry_ms, task)| MouseSession {
            rfid: self.rfid.clone().unwrap_or_default(),
            weight_g: self.weight_g,
            entry_ms,
            exit_ms: now_ms,
            task,
            errored,
        });
        if let Some(s) = &done {
            info!(
                "Session: {} ran {} for {} ms{}",
                s.rfid,
                s.task,
                s.duration_ms(),
                if errored { " (error)" } else { "" }
            );
        }
        self.reset();
        done
    }
}
