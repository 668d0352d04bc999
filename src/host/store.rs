//! Experiment store: which task each animal runs.
//!
//! Records are typed and stored as JSON; nothing read back from disk is
//! ever evaluated.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::ports::ExperimentStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalRecord {
    pub animal_id: String,
    pub rfid: String,
    pub assigned_task: String,
    #[serde(default)]
    pub is_assigned: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct JsonExperimentStore {
    animals: Vec<AnimalRecord>,
}

impl JsonExperimentStore {
    pub fn new(animals: Vec<AnimalRecord>) -> Self {
        Self { animals }
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let store: Self = serde_json::from_str(text).context("parsing experiment store")?;
        for (i, a) in store.animals.iter().enumerate() {
            anyhow::ensure!(!a.rfid.is_empty(), "animal #{i} ({}) has no RFID", a.animal_id);
            let dupes = store.animals.iter().filter(|b| b.rfid == a.rfid).count();
            anyhow::ensure!(dupes == 1, "RFID {} is assigned to {} animals", a.rfid, dupes);
        }
        Ok(store)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading experiment store {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self).context("serialising experiment store")?;
        std::fs::write(path, text)
            .with_context(|| format!("writing experiment store {}", path.display()))
    }

    pub fn animals(&self) -> &[AnimalRecord] {
        &self.animals
    }

    /// Assign (or reassign) a task to the animal carrying `rfid`.
    /// Returns `false` when no such animal is known.
    pub fn assign(&mut self, rfid: &str, task: &str) -> bool {
        match self.animals.iter_mut().find(|a| a.rfid == rfid) {
            Some(a) => {
                a.assigned_task = task.to_owned();
                a.is_assigned = true;
                true
            }
            None => false,
        }
    }
}

impl ExperimentStore for JsonExperimentStore {
    fn lookup_by_rfid(&self, rfid: &str) -> Option<AnimalRecord> {
        self.animals.iter().find(|a| a.rfid == rfid).cloned()
    }
}
