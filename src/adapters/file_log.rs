//! Run log on disk: one line per routed message, `<payload>_<timestamp_ms>`.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::warn;

use crate::host::ports::RunLog;

pub struct FileRunLog {
    path: PathBuf,
    out: BufWriter<File>,
}

impl FileRunLog {
    /// Open `path` for appending, creating it (and its directory) if needed.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening run log {}", path.display()))?;
        Ok(Self {
            path: path.to_owned(),
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunLog for FileRunLog {
    fn append(&mut self, line: &str, timestamp_ms: u64) {
        let res = writeln!(self.out, "{line}_{timestamp_ms}").and_then(|()| self.out.flush());
        if let Err(e) = res {
            warn!("Run log {}: {}", self.path.display(), e);
        }
    }
}
