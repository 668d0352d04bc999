//! Line assembly for inbound host commands.
//!
//! Bytes arrive in arbitrary chunks; [`LineReader`] buffers them and
//! yields one complete line at a time.  A line longer than the buffer is
//! dropped whole and reported once as [`ProtocolError::Overflow`].

use heapless::{String, Vec};

use super::command::HostCommand;
use super::transport::Transport;
use crate::error::ProtocolError;

pub const LINE_CAPACITY: usize = 64;

pub struct LineReader {
    buf: Vec<u8, LINE_CAPACITY>,
    /// Set while skipping the remainder of an over-long line.
    discarding: bool,
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            discarding: false,
        }
    }

    /// Feed one byte.  Returns a line (without terminator) once `\n` arrives.
    pub fn push(&mut self, byte: u8) -> Option<Result<String<LINE_CAPACITY>, ProtocolError>> {
        if byte == b'\n' {
            if self.discarding {
                self.discarding = false;
                self.buf.clear();
                return None;
            }
            let line = core::mem::take(&mut self.buf);
            let text = core::str::from_utf8(&line).map_err(|_| ProtocolError::MalformedFrame);
            return Some(text.and_then(|t| {
                String::try_from(t.trim_end_matches('\r')).map_err(|_| ProtocolError::Overflow)
            }));
        }
        if self.discarding {
            return None;
        }
        if self.buf.push(byte).is_err() {
            self.buf.clear();
            self.discarding = true;
            return Some(Err(ProtocolError::Overflow));
        }
        None
    }

    /// Drain the link until one command line is complete.
    ///
    /// Returns `None` when the link has no complete line yet.  Blank
    /// lines are skipped.
    pub fn poll_command<T: Transport>(
        &mut self,
        link: &mut T,
    ) -> Option<Result<HostCommand, ProtocolError>> {
        let mut byte = [0u8; 1];
        loop {
            match link.read(&mut byte) {
                Ok(1) => {}
                Ok(_) => return None,
                Err(e) => {
                    log::warn!("Host link read failed: {:?}", e);
                    return None;
                }
            }
            match self.push(byte[0]) {
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => return Some(HostCommand::parse(&line)),
                Some(Err(e)) => return Some(Err(e)),
                None => continue,
            }
        }
    }
}
