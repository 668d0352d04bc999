//! Frame extraction from the raw AC byte stream.
//!
//! The board interleaves framed messages (`start_<payload>_end`) with
//! bare diagnostics.  [`FrameExtractor`] buffers whatever arrives, hands
//! out each complete payload exactly once and keeps an unfinished frame
//! for the next call.  Bytes outside any frame are dropped.

use log::{debug, warn};

use crate::protocol::{FRAME_END, FRAME_START};

pub struct FrameExtractor {
    buf: String,
    limit: usize,
    malformed: u64,
}

impl FrameExtractor {
    /// `limit` bounds how many bytes may sit in the buffer without
    /// completing a frame.
    pub fn new(limit: usize) -> Self {
        Self {
            buf: String::new(),
            limit: limit.max(FRAME_START.len() + FRAME_END.len()),
            malformed: 0,
        }
    }

    /// Append `bytes` and return every payload completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(bytes));

        let mut out = Vec::new();
        loop {
            let Some(start) = self.buf.find(FRAME_START) else {
                self.keep_partial_start();
                break;
            };
            if start > 0 {
                debug!("Frames: skipping {} unframed bytes", start);
                self.buf.drain(..start);
            }

            let body = FRAME_START.len();
            let Some(end) = self.buf[body..].find(FRAME_END).map(|i| i + body) else {
                break;
            };

            // A second opener before the terminator means the first frame
            // was cut short; resync on the later one.
            if let Some(restart) = self.buf[body..end].rfind(FRAME_START).map(|i| i + body) {
                self.count_malformed(restart);
                self.buf.drain(..restart);
                continue;
            }

            out.push(self.buf[body..end].to_owned());
            self.buf.drain(..end + FRAME_END.len());
        }

        if self.buf.len() > self.limit {
            let before = self.buf.len();
            self.keep_partial_start();
            let dropped = before - self.buf.len();
            self.count_malformed(dropped);
            warn!("Frames: buffer overflow, {} bytes discarded", dropped);
        }
        out
    }

    /// Bytes discarded as part of broken or oversized frames.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Bytes held back waiting for a frame to complete.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn count_malformed(&mut self, bytes: usize) {
        self.malformed = self.malformed.saturating_add(bytes as u64);
    }

    /// Drop everything but a tail that could still grow into `start_`.
    fn keep_partial_start(&mut self) {
        let keep = (1..FRAME_START.len())
            .rev()
            .find(|&n| self.buf.ends_with(&FRAME_START[..n]))
            .unwrap_or(0);
        let cut = self.buf.len() - keep;
        self.buf.drain(..cut);
    }
}
