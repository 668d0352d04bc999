//! The AC protocol on top of a [`Transport`].
//!
//! One command may be outstanding at a time.  A second command is refused
//! with [`HostError::Busy`] until the matching reply arrives or the reply
//! window closes.

use log::{debug, warn};

use super::HostError;
use super::extractor::FrameExtractor;
use crate::config::HostConfig;
use crate::fsm::context::Door;
use crate::protocol::{AcMessage, DoorAction, HostCommand, Transport};

/// Upper bound on reads per poll so a chattering board cannot starve
/// the other setups.
const MAX_READS_PER_POLL: usize = 64;

#[derive(Debug, Clone, Copy)]
struct Pending {
    cmd: HostCommand,
    deadline_ms: u64,
}

pub struct AccessControlBoard<T> {
    transport: T,
    extractor: FrameExtractor,
    pending: Option<Pending>,
    reply_timeout_ms: u64,
}

impl<T: Transport> AccessControlBoard<T> {
    pub fn new(transport: T, cfg: &HostConfig) -> Self {
        Self {
            transport,
            extractor: FrameExtractor::new(cfg.frame_buffer_limit),
            pending: None,
            reply_timeout_ms: cfg.reply_timeout_ms,
        }
    }

    /// Write `cmd` unless another command is still waiting for its reply.
    pub fn send(&mut self, cmd: HostCommand, now_ms: u64) -> Result<(), HostError> {
        self.expire(now_ms);
        if let Some(p) = self.pending {
            debug!("Board: refusing {} while {} is pending", cmd, p.cmd);
            return Err(HostError::Busy);
        }
        let line = format!("{cmd}\n");
        let written = self
            .transport
            .write_all(line.as_bytes())
            .and_then(|n| self.transport.flush().map(|()| n))
            .map_err(|e| HostError::Link(format!("{e:?}")))?;
        if written < line.len() {
            return Err(HostError::Link(format!(
                "{cmd}: only {written} of {} bytes written",
                line.len()
            )));
        }
        self.pending = Some(Pending {
            cmd,
            deadline_ms: now_ms.saturating_add(self.reply_timeout_ms),
        });
        Ok(())
    }

    pub fn tare(&mut self, now_ms: u64) -> Result<(), HostError> {
        self.send(HostCommand::Tare, now_ms)
    }

    pub fn calibrate(&mut self, known_g: f32, now_ms: u64) -> Result<(), HostError> {
        self.send(HostCommand::Calibrate(known_g), now_ms)
    }

    pub fn weigh(&mut self, now_ms: u64) -> Result<(), HostError> {
        self.send(HostCommand::Weigh, now_ms)
    }

    pub fn read_tag(&mut self, now_ms: u64) -> Result<(), HostError> {
        self.send(HostCommand::ReadTag, now_ms)
    }

    pub fn set_door(&mut self, door: Door, action: DoorAction, now_ms: u64) -> Result<(), HostError> {
        self.send(HostCommand::Door { door, action }, now_ms)
    }

    /// Re-home the board after (re)connecting; clears a latched
    /// `error_state`.  Answered by `state:allow_entry`.
    pub fn reset(&mut self, now_ms: u64) -> Result<(), HostError> {
        self.send(HostCommand::Reset, now_ms)
    }

    /// Drain the link and return every completed frame payload.
    pub fn poll(&mut self, now_ms: u64) -> Result<Vec<String>, HostError> {
        let mut payloads = Vec::new();
        let mut buf = [0u8; 256];
        for _ in 0..MAX_READS_PER_POLL {
            let n = self
                .transport
                .read(&mut buf)
                .map_err(|e| HostError::Link(format!("{e:?}")))?;
            if n == 0 {
                break;
            }
            payloads.extend(self.extractor.feed(&buf[..n]));
        }

        if let Some(p) = self.pending {
            let answered = payloads
                .iter()
                .filter_map(|s| AcMessage::parse(s).ok())
                .any(|m| p.cmd.is_reply(&m));
            if answered {
                self.pending = None;
            }
        }
        self.expire(now_ms);
        Ok(payloads)
    }

    /// The command still awaiting its reply, if any.
    pub fn pending(&self) -> Option<HostCommand> {
        self.pending.map(|p| p.cmd)
    }

    pub fn malformed(&self) -> u64 {
        self.extractor.malformed()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Tear down, handing the link back to the caller.
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn expire(&mut self, now_ms: u64) {
        if let Some(p) = self.pending {
            if now_ms >= p.deadline_ms {
                warn!("Board: no reply to {} within {} ms", p.cmd, self.reply_timeout_ms);
                self.pending = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Wire {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
        /// Accept no more output.
        full: bool,
    }

    impl Transport for Wire {
        type Error = ();

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
            let n = buf.len().min(self.rx.len()).min(7);
            for b in buf.iter_mut().take(n) {
                *b = self.rx.pop_front().unwrap_or(0);
            }
            Ok(n)
        }

        fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
            if self.full {
                return Ok(0);
            }
            self.tx.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> Result<(), ()> {
            Ok(())
        }

        fn available(&self) -> bool {
            !self.rx.is_empty()
        }
    }

    fn board() -> AccessControlBoard<Wire> {
        let cfg = HostConfig {
            reply_timeout_ms: 1_000,
            ..HostConfig::default()
        };
        AccessControlBoard::new(Wire::default(), &cfg)
    }

    #[test]
    fn second_command_is_busy_until_reply() {
        let mut b = board();
        b.tare(0).unwrap();
        assert_eq!(b.transport_mut().tx, b"tare\n");
        assert_eq!(b.weigh(10), Err(HostError::Busy));

        b.transport_mut().rx.extend(b"start_state:allow_entry_endstart_calT:0.00_end".iter());
        let got = b.poll(20).unwrap();
        assert_eq!(got, vec!["state:allow_entry", "calT:0.00"]);
        assert_eq!(b.pending(), None);
        b.weigh(30).unwrap();
    }

    #[test]
    fn unrelated_reply_keeps_slot_busy() {
        let mut b = board();
        b.set_door(Door::ExitInner, DoorAction::Open, 0).unwrap();
        b.transport_mut().rx.extend(b"start_magdoor1_open_end".iter());
        b.poll(5).unwrap();
        assert!(b.pending().is_some());
        b.transport_mut().rx.extend(b"start_magdoor2_open_end".iter());
        b.poll(6).unwrap();
        assert!(b.pending().is_none());
    }

    #[test]
    fn switch_edge_does_not_answer_door_override() {
        let mut b = board();
        b.set_door(Door::ExitInner, DoorAction::Open, 0).unwrap();
        b.transport_mut().rx.extend(b"start_door2_open_end".iter());
        b.poll(5).unwrap();
        assert_eq!(
            b.pending(),
            Some(HostCommand::Door {
                door: Door::ExitInner,
                action: DoorAction::Open
            })
        );
        b.transport_mut().rx.extend(b"start_magdoor2_open_end".iter());
        b.poll(6).unwrap();
        assert_eq!(b.pending(), None);
    }

    #[test]
    fn reset_is_answered_by_allow_entry() {
        let mut b = board();
        b.reset(0).unwrap();
        assert_eq!(b.transport_mut().tx, b"reset\n");
        b.transport_mut().rx.extend(b"start_state:error_state_end".iter());
        b.poll(1).unwrap();
        assert_eq!(b.pending(), Some(HostCommand::Reset));
        b.transport_mut().rx.extend(b"start_state:allow_entry_end".iter());
        b.poll(2).unwrap();
        assert_eq!(b.pending(), None);
    }

    #[test]
    fn short_write_is_a_link_error() {
        let mut b = board();
        b.transport_mut().full = true;
        assert!(matches!(b.weigh(0), Err(HostError::Link(_))));
        assert_eq!(b.pending(), None);
    }

    #[test]
    fn reply_window_expires() {
        let mut b = board();
        b.read_tag(0).unwrap();
        assert_eq!(b.calibrate(20.0, 999), Err(HostError::Busy));
        b.calibrate(20.0, 1_000).unwrap();
        assert_eq!(b.transport_mut().tx, b"read_tag\ncalibrate:20\n");
    }
}
