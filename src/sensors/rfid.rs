//! Serial RFID readers.
//!
//! Two reader families hang off the board's RFID UART:
//!
//! | Reader            | Protocol                                   |
//! |-------------------|--------------------------------------------|
//! | Priority 1 FDX-B  | ASCII `RAT\r` → `<country>_<id>\r`         |
//! | RWD-QT (EM400x)   | binary `R\0` → status byte + LE id, CTS    |
//!
//! Every poll is bounded: a silent reader yields `Ok(None)`.  Only a
//! reader that never becomes ready to accept a command is an error.

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;
use heapless::{String, Vec};
use log::{info, warn};

use crate::error::SensorError;
use crate::protocol::transport::Transport;

/// An animal's tag as printed by the reader.
pub type TagId = String<16>;

/// Anything that can be polled for a tag.
pub trait TagReader {
    /// Poll once.  `Ok(None)` when no tag is in range.
    fn read_tag(&mut self) -> Result<Option<TagId>, SensorError>;
}

const REPLY_CAPACITY: usize = 64;

/// Drop whatever the reader sent since the last poll.
fn drain<T: Transport>(link: &mut T) -> Result<(), SensorError> {
    let mut scratch = [0u8; 16];
    while link.available() {
        let n = link.read(&mut scratch).map_err(|_| SensorError::LinkFailed)?;
        if n == 0 {
            break;
        }
    }
    Ok(())
}

fn send<T: Transport>(link: &mut T, cmd: &[u8]) -> Result<(), SensorError> {
    link.write(cmd).map_err(|_| SensorError::LinkFailed)?;
    link.flush().map_err(|_| SensorError::LinkFailed)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Priority 1 Design FDX-B reader
// ═══════════════════════════════════════════════════════════════════════════

pub struct Priority1Reader<T, D> {
    link: T,
    delay: D,
    reply_window_ms: u32,
}

impl<T: Transport, D: DelayNs> Priority1Reader<T, D> {
    /// Default reply window per poll.
    pub const REPLY_WINDOW_MS: u32 = 40;

    /// Put the module in FDX-B mode.
    pub fn new(mut link: T, mut delay: D) -> Result<Self, SensorError> {
        send(&mut link, b"ST2\r")?;
        delay.delay_ms(10);
        drain(&mut link)?;
        info!("RFID: Priority 1 reader in FDX-B mode");
        Ok(Self {
            link,
            delay,
            reply_window_ms: Self::REPLY_WINDOW_MS,
        })
    }

    pub fn with_reply_window(mut self, ms: u32) -> Self {
        self.reply_window_ms = ms;
        self
    }
}

impl<T: Transport, D: DelayNs> TagReader for Priority1Reader<T, D> {
    fn read_tag(&mut self) -> Result<Option<TagId>, SensorError> {
        drain(&mut self.link)?;
        send(&mut self.link, b"RAT\r")?;

        let mut reply: Vec<u8, REPLY_CAPACITY> = Vec::new();
        let mut chunk = [0u8; 16];
        for _ in 0..self.reply_window_ms {
            let n = self.link.read(&mut chunk).map_err(|_| SensorError::LinkFailed)?;
            for &b in &chunk[..n] {
                if reply.push(b).is_err() {
                    break;
                }
            }
            if reply.iter().any(|&b| b == b'\r') && reply.iter().any(|&b| b != b'\r') {
                break;
            }
            self.delay.delay_ms(1);
        }

        Ok(parse_priority1(&reply))
    }
}

/// `<prefix>_<id>\r` → `<id>`.
pub fn parse_priority1(reply: &[u8]) -> Option<TagId> {
    let message = reply
        .split(|&b| b == b'\r' || b == b'\n')
        .find(|segment| !segment.is_empty())?;
    let text = core::str::from_utf8(message).ok()?;
    let id = text.split('_').nth(1)?.trim();
    if id.is_empty() {
        return None;
    }
    let mut tag = TagId::new();
    tag.push_str(id).ok()?;
    Some(tag)
}

// ═══════════════════════════════════════════════════════════════════════════
//  RWD-QT EM400x reader (CTS flow-controlled)
// ═══════════════════════════════════════════════════════════════════════════

pub struct RwdQtReader<T, C, D> {
    link: T,
    cts: C,
    delay: D,
}

impl<T: Transport, C: InputPin, D: DelayNs> RwdQtReader<T, C, D> {
    /// Longest wait for the module to assert CTS.
    pub const CTS_TIMEOUT_MS: u32 = 100;
    /// The module needs this long to answer a read command.
    pub const READ_SETTLE_MS: u32 = 150;
    /// ...and this long to acknowledge a configuration command.
    pub const CONFIG_SETTLE_MS: u32 = 100;
    const ACK: u8 = 0xC0;

    /// Configure polling delay and tag type.
    pub fn new(link: T, cts: C, delay: D) -> Result<Self, SensorError> {
        let mut reader = Self { link, cts, delay };
        for (cmd, what) in [(&b"P\x00\x00"[..], "polling delay"), (&b"v\x03"[..], "tag type")] {
            let reply = reader.write_read(cmd, Self::CONFIG_SETTLE_MS)?;
            if reply.first() == Some(&Self::ACK) {
                info!("RFID: RWD-QT {what} set");
            } else {
                warn!("RFID: RWD-QT {what} not acknowledged ({:02x?})", reply.as_slice());
            }
        }
        Ok(reader)
    }

    fn wait_cts(&mut self) -> Result<(), SensorError> {
        for _ in 0..Self::CTS_TIMEOUT_MS {
            if self.cts.is_low().map_err(|_| SensorError::GpioReadFailed)? {
                return Ok(());
            }
            self.delay.delay_ms(1);
        }
        Err(SensorError::RfidTimeout)
    }

    fn write_read(&mut self, cmd: &[u8], wait_ms: u32) -> Result<Vec<u8, REPLY_CAPACITY>, SensorError> {
        drain(&mut self.link)?;
        self.wait_cts()?;
        send(&mut self.link, cmd)?;
        self.delay.delay_ms(wait_ms);

        let mut reply: Vec<u8, REPLY_CAPACITY> = Vec::new();
        let mut chunk = [0u8; 16];
        loop {
            let n = self.link.read(&mut chunk).map_err(|_| SensorError::LinkFailed)?;
            if n == 0 {
                break;
            }
            if reply.extend_from_slice(&chunk[..n]).is_err() {
                break;
            }
        }
        Ok(reply)
    }
}

impl<T: Transport, C: InputPin, D: DelayNs> TagReader for RwdQtReader<T, C, D> {
    fn read_tag(&mut self) -> Result<Option<TagId>, SensorError> {
        let reply = self.write_read(b"R\x00", Self::READ_SETTLE_MS)?;
        Ok(parse_rwd_qt(&reply))
    }
}

/// Status byte followed by a little-endian tag number, printed in decimal.
pub fn parse_rwd_qt(reply: &[u8]) -> Option<TagId> {
    if reply.len() <= 1 {
        return None;
    }
    let id = reply[1..]
        .iter()
        .take(8)
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | (u64::from(b) << (8 * i)));
    let mut tag = TagId::new();
    write!(tag, "{id}").ok()?;
    Some(tag)
}
