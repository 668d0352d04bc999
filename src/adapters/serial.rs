//! Desktop serial-port transport (`host` feature).
//!
//! Wraps a `serialport` handle as a non-blocking [`Transport`] so the
//! host-side [`AccessControlBoard`](crate::host::board::AccessControlBoard)
//! can drive a real AC board over USB serial.

use std::io::{self, Read, Write};
use std::time::Duration;

use anyhow::Context;
use serialport::SerialPort;

use crate::protocol::Transport;

/// The AC board talks at 115200 8N1.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Upper bound on a single blocking read; reads normally return at once
/// because `read` checks `bytes_to_read` first.
const READ_TIMEOUT_MS: u64 = 10;

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(path: &str, baud: u32) -> anyhow::Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(READ_TIMEOUT_MS))
            .open()
            .with_context(|| format!("opening serial port {path}"))?;
        log::info!("Serial: opened {} at {} baud", path, baud);
        Ok(Self { port })
    }

    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Transport for SerialTransport {
    type Error = io::Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        let pending = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
        if pending == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = pending.min(buf.len());
        match self.port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, io::Error> {
        self.port.write(data)
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        self.port.flush()
    }

    fn available(&self) -> bool {
        self.port.bytes_to_read().map(|n| n > 0).unwrap_or(false)
    }
}
