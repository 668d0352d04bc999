//! Host link adapter: the AC protocol over any [`Transport`].
//!
//! Outbound messages are rendered with [`to_wire`] and written whole;
//! inbound bytes are assembled into command lines by a [`LineReader`].

use log::warn;

use crate::app::ports::HostLink;
use crate::error::ProtocolError;
use crate::protocol::message::to_wire;
use crate::protocol::{AcMessage, HostCommand, LineReader, Transport};

pub struct SerialHostLink<T> {
    transport: T,
    lines: LineReader,
    /// Messages that could not be written (link errors or overflow).
    dropped: u32,
}

impl<T: Transport> SerialHostLink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            lines: LineReader::new(),
            dropped: 0,
        }
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: Transport> HostLink for SerialHostLink<T> {
    fn send(&mut self, msg: &AcMessage) {
        let wire = match to_wire(msg) {
            Ok(w) => w,
            Err(e) => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("Host link: cannot encode {:?}: {}", msg, e);
                return;
            }
        };
        let sent = self
            .transport
            .write_all(wire.as_bytes())
            .and_then(|n| self.transport.flush().map(|()| n));
        match sent {
            Ok(n) if n == wire.len() => {}
            Ok(n) => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("Host link: {} cut after {} of {} bytes", msg, n, wire.len());
            }
            Err(e) => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("Host link: write failed: {:?}", e);
            }
        }
    }

    fn poll_command(&mut self) -> Option<Result<HostCommand, ProtocolError>> {
        self.lines.poll_command(&mut self.transport)
    }
}
