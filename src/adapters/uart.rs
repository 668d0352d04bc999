//! ESP-IDF UART transport.
//!
//! Wraps an `esp-idf-hal` [`UartDriver`] as a non-blocking [`Transport`].
//! UART0 carries the host protocol; UART1 talks to the RFID module.

use esp_idf_svc::hal::delay::{NON_BLOCK, TickType};
use esp_idf_svc::hal::uart::UartDriver;
use esp_idf_svc::sys::EspError;

use crate::protocol::Transport;

/// How long `flush` waits for the TX FIFO to drain.
const TX_DRAIN_MS: u64 = 100;

pub struct UartTransport<'d> {
    uart: UartDriver<'d>,
}

impl<'d> UartTransport<'d> {
    pub fn new(uart: UartDriver<'d>) -> Self {
        Self { uart }
    }
}

impl Transport for UartTransport<'_> {
    type Error = EspError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EspError> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.uart.read(buf, NON_BLOCK)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, EspError> {
        self.uart.write(data)
    }

    fn flush(&mut self) -> Result<(), EspError> {
        let ticks = TickType::new_millis(TX_DRAIN_MS).ticks();
        self.uart.wait_tx_done(ticks)
    }

    fn available(&self) -> bool {
        self.uart.remaining_read().map(|n| n > 0).unwrap_or(false)
    }
}
