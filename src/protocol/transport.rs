//! Transport abstraction: any byte-oriented channel.
//!
//! Concrete implementations:
//! - ESP-IDF UART (host link and RFID reader, `adapters::uart`)
//! - Desktop serial port (`adapters::serial`, `host` feature)
//! - Scripted in-memory links in tests
//!
//! The RFID readers, the board's host link and the host-side board
//! adapter are all generic over `Transport`.

/// Byte-oriented transport channel.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns the number of bytes actually read.
    /// Returns 0 if no data is available (non-blocking).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `data` to the transport.
    /// Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Check if data is available for reading.
    fn available(&self) -> bool;

    /// Write all of `data`, retrying short writes.
    ///
    /// Returns how many bytes went out.  Less than `data.len()` means the
    /// transport stopped accepting bytes and the tail was not sent.
    fn write_all(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        let mut sent = 0;
        while sent < data.len() {
            let n = self.write(&data[sent..])?;
            if n == 0 {
                break;
            }
            sent += n;
        }
        Ok(sent)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        (**self).write(data)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }

    fn available(&self) -> bool {
        (**self).available()
    }
}

/// A null transport that discards all writes and never reads.
/// Stands in for the RFID link on boards without a reader fitted.
pub struct NullTransport;

impl Transport for NullTransport {
    type Error = ();

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, ()> {
        Ok(0)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn available(&self) -> bool {
        false
    }
}
