//! Fuzz target: the board's inbound command path.
//!
//! Feeds arbitrary bytes through `LineReader` exactly as the UART would
//! deliver them, and checks that every accepted command prints back to a
//! line that parses to the same command.
//!
//! cargo fuzz run fuzz_command_parser

#![no_main]

use homecage_ac::protocol::transport::Transport;
use homecage_ac::protocol::{HostCommand, LineReader};
use libfuzzer_sys::fuzz_target;

/// Hands out the fuzz input a few bytes at a time.
struct Feed<'a> {
    data: &'a [u8],
}

impl Transport for Feed<'_> {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let n = buf.len().min(self.data.len()).min(7);
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn available(&self) -> bool {
        !self.data.is_empty()
    }
}

fuzz_target!(|data: &[u8]| {
    let mut feed = Feed { data };
    let mut lines = LineReader::new();

    // Bounded: each poll consumes input or returns None.
    for _ in 0..=data.len() {
        match lines.poll_command(&mut feed) {
            Some(Ok(cmd)) => {
                let printed = cmd.to_string();
                assert_eq!(HostCommand::parse(&printed), Ok(cmd), "{printed:?}");
            }
            Some(Err(_)) => {}
            None if feed.data.is_empty() => break,
            None => {}
        }
    }
});
