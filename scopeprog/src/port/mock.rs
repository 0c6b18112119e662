//! Scripted in-memory port for engine tests.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::port::Port;

/// Mock port for unit testing command exchanges.
///
/// Bytes queued with [`MockPort::script`] are handed out on reads, and
/// every write is captured. An exhausted script behaves like a device that
/// stopped answering: reads fail with `TimedOut`.
pub(crate) struct MockPort {
    /// Queued device replies, drained by reads.
    script: VecDeque<u8>,
    /// Captured host writes, in order.
    written: Vec<u8>,
    timeout: Duration,
}

impl MockPort {
    pub(crate) fn new() -> Self {
        Self {
            script: VecDeque::new(),
            written: Vec::new(),
            timeout: Duration::from_secs(20),
        }
    }

    /// Queue reply bytes for subsequent reads.
    pub(crate) fn script(&mut self, bytes: &[u8]) {
        self.script
            .extend(bytes);
    }

    /// All bytes written by the host so far.
    pub(crate) fn written(&self) -> &[u8] {
        &self.written
    }

    /// Count of scripted reply bytes not yet consumed.
    pub(crate) fn remaining(&self) -> usize {
        self.script
            .len()
    }
}

impl Default for MockPort {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self
            .script
            .is_empty()
        {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "scripted replies exhausted",
            ));
        }

        let mut n = 0;
        while n < buf.len() {
            match self
                .script
                .pop_front()
            {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                },
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for MockPort {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn clear_buffers(&mut self) -> Result<()> {
        // Stale input from a previous exchange is discarded; the captured
        // write log stays for assertions.
        self.script
            .clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_reads_drain_in_order() {
        let mut mock = MockPort::new();
        mock.script(&[0x01, 0x02, 0x03]);

        let mut buf = [0u8; 2];
        mock.read_exact(&mut buf)
            .unwrap();
        assert_eq!(buf, [0x01, 0x02]);
        assert_eq!(mock.remaining(), 1);
    }

    #[test]
    fn test_write_capture() {
        let mut mock = MockPort::new();
        mock.write_all(b"er")
            .unwrap();
        mock.write_all(&[0x00])
            .unwrap();
        assert_eq!(mock.written(), &[b'e', b'r', 0x00]);
    }

    #[test]
    fn test_clear_buffers_drops_stale_script() {
        let mut mock = MockPort::new();
        mock.write_all(b"t")
            .unwrap();
        mock.script(&[0x01, 0x02]);

        mock.clear_buffers()
            .unwrap();

        assert_eq!(mock.remaining(), 0);
        // The write log survives for assertions
        assert_eq!(mock.written(), b"t");
    }

    #[test]
    fn test_exhausted_script_times_out() {
        let mut mock = MockPort::new();
        let mut buf = [0u8; 1];
        let err = mock
            .read(&mut buf)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
