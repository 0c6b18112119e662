//! Command engine for the programmer protocol.
//!
//! One [`Programmer`] owns the port for exactly one command execution. The
//! engine sequences the request/response exchange, streams bulk data one
//! byte at a time (the firmware only ever has a single response byte
//! buffered), and reports progress once per 16 KiB transferred.
//!
//! Destructive commands (erase, write) are gated behind an injected
//! confirmation hook; the engine never prompts on its own.
//!
//! ## Example
//!
//! ```rust,no_run
//! use scopeprog::port::{NativePort, SerialConfig};
//! use scopeprog::profile::DeviceProfile;
//! use scopeprog::programmer::{Command, Programmer};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let port = NativePort::open(&SerialConfig::new("/dev/ttyUSB0", 115200))?;
//!     let mut programmer = Programmer::new(port, DeviceProfile::default());
//!
//!     let outcome = programmer.execute(
//!         Command::Identify,
//!         &mut |_prompt| true,
//!         &mut |_transferred, _total| {},
//!     )?;
//!     println!("{outcome:?}");
//!
//!     Ok(())
//! }
//! ```

use std::io::{self, Read, Write};

use log::{debug, info, trace};

use crate::error::{Error, Result};
use crate::port::Port;
use crate::profile::{
    DeviceProfile, METER_MODEL_ADDR, METER_MODEL_WORDS, METER_SERIAL_ADDR, METER_SERIAL_WORDS,
};
use crate::protocol::{Request, WORD_BYTES, hex_dump};

/// Bytes between two progress ticks during bulk transfer.
pub const PROGRESS_CHUNK: u64 = 16 * 1024;

/// Word count of the diagnostic read window.
pub const RAW_READ_WORDS: u32 = 64;

/// Word address the diagnostic write pattern lands at.
pub const RAW_WRITE_ADDR: u32 = 1;

/// Prompt shown before a standalone erase.
pub const ERASE_PROMPT: &str = "erase FLASH (y/n): ";

/// Prompt shown before a write (which erases first).
pub const WRITE_PROMPT: &str = "write FLASH (y/n): ";

/// One command to run against the device.
///
/// Bulk transfers borrow their byte sink/source; the engine treats both as
/// opaque streams and never seeks.
pub enum Command<'a> {
    /// RAM test; the device replies with per-chip error counters.
    Test,
    /// Read manufacturer and device IDs of the flash chips.
    Identify,
    /// Full-chip erase. Destructive, confirmation-gated.
    Erase,
    /// Dump a flash window into `sink`.
    Read {
        /// First word address.
        start_addr: u32,
        /// Window length in words.
        size_words: u32,
        /// Receives the raw bytes in device order.
        sink: &'a mut dyn Write,
    },
    /// Program a flash window from `source`. Destructive, confirmation-gated;
    /// always erases the whole chip first.
    Write {
        /// First word address.
        start_addr: u32,
        /// Window length in words.
        size_words: u32,
        /// Supplies exactly `size_words * 4` bytes.
        source: &'a mut dyn Read,
    },
    /// Diagnostic read of a fixed 64-word window, rendered as a hex dump.
    RawRead {
        /// First word address.
        start_addr: u32,
    },
    /// Diagnostic write of literal words, encoded big-endian on the wire.
    RawWrite {
        /// First word address.
        start_addr: u32,
        /// Pattern words, sent verbatim.
        words: &'a [u32],
    },
    /// Read the scope-meter model and serial-number strings (V1 firmware).
    ScopeMeterInfo,
}

impl Command<'_> {
    /// Human-readable command name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Identify => "identify",
            Self::Erase => "erase",
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::RawRead { .. } => "raw read",
            Self::RawWrite { .. } => "raw write",
            Self::ScopeMeterInfo => "scope-meter info",
        }
    }
}

/// Identification reply for one flash chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipId {
    /// JEDEC manufacturer ID.
    pub manufacturer: u16,
    /// Device ID.
    pub device: u16,
}

/// Result of one executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The user declined the confirmation prompt; nothing was sent.
    Declined,
    /// RAM-test error counters, one per chip.
    TestErrors(Vec<u32>),
    /// Chip identification, one entry per chip.
    ChipIds(Vec<ChipId>),
    /// Full-chip erase completed.
    Erased,
    /// Bulk read completed.
    Read {
        /// Bytes delivered to the sink.
        bytes: u64,
    },
    /// Bulk write completed (after the implied erase).
    Written {
        /// Bytes streamed to the device.
        bytes: u64,
    },
    /// Rendered hex dump of the diagnostic window.
    RawRead {
        /// 16 bytes per line, address-prefixed.
        dump: String,
    },
    /// Diagnostic pattern written.
    RawWritten {
        /// Number of pattern words sent.
        words: usize,
    },
    /// Scope-meter metadata strings.
    ScopeMeter {
        /// Model string, NULs stripped.
        model: String,
        /// Serial number, NULs stripped.
        serial: String,
    },
}

/// Protocol engine bound to one open port and one device profile.
///
/// Generic over the port type `P` so the same engine drives real hardware
/// and scripted test ports.
pub struct Programmer<P: Port> {
    port: P,
    profile: DeviceProfile,
}

impl<P: Port> Programmer<P> {
    /// Create an engine over an opened port.
    pub fn new(port: P, profile: DeviceProfile) -> Self {
        Self { port, profile }
    }

    /// The device profile this engine was built with.
    pub fn profile(&self) -> DeviceProfile {
        self.profile
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Run one command to completion.
    ///
    /// `confirm` is consulted before destructive commands with the exact
    /// prompt text; returning `false` aborts with [`Outcome::Declined`]
    /// before any byte reaches the wire. `progress` receives
    /// `(transferred, total)` byte counts once per 16 KiB of bulk data and
    /// once more for a trailing partial block.
    pub fn execute(
        &mut self,
        command: Command<'_>,
        confirm: &mut dyn FnMut(&str) -> bool,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<Outcome> {
        debug!(
            "Executing {} command on {}",
            command.name(),
            self.port
                .name()
        );

        match command {
            Command::Test => self.cmd_test(),
            Command::Identify => self.cmd_identify(),
            Command::Erase => {
                if !confirm(ERASE_PROMPT) {
                    info!("Erase declined, nothing sent");
                    return Ok(Outcome::Declined);
                }
                self.erase_exchange()?;
                Ok(Outcome::Erased)
            },
            Command::Read {
                start_addr,
                size_words,
                sink,
            } => self.cmd_read(start_addr, size_words, sink, progress),
            Command::Write {
                start_addr,
                size_words,
                source,
            } => {
                if !confirm(WRITE_PROMPT) {
                    info!("Write declined, nothing sent");
                    return Ok(Outcome::Declined);
                }
                self.cmd_write(start_addr, size_words, source, progress)
            },
            Command::RawRead { start_addr } => self.cmd_raw_read(start_addr),
            Command::RawWrite { start_addr, words } => self.cmd_raw_write(start_addr, words),
            Command::ScopeMeterInfo => self.cmd_scopemeter(),
        }
    }

    /// RAM test: bare opcode, one LE u32 error counter per chip.
    fn cmd_test(&mut self) -> Result<Outcome> {
        info!("Running RAM test ({} chips)", self.profile.chip_count());
        self.send(&Request::test())?;

        let mut errors = Vec::with_capacity(self.profile.chip_count());
        for _ in 0..self.profile.chip_count() {
            errors.push(self.read_u32_le()?);
        }
        Ok(Outcome::TestErrors(errors))
    }

    /// Identification: bare opcode, manufacturer IDs for all chips first,
    /// then device IDs, all LE u16.
    fn cmd_identify(&mut self) -> Result<Outcome> {
        info!("Reading chip IDs");
        self.send(&Request::identify())?;

        let chips = self.profile.chip_count();
        let mut manufacturers = Vec::with_capacity(chips);
        for _ in 0..chips {
            manufacturers.push(self.read_u16_le()?);
        }
        let mut ids = Vec::with_capacity(chips);
        for manufacturer in manufacturers {
            ids.push(ChipId {
                manufacturer,
                device: self.read_u16_le()?,
            });
        }
        Ok(Outcome::ChipIds(ids))
    }

    fn cmd_read(
        &mut self,
        start_addr: u32,
        size_words: u32,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<Outcome> {
        self.profile
            .check_range(start_addr, size_words)?;

        info!("Reading {size_words} words from {start_addr:#010x}");
        self.send(&Request::read(start_addr, size_words))?;

        let total = u64::from(size_words) * u64::from(WORD_BYTES);
        let mut byte = [0u8; 1];
        let mut transferred = 0u64;
        while transferred < total {
            self.read_device(&mut byte)?;
            sink.write_all(&byte)
                .map_err(Error::Image)?;
            transferred += 1;
            if transferred % PROGRESS_CHUNK == 0 {
                progress(transferred, total);
            }
        }
        if total % PROGRESS_CHUNK != 0 {
            progress(total, total);
        }

        debug!("Read complete: {total} bytes");
        Ok(Outcome::Read { bytes: total })
    }

    /// Write always erases the whole chip first; the protocol has no
    /// partial-sector erase.
    fn cmd_write(
        &mut self,
        start_addr: u32,
        size_words: u32,
        source: &mut dyn Read,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<Outcome> {
        self.profile
            .check_range(start_addr, size_words)?;

        self.erase_exchange()?;

        info!("Writing {size_words} words at {start_addr:#010x}");
        self.send(&Request::write(start_addr, size_words))?;

        let total = u64::from(size_words) * u64::from(WORD_BYTES);
        let mut byte = [0u8; 1];
        let mut transferred = 0u64;
        while transferred < total {
            source
                .read_exact(&mut byte)
                .map_err(Error::Image)?;
            self.port
                .write_all(&byte)?;
            transferred += 1;
            if transferred % PROGRESS_CHUNK == 0 {
                progress(transferred, total);
            }
        }
        self.port
            .flush()?;
        if total % PROGRESS_CHUNK != 0 {
            progress(total, total);
        }

        debug!("Write complete: {total} bytes");
        Ok(Outcome::Written { bytes: total })
    }

    fn cmd_raw_read(&mut self, start_addr: u32) -> Result<Outcome> {
        let bytes = self.read_window(start_addr, RAW_READ_WORDS)?;
        Ok(Outcome::RawRead {
            dump: hex_dump(start_addr, &bytes),
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cmd_raw_write(&mut self, start_addr: u32, words: &[u32]) -> Result<Outcome> {
        // Safe cast: diagnostic payloads are a handful of words
        self.profile
            .check_range(start_addr, words.len() as u32)?;

        info!(
            "Writing {} diagnostic words at {start_addr:#010x}",
            words.len()
        );
        self.send(&Request::raw_write(start_addr, words))?;
        Ok(Outcome::RawWritten { words: words.len() })
    }

    /// Two silent read exchanges against the fixed metadata windows.
    fn cmd_scopemeter(&mut self) -> Result<Outcome> {
        if !self
            .profile
            .has_scopemeter_info()
        {
            return Err(Error::Unsupported(
                "scope-meter metadata requires V1 firmware".into(),
            ));
        }

        info!("Reading scope-meter metadata");
        let model = self.read_window(METER_MODEL_ADDR, METER_MODEL_WORDS)?;
        let serial = self.read_window(METER_SERIAL_ADDR, METER_SERIAL_WORDS)?;

        Ok(Outcome::ScopeMeter {
            model: decode_padded_ascii(&model),
            serial: decode_padded_ascii(&serial),
        })
    }

    /// Send `'e'` and block on the single completion byte. Erase is the
    /// slowest exchange; the port timeout is the only bound on the wait.
    fn erase_exchange(&mut self) -> Result<()> {
        info!("Erasing flash (this can take a while)");
        self.send(&Request::erase())?;

        // Completion sentinel, value ignored
        let mut ack = [0u8; 1];
        self.read_device(&mut ack)?;
        debug!("Erase complete");
        Ok(())
    }

    /// One windowed read exchange without progress reporting, used for the
    /// small diagnostic and metadata windows.
    fn read_window(&mut self, start_addr: u32, size_words: u32) -> Result<Vec<u8>> {
        self.profile
            .check_range(start_addr, size_words)?;

        debug!("Reading {size_words} words at {start_addr:#010x}");
        self.send(&Request::read(start_addr, size_words))?;

        let total = (size_words * WORD_BYTES) as usize;
        let mut bytes = Vec::with_capacity(total);
        let mut byte = [0u8; 1];
        for _ in 0..total {
            self.read_device(&mut byte)?;
            bytes.push(byte[0]);
        }
        Ok(bytes)
    }

    fn send(&mut self, request: &Request) -> Result<()> {
        let frame = request.build();
        trace!(
            "Sending {:?} frame: {} bytes",
            request.opcode(),
            frame.len()
        );
        self.port
            .write_all(&frame)?;
        self.port
            .flush()?;
        Ok(())
    }

    /// Read exactly `buf.len()` bytes. A short read is fatal: the protocol
    /// has no resynchronization point.
    fn read_device(&mut self, buf: &mut [u8]) -> Result<()> {
        let window = self
            .port
            .timeout();
        self.port
            .read_exact(buf)
            .map_err(|e| match e.kind() {
                io::ErrorKind::TimedOut | io::ErrorKind::UnexpectedEof => Error::Timeout(format!(
                    "device stopped answering within {window:?} (wanted {} more bytes)",
                    buf.len()
                )),
                _ => Error::Io(e),
            })
    }

    fn read_u16_le(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_device(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_device(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

/// Decode a NUL-padded ASCII field, dropping the padding.
fn decode_padded_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|&&b| b != 0)
        .map(|&b| char::from(b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;
    use crate::profile::{FirmwareRevision, FlashSize};

    fn programmer(revision: FirmwareRevision) -> Programmer<MockPort> {
        let profile = DeviceProfile::new(FlashSize::Mbit8, revision);
        Programmer::new(MockPort::new(), profile)
    }

    fn yes() -> impl FnMut(&str) -> bool {
        |_| true
    }

    fn no() -> impl FnMut(&str) -> bool {
        |_| false
    }

    fn no_progress() -> impl FnMut(u64, u64) {
        |_, _| {}
    }

    #[test]
    fn test_ram_test_dual_chip() {
        let mut p = programmer(FirmwareRevision::V1);
        p.port.script(&[3, 0, 0, 0, 0x10, 0x00, 0x01, 0x00]);

        let outcome = p
            .execute(Command::Test, &mut yes(), &mut no_progress())
            .unwrap();

        assert_eq!(outcome, Outcome::TestErrors(vec![3, 0x10010]));
        assert_eq!(p.port().written(), b"t");
    }

    #[test]
    fn test_ram_test_single_chip() {
        let mut p = programmer(FirmwareRevision::V2);
        p.port.script(&[0, 0, 0, 0]);

        let outcome = p
            .execute(Command::Test, &mut yes(), &mut no_progress())
            .unwrap();

        assert_eq!(outcome, Outcome::TestErrors(vec![0]));
        // Only 4 bytes expected on single-chip firmware
        assert_eq!(p.port().remaining(), 0);
    }

    #[test]
    fn test_identify_dual_chip() {
        let mut p = programmer(FirmwareRevision::V1);
        // Manufacturer IDs first (both chips), then device IDs
        p.port
            .script(&[0x89, 0x00, 0x89, 0x00, 0x5d, 0xbf, 0x5d, 0xbf]);

        let outcome = p
            .execute(Command::Identify, &mut yes(), &mut no_progress())
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::ChipIds(vec![
                ChipId {
                    manufacturer: 0x0089,
                    device: 0xbf5d
                },
                ChipId {
                    manufacturer: 0x0089,
                    device: 0xbf5d
                },
            ])
        );
        assert_eq!(p.port().written(), b"i");
    }

    #[test]
    fn test_identify_single_chip() {
        let mut p = programmer(FirmwareRevision::V2);
        p.port.script(&[0x89, 0x00, 0x5d, 0xbf]);

        let outcome = p
            .execute(Command::Identify, &mut yes(), &mut no_progress())
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::ChipIds(vec![ChipId {
                manufacturer: 0x0089,
                device: 0xbf5d
            }])
        );
    }

    #[test]
    fn test_erase_waits_for_sentinel() {
        let mut p = programmer(FirmwareRevision::V1);
        p.port.script(&[0xff]);

        let mut prompts = Vec::new();
        let outcome = p
            .execute(
                Command::Erase,
                &mut |prompt: &str| {
                    prompts.push(prompt.to_string());
                    true
                },
                &mut no_progress(),
            )
            .unwrap();

        assert_eq!(outcome, Outcome::Erased);
        assert_eq!(prompts, vec!["erase FLASH (y/n): "]);
        assert_eq!(p.port().written(), b"e");
        assert_eq!(p.port().remaining(), 0);
    }

    #[test]
    fn test_erase_declined_sends_nothing() {
        let mut p = programmer(FirmwareRevision::V1);

        let outcome = p
            .execute(Command::Erase, &mut no(), &mut no_progress())
            .unwrap();

        assert_eq!(outcome, Outcome::Declined);
        assert!(p.port().written().is_empty());
    }

    #[test]
    fn test_read_streams_to_sink() {
        let mut p = programmer(FirmwareRevision::V1);
        let data: Vec<u8> = (0..20).collect();
        p.port.script(&data);

        let mut sink = Vec::new();
        let mut ticks = Vec::new();
        let outcome = p
            .execute(
                Command::Read {
                    start_addr: 0x100,
                    size_words: 5,
                    sink: &mut sink,
                },
                &mut yes(),
                &mut |transferred, total| ticks.push((transferred, total)),
            )
            .unwrap();

        assert_eq!(outcome, Outcome::Read { bytes: 20 });
        assert_eq!(sink, data);
        // One trailing partial tick for sub-16 KiB transfers
        assert_eq!(ticks, vec![(20, 20)]);

        let written = p.port().written();
        assert_eq!(written[0], b'r');
        assert_eq!(&written[1..5], &[0x00, 0x01, 0x00, 0x00]);
        assert_eq!(&written[5..9], &[0x05, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_full_chip_read_tick_cadence() {
        let mut p = programmer(FirmwareRevision::V1);
        let total = 512 * 1024 * 4;
        let data: Vec<u8> = (0..total)
            .map(|i| (i % 256) as u8)
            .collect();
        p.port.script(&data);

        let mut sink = Vec::new();
        let mut ticks = 0u32;
        let outcome = p
            .execute(
                Command::Read {
                    start_addr: 0,
                    size_words: 512 * 1024,
                    sink: &mut sink,
                },
                &mut yes(),
                &mut |_, _| ticks += 1,
            )
            .unwrap();

        assert_eq!(outcome, Outcome::Read { bytes: 2_097_152 });
        assert_eq!(sink.len(), 2_097_152);
        assert_eq!(sink[0], 0x00);
        assert_eq!(sink[1], 0x01);
        assert_eq!(sink[255], 0xff);
        assert_eq!(sink[256], 0x00);
        // 2 MiB / 16 KiB, no trailing partial block
        assert_eq!(ticks, 128);
    }

    #[test]
    fn test_read_short_reply_is_timeout() {
        let mut p = programmer(FirmwareRevision::V1);
        p.port.script(&[0xaa; 7]);

        let mut sink = Vec::new();
        let err = p
            .execute(
                Command::Read {
                    start_addr: 0,
                    size_words: 2,
                    sink: &mut sink,
                },
                &mut yes(),
                &mut no_progress(),
            )
            .unwrap_err();

        assert!(matches!(err, Error::Timeout(_)));
        // Whatever arrived before the timeout stays in the sink
        assert_eq!(sink.len(), 7);
    }

    #[test]
    fn test_timeout_error_names_the_configured_window() {
        let mut p = programmer(FirmwareRevision::V1);
        // No scripted reply: the sentinel read after 'e' never arrives

        let err = p
            .execute(Command::Erase, &mut yes(), &mut no_progress())
            .unwrap_err();

        assert!(
            err.to_string()
                .contains("20s"),
            "timeout message should carry the port's window: {err}"
        );
    }

    #[test]
    fn test_read_out_of_range_sends_nothing() {
        let mut p = programmer(FirmwareRevision::V1);

        let mut sink = Vec::new();
        let err = p
            .execute(
                Command::Read {
                    start_addr: 512 * 1024,
                    size_words: 1,
                    sink: &mut sink,
                },
                &mut yes(),
                &mut no_progress(),
            )
            .unwrap_err();

        assert!(matches!(err, Error::Range { .. }));
        assert!(p.port().written().is_empty());
    }

    #[test]
    fn test_write_erases_first() {
        let mut p = programmer(FirmwareRevision::V1);
        p.port.script(&[0x00]); // erase completion sentinel

        let image = [0xaa, 0xbb, 0xcc, 0xdd];
        let mut source: &[u8] = &image;
        let mut prompts = Vec::new();
        let outcome = p
            .execute(
                Command::Write {
                    start_addr: 0,
                    size_words: 1,
                    source: &mut source,
                },
                &mut |prompt: &str| {
                    prompts.push(prompt.to_string());
                    true
                },
                &mut no_progress(),
            )
            .unwrap();

        assert_eq!(outcome, Outcome::Written { bytes: 4 });
        // One prompt covers both the erase and the write
        assert_eq!(prompts, vec!["write FLASH (y/n): "]);

        let written = p.port().written();
        assert_eq!(written[0], b'e');
        assert_eq!(written[1], b'w');
        assert_eq!(&written[2..6], &[0x00, 0x00, 0x00, 0x00]);
        assert_eq!(&written[6..10], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&written[10..], &image);
    }

    #[test]
    fn test_write_declined_sends_nothing() {
        let mut p = programmer(FirmwareRevision::V1);

        let mut source: &[u8] = &[0u8; 4];
        let outcome = p
            .execute(
                Command::Write {
                    start_addr: 0,
                    size_words: 1,
                    source: &mut source,
                },
                &mut no(),
                &mut no_progress(),
            )
            .unwrap();

        assert_eq!(outcome, Outcome::Declined);
        assert!(p.port().written().is_empty());
    }

    #[test]
    fn test_write_short_image_is_image_error() {
        let mut p = programmer(FirmwareRevision::V1);
        p.port.script(&[0x00]);

        let mut source: &[u8] = &[0u8; 3]; // one byte short of a word
        let err = p
            .execute(
                Command::Write {
                    start_addr: 0,
                    size_words: 1,
                    source: &mut source,
                },
                &mut yes(),
                &mut no_progress(),
            )
            .unwrap_err();

        assert!(matches!(err, Error::Image(_)));
    }

    #[test]
    fn test_raw_read_dump() {
        let mut p = programmer(FirmwareRevision::V1);
        let data: Vec<u8> = (0..=255).collect();
        p.port.script(&data);

        let outcome = p
            .execute(
                Command::RawRead { start_addr: 0 },
                &mut yes(),
                &mut no_progress(),
            )
            .unwrap();

        let Outcome::RawRead { dump } = outcome else {
            panic!("expected a hex dump");
        };
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 16);
        assert_eq!(
            lines[0],
            "00000000 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f"
        );
        assert!(lines[15].starts_with("000000f0 "));

        // 64-word window requested
        let written = p.port().written();
        assert_eq!(written[0], b'r');
        assert_eq!(&written[5..9], &[64, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_raw_write_pattern_frame() {
        let mut p = programmer(FirmwareRevision::V1);

        let outcome = p
            .execute(
                Command::RawWrite {
                    start_addr: RAW_WRITE_ADDR,
                    words: &crate::protocol::RAW_WRITE_PATTERN,
                },
                &mut yes(),
                &mut no_progress(),
            )
            .unwrap();

        assert_eq!(outcome, Outcome::RawWritten { words: 8 });

        let written = p.port().written();
        assert_eq!(written.len(), 1 + 4 + 4 + 32);
        assert_eq!(written[0], b'w');
        assert_eq!(&written[1..5], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&written[5..9], &[0x08, 0x00, 0x00, 0x00]);
        // Pattern words are big-endian on the wire
        assert_eq!(&written[9..13], &[0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_scopemeter_metadata() {
        let mut p = programmer(FirmwareRevision::V1);
        // Model window (1 word), then serial window (2 words), NUL-padded
        p.port.script(b"123B");
        p.port.script(b"DM44910\0");

        let outcome = p
            .execute(Command::ScopeMeterInfo, &mut yes(), &mut no_progress())
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::ScopeMeter {
                model: "123B".into(),
                serial: "DM44910".into(),
            }
        );

        // Two windowed read requests back to back
        let written = p.port().written();
        assert_eq!(written.len(), 18);
        assert_eq!(written[0], b'r');
        assert_eq!(&written[1..5], &[0x1a, 0x20, 0x00, 0x00]);
        assert_eq!(&written[5..9], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(written[9], b'r');
        assert_eq!(&written[10..14], &[0x22, 0x20, 0x00, 0x00]);
        assert_eq!(&written[14..18], &[0x02, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_scopemeter_unsupported_on_v2() {
        let mut p = programmer(FirmwareRevision::V2);

        let err = p
            .execute(Command::ScopeMeterInfo, &mut yes(), &mut no_progress())
            .unwrap_err();

        assert!(matches!(err, Error::Unsupported(_)));
        assert!(p.port().written().is_empty());
    }

    #[test]
    fn test_decode_padded_ascii() {
        assert_eq!(decode_padded_ascii(b"105B"), "105B");
        assert_eq!(decode_padded_ascii(b"DM\x0012\x00\x00"), "DM12");
        assert_eq!(decode_padded_ascii(&[0, 0, 0, 0]), "");
    }
}
