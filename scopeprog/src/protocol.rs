//! Wire protocol for the programmer firmware.
//!
//! Every request starts with a single ASCII opcode byte. Bulk commands
//! append a parameter block:
//!
//! ```text
//! +--------+------------+------------+----------------+
//! | Opcode | start_addr | size_words |    payload     |
//! +--------+------------+------------+----------------+
//! | 1 byte | 4 bytes LE | 4 bytes LE | size_words * 4 |
//! +--------+------------+------------+----------------+
//! ```
//!
//! `'t'`, `'i'` and `'e'` are bare opcodes with no parameter block. After a
//! read request the device streams `size_words * 4` raw bytes back; a write
//! request is followed by the same count going out. Addresses and sizes are
//! always little-endian. The diagnostic write pattern is the one exception:
//! its payload words are encoded big-endian.

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

/// Bytes per flash word. All protocol addresses and sizes count words.
pub const WORD_BYTES: u32 = 4;

/// Classic diagnostic payload for raw writes, mirrored halves.
pub const RAW_WRITE_PATTERN: [u32; 8] = [
    0x11223344, 0x55667788, 0x88776655, 0x44332211, 0x11223344, 0x55667788, 0x88776655, 0x44332211,
];

/// Command opcodes understood by the programmer firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// RAM test, device replies with per-chip error counters.
    Test = b't',
    /// Flash chip identification.
    Identify = b'i',
    /// Full-chip erase.
    Erase = b'e',
    /// Bulk read from flash.
    Read = b'r',
    /// Bulk write to flash.
    Write = b'w',
}

impl Opcode {
    /// Wire byte for this opcode.
    pub fn byte(self) -> u8 {
        self as u8
    }
}

/// Request frame builder.
#[derive(Debug)]
pub struct Request {
    op: Opcode,
    data: Vec<u8>,
}

impl Request {
    /// Create a bare request with no parameter block.
    pub fn bare(op: Opcode) -> Self {
        Self {
            op,
            data: Vec::new(),
        }
    }

    /// Create a windowed request: opcode followed by start address and
    /// word count, both little-endian.
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn window(op: Opcode, start_addr: u32, size_words: u32) -> Self {
        let mut req = Self::bare(op);
        req.data
            .write_u32::<LittleEndian>(start_addr)
            .unwrap();
        req.data
            .write_u32::<LittleEndian>(size_words)
            .unwrap();
        req
    }

    /// Create a RAM test request.
    pub fn test() -> Self {
        Self::bare(Opcode::Test)
    }

    /// Create a chip identification request.
    pub fn identify() -> Self {
        Self::bare(Opcode::Identify)
    }

    /// Create a full-chip erase request.
    pub fn erase() -> Self {
        Self::bare(Opcode::Erase)
    }

    /// Create a bulk read request for `size_words` words at `start_addr`.
    pub fn read(start_addr: u32, size_words: u32) -> Self {
        Self::window(Opcode::Read, start_addr, size_words)
    }

    /// Create a bulk write request for `size_words` words at `start_addr`.
    ///
    /// The image bytes themselves are streamed after the request.
    pub fn write(start_addr: u32, size_words: u32) -> Self {
        Self::window(Opcode::Write, start_addr, size_words)
    }

    /// Create a diagnostic write request carrying literal pattern words.
    ///
    /// Unlike the header fields, the payload words go out big-endian.
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    #[allow(clippy::cast_possible_truncation)]
    pub fn raw_write(start_addr: u32, words: &[u32]) -> Self {
        // Safe cast: diagnostic payloads are a handful of words
        let mut req = Self::window(Opcode::Write, start_addr, words.len() as u32);
        for word in words {
            req.data
                .write_u32::<BigEndian>(*word)
                .unwrap();
        }
        req
    }

    /// Build the complete frame.
    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + self.data.len());
        buf.push(self.op.byte());
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Get the opcode.
    pub fn opcode(&self) -> Opcode {
        self.op
    }
}

/// Decode a little-endian u16 (chip ID fields).
pub fn decode_u16_le(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}

/// Decode a little-endian u32 (RAM-test error counters).
pub fn decode_u32_le(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}

/// Format a response window as a hex dump: 16 bytes per line, each line
/// prefixed with the 8-hex-digit running address, starting at `start_addr`
/// and incrementing by 16 per line.
pub fn hex_dump(start_addr: u32, bytes: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in bytes
        .chunks(16)
        .enumerate()
    {
        if i > 0 {
            out.push('\n');
        }
        #[allow(clippy::cast_possible_truncation)]
        let addr = start_addr.wrapping_add((i * 16) as u32);
        out.push_str(&format!("{addr:08x}"));
        for byte in line {
            out.push_str(&format!(" {byte:02x}"));
        }
    }
    out
}
