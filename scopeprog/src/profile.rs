//! Device profiles for the supported programmer module revisions.
//!
//! Two axes distinguish the hardware in the field. The flash chips grew
//! from 8 Mbit to 16 Mbit parts between module generations, and the
//! earlier firmware revision additionally exposes a dual-chip RAM test
//! and the scope-meter metadata window. The two axes are orthogonal;
//! neither changes the wire framing, only size defaults and which
//! commands are legal.

use crate::error::{Error, Result};
use crate::protocol::WORD_BYTES;
use std::fmt;

/// Word address of the scope-meter model string.
pub const METER_MODEL_ADDR: u32 = 0x201a;

/// Length of the model string window, in words.
pub const METER_MODEL_WORDS: u32 = 1;

/// Word address of the scope-meter serial number.
pub const METER_SERIAL_ADDR: u32 = 0x2022;

/// Length of the serial number window, in words.
pub const METER_SERIAL_WORDS: u32 = 2;

/// Per-chip flash capacity across the two module generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlashSize {
    /// 8 Mbit chips (current modules).
    #[default]
    Mbit8,
    /// 16 Mbit chips (older modules).
    Mbit16,
}

impl FlashSize {
    /// Total flash capacity of the module, in words.
    #[must_use]
    pub fn flash_words(self) -> u32 {
        match self {
            Self::Mbit8 => 512 * 1024,
            Self::Mbit16 => 1024 * 1024,
        }
    }
}

impl fmt::Display for FlashSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mbit8 => write!(f, "8 Mbit"),
            Self::Mbit16 => write!(f, "16 Mbit"),
        }
    }
}

/// Programmer firmware revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FirmwareRevision {
    /// Earlier revision: dual-chip diagnostics plus scope-meter metadata.
    #[default]
    V1,
    /// Later revision: single-chip diagnostics, no metadata window.
    V2,
}

impl FirmwareRevision {
    /// Number of chips reported by the RAM test and identification replies.
    #[must_use]
    pub fn chip_count(self) -> usize {
        match self {
            Self::V1 => 2,
            Self::V2 => 1,
        }
    }

    /// Whether the scope-meter model/serial window can be read.
    pub fn has_scopemeter_info(self) -> bool {
        matches!(self, Self::V1)
    }
}

impl fmt::Display for FirmwareRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "V1"),
            Self::V2 => write!(f, "V2"),
        }
    }
}

/// Capability and parameter set for one device, selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceProfile {
    /// Flash chip generation.
    pub size: FlashSize,
    /// Firmware revision.
    pub revision: FirmwareRevision,
}

impl DeviceProfile {
    /// Create a profile for the given chip generation and firmware revision.
    pub fn new(size: FlashSize, revision: FirmwareRevision) -> Self {
        Self { size, revision }
    }

    /// Total flash capacity, in words.
    #[must_use]
    pub fn flash_words(&self) -> u32 {
        self.size
            .flash_words()
    }

    /// Total flash capacity, in bytes.
    #[must_use]
    pub fn flash_bytes(&self) -> u64 {
        u64::from(self.flash_words()) * u64::from(WORD_BYTES)
    }

    /// Bytes per word.
    #[must_use]
    pub fn word_bytes(&self) -> u32 {
        WORD_BYTES
    }

    /// Number of chips in diagnostic replies.
    #[must_use]
    pub fn chip_count(&self) -> usize {
        self.revision
            .chip_count()
    }

    /// Whether the scope-meter metadata window can be read.
    pub fn has_scopemeter_info(&self) -> bool {
        self.revision
            .has_scopemeter_info()
    }

    /// Reject windows that do not fit the flash, without wrapping 32-bit
    /// arithmetic. The device itself does no bound check.
    pub fn check_range(&self, start_addr: u32, size_words: u32) -> Result<()> {
        let limit = self.flash_words();
        match start_addr.checked_add(size_words) {
            Some(end) if end <= limit => Ok(()),
            _ => Err(Error::Range {
                addr: start_addr,
                words: size_words,
                limit,
            }),
        }
    }
}
