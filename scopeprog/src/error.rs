//! Error types for scopeprog.

use std::io;
use thiserror::Error;

/// Result type for scopeprog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for scopeprog operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, image file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Communication timeout. The programmer echoes nothing on its own, so a
    /// short read means the device stopped answering.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Image file read/write failed mid-transfer.
    #[error("Image I/O error: {0}")]
    Image(#[source] io::Error),

    /// Requested flash window does not fit the selected module.
    #[error("Range {addr:#010x}+{words} words exceeds flash capacity of {limit} words")]
    Range {
        /// First word address of the rejected window.
        addr: u32,
        /// Word count of the rejected window.
        words: u32,
        /// Capacity of the selected module, in words.
        limit: u32,
    },

    /// Operation not available on the selected device profile.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}
