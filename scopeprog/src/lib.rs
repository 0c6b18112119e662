//! # scopeprog
//!
//! Host-side driver for the scope-meter flash-module programmer.
//!
//! The programmer is a small piece of service hardware that sits between a
//! host PC and the meter's flash module. It speaks a minimal serial
//! protocol: single ASCII opcode bytes, little-endian address/size fields,
//! and raw byte streams for bulk data. This crate provides:
//!
//! - A [`port::Port`] abstraction over the serial link
//! - The wire codec ([`protocol`]) for request frames and hex dumps
//! - Device profiles ([`profile`]) for the two module generations and two
//!   firmware revisions
//! - The command engine ([`programmer::Programmer`]) that drives one
//!   command per invocation: RAM test, chip identification, erase, bulk
//!   read/write, diagnostic raw read/write, and scope-meter metadata
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//!
//! ## Example
//!
//! ```rust,no_run
//! use scopeprog::{Command, DeviceProfile, NativePort, Programmer, SerialConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let port = NativePort::open(&SerialConfig::new("/dev/ttyUSB0", 115200))?;
//!     let mut programmer = Programmer::new(port, DeviceProfile::default());
//!
//!     let outcome = programmer.execute(
//!         Command::Test,
//!         &mut |_prompt| true,
//!         &mut |_transferred, _total| {},
//!     )?;
//!     println!("{outcome:?}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod port;
pub mod profile;
pub mod programmer;
pub mod protocol;

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    error::{Error, Result},
    port::{Port, PortEnumerator, PortInfo, SerialConfig},
    profile::{DeviceProfile, FirmwareRevision, FlashSize},
    programmer::{ChipId, Command, Outcome, Programmer},
    protocol::{Opcode, RAW_WRITE_PATTERN, Request, WORD_BYTES},
};
