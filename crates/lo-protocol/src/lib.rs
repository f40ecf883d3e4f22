//! LO Sweep Protocol Library
//!
//! This crate provides encoding and parsing for the two instruments on an
//! LO power sweep bench:
//!
//! - **Oscillator firmware**: newline-terminated single-letter commands
//!   (`s`, `f <MHz>`, `p <dBm>`, `r`, `a`) answered by free-form text lines
//!   with no terminator or checksum
//! - **tinySA shell**: `\r`-terminated commands, echoed by the device, whose
//!   replies end at the `ch> ` prompt and carry whitespace-separated floats
//!
//! # Architecture
//!
//! Nothing in this crate touches a port. The oscillator reply has no explicit
//! end marker, so [`framing::ResponseCollector`] decides where a reply ends
//! from timestamps handed to it by the caller. The I/O layer drives it from a
//! real or simulated channel.
//!
//! # Example
//!
//! ```rust
//! use lo_protocol::oscillator::{OscillatorCommand, SetOutcome, StatusReport};
//! use lo_protocol::{EncodeCommand, Response};
//!
//! let cmd = OscillatorCommand::SetFrequency { mhz: 925.0 };
//! assert_eq!(cmd.encode(), b"f 925.000\n");
//!
//! let reply = Response::new(vec!["Freq: 925.000 MHz".into(), "Power: +5 dBm".into()]);
//! assert_eq!(SetOutcome::classify(&reply, cmd.ack_tokens()), SetOutcome::Confirmed);
//!
//! let status = StatusReport::parse(&reply);
//! assert_eq!(status.power_dbm, Some(5));
//! ```

pub mod error;
pub mod framing;
pub mod oscillator;
pub mod setting;
pub mod spectrum;

pub use error::ParseError;
pub use framing::{FrameState, FramingConfig, Response, ResponseCollector};
pub use oscillator::{OscillatorCommand, SetOutcome, StatusReport};
pub use setting::AutoValue;
pub use spectrum::{AveragingMode, Peak, ScanBuffer, ScanWindow, SpectrumCommand};

/// Trait for commands that can be encoded to bytes
pub trait EncodeCommand {
    /// Encode this command to its wire format, terminator included
    fn encode(&self) -> Vec<u8>;
}
