//! Spectrum analyzer command link
//!
//! [`SpectrumInstrument`] executes one shell command and hands back the
//! payload bytes. [`TinySa`] implements it over a line channel using the
//! echo/prompt framing of the tinySA shell.

use std::io;
use std::time::Duration;

use lo_protocol::spectrum::{unwrap_shell_reply, SHELL_PROMPT};
use lo_protocol::{EncodeCommand, SpectrumCommand};
use tracing::{debug, trace};

use crate::channel::{LineChannel, SerialChannel};
use crate::error::DeviceError;

/// Baud rate of the tinySA USB CDC port
pub const DEFAULT_ANALYZER_BAUD: u32 = 115_200;

/// Read timeout for one shell reply
pub const DEFAULT_ANALYZER_TIMEOUT: Duration = Duration::from_secs(5);

const DEVICE: &str = "tinySA";

/// Executes analyzer commands and returns their raw payload
pub trait SpectrumInstrument {
    /// Run one command; the payload excludes echo and prompt
    fn execute(&mut self, command: &SpectrumCommand) -> Result<Vec<u8>, DeviceError>;
}

impl<I: SpectrumInstrument + ?Sized> SpectrumInstrument for Box<I> {
    fn execute(&mut self, command: &SpectrumCommand) -> Result<Vec<u8>, DeviceError> {
        (**self).execute(command)
    }
}

/// tinySA shell over a line channel
pub struct TinySa<C: LineChannel> {
    channel: C,
}

impl TinySa<SerialChannel> {
    /// Open the analyzer's serial port
    pub fn open(path: &str, timeout: Duration) -> Result<Self, DeviceError> {
        let channel = SerialChannel::open(path, DEFAULT_ANALYZER_BAUD, timeout)?;
        Self::new(channel)
    }
}

impl<C: LineChannel> TinySa<C> {
    /// Wrap a channel, discarding anything the shell printed before
    pub fn new(mut channel: C) -> Result<Self, DeviceError> {
        channel.clear_input()?;
        Ok(Self { channel })
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}

impl<C: LineChannel> SpectrumInstrument for TinySa<C> {
    fn execute(&mut self, command: &SpectrumCommand) -> Result<Vec<u8>, DeviceError> {
        let text = command.text();
        self.channel.write_all(&command.encode())?;

        let raw = match self.channel.read_until(SHELL_PROMPT) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                debug!("{} read gave up: {}", text, e);
                Vec::new()
            }
            read => read?,
        };
        trace!("tinySA reply to {:?}: {} bytes", text, raw.len());
        if !raw.ends_with(SHELL_PROMPT) {
            return Err(DeviceError::Timeout {
                device: DEVICE,
                command: text,
            });
        }

        let payload = unwrap_shell_reply(&text, &raw);
        debug!("{} -> {} payload bytes", text, payload.len());
        Ok(payload)
    }
}
