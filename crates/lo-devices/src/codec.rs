//! Command/response exchange over a line channel
//!
//! Writes one encoded command and collects the reply with the timing-based
//! framing from [`lo_protocol::framing`]. There is no retry here; callers
//! decide what an empty or rejected reply means.

use std::fmt::Display;
use std::thread;
use std::time::Instant;

use lo_protocol::{EncodeCommand, FrameState, FramingConfig, Response, ResponseCollector};
use tracing::debug;

use crate::channel::LineChannel;
use crate::error::DeviceError;

/// Line-oriented command codec
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandCodec {
    framing: FramingConfig,
}

impl CommandCodec {
    /// Create a codec with the given reply timing
    pub fn new(framing: FramingConfig) -> Self {
        Self { framing }
    }

    /// Reply timing in use
    pub fn framing(&self) -> &FramingConfig {
        &self.framing
    }

    /// Send a command and collect its reply
    ///
    /// A device that stays silent for the whole timeout yields an empty
    /// response, not an error.
    pub fn send<C, M>(&self, channel: &mut C, command: &M) -> Result<Response, DeviceError>
    where
        C: LineChannel + ?Sized,
        M: EncodeCommand + Display,
    {
        channel.write_all(&command.encode())?;

        let mut collector = ResponseCollector::new(self.framing, Instant::now());
        while collector.state() != FrameState::Done {
            if channel.bytes_available()? > 0 {
                let line = channel.read_line()?;
                collector.push_line(&line, Instant::now());
            } else if collector.poll(Instant::now()) != FrameState::Done {
                thread::sleep(self.framing.poll_interval);
            }
        }

        let response = collector.finish();
        debug!("{} -> {}", command, response);
        Ok(response)
    }
}
