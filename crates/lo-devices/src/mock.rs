//! Scripted test doubles for the channel and instrument seams

use std::collections::VecDeque;
use std::io::{self, Read};
use std::thread;
use std::time::{Duration, Instant};

use lo_protocol::SpectrumCommand;

use crate::channel::{find_terminator, read_until_deadline, LineChannel};
use crate::error::DeviceError;
use crate::instrument::SpectrumInstrument;

/// Channel that answers each write with the next scripted reply
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    replies: VecDeque<Vec<u8>>,
    inbound: Vec<u8>,
    written: Vec<Vec<u8>>,
    fail_writes: bool,
    clears: usize,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the reply to the next write
    pub fn reply(&mut self, bytes: &[u8]) -> &mut Self {
        self.replies.push_back(bytes.to_vec());
        self
    }

    /// Bytes already waiting before the first write
    pub fn preload(&mut self, bytes: &[u8]) {
        self.inbound.extend_from_slice(bytes);
    }

    pub fn fail_writes(&mut self) {
        self.fail_writes = true;
    }

    pub fn written(&self) -> &[Vec<u8>] {
        &self.written
    }

    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl LineChannel for ScriptedChannel {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        }
        self.written.push(data.to_vec());
        if let Some(reply) = self.replies.pop_front() {
            self.inbound.extend_from_slice(&reply);
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.inbound.len())
    }

    fn read_until(&mut self, terminator: &[u8]) -> io::Result<Vec<u8>> {
        let end = find_terminator(&self.inbound, terminator).unwrap_or(self.inbound.len());
        Ok(self.inbound.drain(..end).collect())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.clears += 1;
        self.inbound.clear();
        Ok(())
    }
}

/// Port side of [`TrickleChannel`]: bytes due at fixed instants
#[derive(Debug)]
struct TricklePort {
    inbound: VecDeque<(Instant, Vec<u8>)>,
    read_timeout: Duration,
}

impl TricklePort {
    fn arrived(&self, now: Instant) -> usize {
        self.inbound
            .iter()
            .filter(|(due, _)| *due <= now)
            .map(|(_, bytes)| bytes.len())
            .sum()
    }
}

impl Read for TricklePort {
    /// Blocks like a serial read: until the next chunk lands or the read
    /// timeout passes
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let now = Instant::now();
        let due = match self.inbound.front() {
            Some((due, _)) if *due <= now + self.read_timeout => *due,
            _ => {
                thread::sleep(self.read_timeout);
                return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
            }
        };
        thread::sleep(due.saturating_duration_since(now));

        let Some((due, mut bytes)) = self.inbound.pop_front() else {
            return Ok(0);
        };
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        if n < bytes.len() {
            bytes.drain(..n);
            self.inbound.push_front((due, bytes));
        }
        Ok(n)
    }
}

/// Channel whose replies arrive in bursts spread over time
#[derive(Debug)]
pub struct TrickleChannel {
    port: TricklePort,
    pending: Vec<u8>,
    replies: VecDeque<Vec<(Duration, Vec<u8>)>>,
}

impl TrickleChannel {
    /// `read_timeout` plays the role of the serial port timeout
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            port: TricklePort {
                inbound: VecDeque::new(),
                read_timeout,
            },
            pending: Vec::new(),
            replies: VecDeque::new(),
        }
    }

    /// Queue the reply to the next write as bursts, each `delay` after the write
    pub fn reply(&mut self, bursts: &[(Duration, &[u8])]) -> &mut Self {
        self.replies.push_back(
            bursts
                .iter()
                .map(|(delay, bytes)| (*delay, bytes.to_vec()))
                .collect(),
        );
        self
    }
}

impl LineChannel for TrickleChannel {
    fn write_all(&mut self, _data: &[u8]) -> io::Result<()> {
        let sent = Instant::now();
        if let Some(bursts) = self.replies.pop_front() {
            for (delay, bytes) in bursts {
                self.port.inbound.push_back((sent + delay, bytes));
            }
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.pending.len() + self.port.arrived(Instant::now()))
    }

    fn read_until(&mut self, terminator: &[u8]) -> io::Result<Vec<u8>> {
        let timeout = self.port.read_timeout;
        read_until_deadline(&mut self.port, &mut self.pending, terminator, timeout)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.port.inbound.clear();
        Ok(())
    }
}

/// Scripted reply for one instrument command
pub type InstrumentReply = Result<Vec<u8>, DeviceError>;

/// Instrument that records commands and answers from per-command scripts
#[derive(Debug, Default)]
pub struct ScriptedInstrument {
    /// Replies consumed in order by `hop`/`scan` commands
    pub acquisitions: VecDeque<InstrumentReply>,
    /// Command names that fail with a timeout
    pub failing: Vec<&'static str>,
    pub log: Vec<String>,
}

impl ScriptedInstrument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquisition(&mut self, reply: InstrumentReply) -> &mut Self {
        self.acquisitions.push_back(reply);
        self
    }

    pub fn count(&self, text: &str) -> usize {
        self.log.iter().filter(|entry| entry.as_str() == text).count()
    }
}

impl SpectrumInstrument for ScriptedInstrument {
    fn execute(&mut self, command: &SpectrumCommand) -> Result<Vec<u8>, DeviceError> {
        self.log.push(command.text());

        if self.failing.contains(&command.name()) {
            return Err(DeviceError::Timeout {
                device: "tinySA",
                command: command.text(),
            });
        }

        match command {
            SpectrumCommand::Hop { .. } | SpectrumCommand::Scan { .. } => self
                .acquisitions
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new())),
            SpectrumCommand::Info => Ok(b"tinySA ULTRA\r\nHW Version:V0.4.5.1\r\n".to_vec()),
            _ => Ok(Vec::new()),
        }
    }
}
