//! Byte channels to the instruments
//!
//! [`LineChannel`] is the seam between the proxies and the wire: a blocking,
//! single-owner byte stream with a byte-available query and timeout-bounded
//! reads. [`SerialChannel`] backs it with a serial port; simulated
//! instruments implement it directly.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, trace};

use crate::error::DeviceError;

/// Blocking byte stream with polling and terminator-delimited reads
pub trait LineChannel {
    /// Write all bytes and flush
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Number of bytes that can be read without blocking
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read up to and including `terminator`
    ///
    /// Returns whatever arrived if the read timeout expires first, which may
    /// be nothing. Input that keeps arriving without the terminator fails
    /// with [`io::ErrorKind::TimedOut`] once the timeout has passed.
    fn read_until(&mut self, terminator: &[u8]) -> io::Result<Vec<u8>>;

    /// Read one `\n`-terminated line
    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        self.read_until(b"\n")
    }

    /// Discard everything buffered on the receive side
    fn clear_input(&mut self) -> io::Result<()>;
}

impl<C: LineChannel + ?Sized> LineChannel for Box<C> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_all(data)
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn read_until(&mut self, terminator: &[u8]) -> io::Result<Vec<u8>> {
        (**self).read_until(terminator)
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_line()
    }

    fn clear_input(&mut self) -> io::Result<()> {
        (**self).clear_input()
    }
}

/// Position just past the first occurrence of `needle`
pub(crate) fn find_terminator(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + needle.len())
}

/// Move bytes from `reader` into `pending` until `terminator` arrives
///
/// A quiet read timeout returns everything pending. A stream that never
/// carries the terminator is cut off `timeout` after the call began and the
/// pending bytes are discarded.
pub(crate) fn read_until_deadline<R: Read + ?Sized>(
    reader: &mut R,
    pending: &mut Vec<u8>,
    terminator: &[u8],
    timeout: Duration,
) -> io::Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut chunk = [0u8; 256];
    loop {
        if let Some(end) = find_terminator(pending, terminator) {
            return Ok(pending.drain(..end).collect());
        }
        if Instant::now() >= deadline {
            let dropped = pending.len();
            pending.clear();
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no terminator within {:?}, {} bytes dropped", timeout, dropped),
            ));
        }

        match reader.read(&mut chunk) {
            Ok(0) => return Ok(std::mem::take(pending)),
            Ok(n) => pending.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                return Ok(std::mem::take(pending));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Serial port channel
pub struct SerialChannel {
    /// Port path, for logging
    name: String,
    port: Box<dyn SerialPort>,
    /// Bytes read from the port but not yet returned
    pending: Vec<u8>,
}

impl SerialChannel {
    /// Open a serial port
    ///
    /// `timeout` bounds each read and each [`LineChannel::read_until`] call.
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self, DeviceError> {
        debug!("Opening {} at {} baud", path, baud_rate);

        let port = serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| DeviceError::OpenFailed {
                port: path.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name: path.to_string(),
            port,
            pending: Vec::with_capacity(256),
        })
    }

    /// Port path
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl LineChannel for SerialChannel {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        trace!("{} <- {:?}", self.name, String::from_utf8_lossy(data));
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let buffered = self.port.bytes_to_read().map_err(io::Error::from)?;
        Ok(self.pending.len() + buffered as usize)
    }

    fn read_until(&mut self, terminator: &[u8]) -> io::Result<Vec<u8>> {
        let timeout = self.port.timeout();
        let data = read_until_deadline(&mut self.port, &mut self.pending, terminator, timeout)?;
        trace!("{} -> {:?}", self.name, String::from_utf8_lossy(&data));
        Ok(data)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.port
            .clear(ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}
