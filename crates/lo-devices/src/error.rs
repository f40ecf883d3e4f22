//! Error types for instrument I/O

use lo_protocol::ParseError;
use thiserror::Error;

/// Errors that can occur while talking to an instrument
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Failed to open serial port
    #[error("failed to open port {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// Operation on a proxy that is not connected
    #[error("{0} is not connected")]
    NotConnected(&'static str),

    /// No reply terminator before the read timeout
    #[error("timeout waiting for {device} reply to {command:?}")]
    Timeout {
        device: &'static str,
        command: String,
    },

    /// I/O error on an open channel
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Device answered with its error token
    #[error("{command:?} rejected: {response}")]
    Rejected { command: String, response: String },

    /// Payload could not be decoded
    #[error("data format error: {0}")]
    DataFormat(#[from] ParseError),

    /// Acquisition returned zero points
    #[error("no data received from {0}")]
    NoData(&'static str),

    /// Port auto-detection found nothing
    #[error("no serial port found for {0}")]
    PortNotFound(&'static str),

    /// Serial port error outside of open
    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),
}

/// Coarse failure class used for recovery decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Channel unreachable; fatal to the enclosing phase
    Connection,
    /// Explicit device error token; recoverable
    Protocol,
    /// Undecodable or empty payload; recoverable
    DataFormat,
}

impl DeviceError {
    /// Classify this error
    pub fn class(&self) -> FailureClass {
        match self {
            Self::OpenFailed { .. }
            | Self::NotConnected(_)
            | Self::Timeout { .. }
            | Self::Io(_)
            | Self::PortNotFound(_)
            | Self::SerialPort(_) => FailureClass::Connection,
            Self::Rejected { .. } => FailureClass::Protocol,
            Self::DataFormat(_) | Self::NoData(_) => FailureClass::DataFormat,
        }
    }
}
