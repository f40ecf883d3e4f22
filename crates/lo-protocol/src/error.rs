//! Error types for instrument payload parsing

use thiserror::Error;

/// Errors that can occur while parsing instrument data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Payload bytes are not valid UTF-8
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    /// A token could not be read as a number
    #[error("invalid number: {0:?}")]
    InvalidNumber(String),

    /// Frequency and power arrays disagree in length
    #[error("length mismatch: {frequencies} frequencies vs {powers} powers")]
    LengthMismatch { frequencies: usize, powers: usize },

    /// Setting is neither `auto` nor an integer
    #[error("invalid setting: {0:?} (expected \"auto\" or an integer)")]
    InvalidSetting(String),
}
