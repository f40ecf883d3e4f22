//! ADF4351 oscillator firmware protocol
//!
//! The firmware reads one command per line and answers with free-form text.
//!
//! # Commands
//! - `s` - print status (`Freq: 900.000 MHz`, `Power: +5 dBm`, ...)
//! - `f <MHz>` - program a new output frequency
//! - `p <dBm>` - select output power (-4, -1, +2, +5 on the ADF4351)
//! - `r` - jump to the start of the current band
//! - `a` - toggle between band A and band B
//!
//! Errors are reported by a line containing `ERR`. Successful set commands
//! usually echo a unit or a `Prog:` register dump, but some firmware builds
//! print nothing at all, so a reply without either is reported as
//! [`SetOutcome::Unconfirmed`] rather than folded into success.

use std::fmt;

use crate::framing::Response;
use crate::EncodeCommand;

/// Line terminator expected by the firmware
pub const LINE_TERMINATOR: u8 = b'\n';

/// Token the firmware prints on a rejected command
pub const ERROR_TOKEN: &str = "ERR";

/// Oscillator firmware command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OscillatorCommand {
    /// Status query: `s`
    Status,
    /// Set output frequency: `f 925.000`
    SetFrequency { mhz: f64 },
    /// Set output power: `p +5`
    SetPower { dbm: i32 },
    /// Reset to band start: `r`
    ResetBand,
    /// Toggle band A/B: `a`
    ToggleBand,
}

impl OscillatorCommand {
    /// Command text without the line terminator
    pub fn text(&self) -> String {
        match self {
            Self::Status => "s".to_string(),
            Self::SetFrequency { mhz } => format!("f {:.3}", mhz),
            Self::SetPower { dbm } => format!("p {:+}", dbm),
            Self::ResetBand => "r".to_string(),
            Self::ToggleBand => "a".to_string(),
        }
    }

    /// Tokens whose presence confirms a set command was applied
    pub fn ack_tokens(&self) -> &'static [&'static str] {
        match self {
            Self::SetFrequency { .. } => &["MHz", "Prog:"],
            Self::SetPower { .. } => &["dBm", "Power"],
            Self::Status | Self::ResetBand | Self::ToggleBand => &[],
        }
    }
}

impl EncodeCommand for OscillatorCommand {
    fn encode(&self) -> Vec<u8> {
        let mut bytes = self.text().into_bytes();
        bytes.push(LINE_TERMINATOR);
        bytes
    }
}

impl fmt::Display for OscillatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// How the firmware answered a set command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// Reply carried an acknowledgement token
    Confirmed,
    /// Reply had neither an acknowledgement nor an error token
    Unconfirmed,
    /// Reply carried the error token
    Rejected { response: String },
}

impl SetOutcome {
    /// Classify a reply; the error token wins over acknowledgement tokens
    pub fn classify(response: &Response, ack_tokens: &[&str]) -> Self {
        if response.contains(ERROR_TOKEN) {
            Self::Rejected {
                response: response.to_string(),
            }
        } else if ack_tokens.iter().any(|token| response.contains(token)) {
            Self::Confirmed
        } else {
            Self::Unconfirmed
        }
    }

    /// True for `Confirmed` and `Unconfirmed`
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Values parsed from a status reply
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatusReport {
    /// `Freq: <float> MHz`
    pub frequency_mhz: Option<f64>,
    /// `Power: <signed int> dBm`
    pub power_dbm: Option<i32>,
}

impl StatusReport {
    /// Scan a reply for the frequency and power fields
    ///
    /// Fields may share a line or be split across lines; anything else the
    /// firmware prints is ignored. Missing or malformed fields stay `None`.
    pub fn parse(response: &Response) -> Self {
        let text = response.text();
        let tokens: Vec<&str> = text.split_whitespace().collect();

        let mut report = Self::default();
        for window in tokens.windows(3) {
            let (label, value, unit) = (window[0], window[1], window[2]);

            if report.frequency_mhz.is_none()
                && label.ends_with("Freq:")
                && unit.starts_with("MHz")
            {
                report.frequency_mhz = parse_unsigned_decimal(value);
            }

            if report.power_dbm.is_none() && label.ends_with("Power:") && unit.starts_with("dBm")
            {
                report.power_dbm = parse_signed_integer(value);
            }
        }
        report
    }

    /// True when neither field was found
    pub fn is_empty(&self) -> bool {
        self.frequency_mhz.is_none() && self.power_dbm.is_none()
    }
}

/// Digits and dots only, as printed by the firmware
fn parse_unsigned_decimal(token: &str) -> Option<f64> {
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    token.parse().ok()
}

/// Optional sign followed by digits
fn parse_signed_integer(token: &str) -> Option<i32> {
    let digits = token.strip_prefix(&['+', '-'][..]).unwrap_or(token);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}
