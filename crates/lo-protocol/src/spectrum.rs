//! tinySA shell command set
//!
//! The tinySA exposes a text shell over USB CDC.
//!
//! # Format
//! - Commands: `name arg arg...\r`
//! - Replies: the device echoes the command line, prints payload lines, and
//!   finishes with the `ch> ` prompt
//! - Numeric payloads: whitespace-separated floats, one or more per line
//!
//! # Commands used here
//! - `info` - firmware/hardware banner
//! - `mode low input` - low-band input path
//! - `agc`, `attenuate`, `rbw` - `auto` or an integer
//! - `calc off|aver4|aver16` - trace averaging
//! - `pause` / `resume` - stop and restart the continuous sweep
//! - `hop <start> <stop> <points> <mask>` - discrete acquisition at listed points
//! - `scan <start> <stop> <points> <mask>` - one continuous sweep
//!
//! Output mask `1` prints frequencies in Hz, mask `2` prints levels in dBm.

use std::fmt;

use crate::error::ParseError;
use crate::setting::AutoValue;
use crate::EncodeCommand;

/// Command terminator expected by the shell
pub const SHELL_TERMINATOR: u8 = b'\r';

/// Prompt printed after every reply
pub const SHELL_PROMPT: &[u8] = b"ch> ";

/// Instrument-side trace averaging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AveragingMode {
    /// No averaging
    #[default]
    Off,
    /// Average 4 acquisitions
    Average4,
    /// Average 16 acquisitions
    Average16,
}

impl AveragingMode {
    /// Map an acquisition count to a mode; unsupported counts mean `Off`
    pub fn from_count(count: u32) -> Self {
        match count {
            4 => Self::Average4,
            16 => Self::Average16,
            _ => Self::Off,
        }
    }

    /// True when `count` maps onto a mode without falling back
    pub fn is_supported_count(count: u32) -> bool {
        matches!(count, 1 | 4 | 16)
    }

    /// Number of acquisitions averaged
    pub fn count(&self) -> u32 {
        match self {
            Self::Off => 1,
            Self::Average4 => 4,
            Self::Average16 => 16,
        }
    }

    /// Shell keyword for `calc`
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Average4 => "aver4",
            Self::Average16 => "aver16",
        }
    }
}

/// Input path selection for `mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputMode {
    /// Low band input (up to ~800 MHz fundamental, harmonics above)
    LowInput,
    /// High band input
    HighInput,
}

impl InputMode {
    fn keyword(&self) -> &'static str {
        match self {
            Self::LowInput => "low input",
            Self::HighInput => "high input",
        }
    }
}

/// Which array a `hop`/`scan` prints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMask {
    /// Frequencies in Hz
    Frequency,
    /// Levels in dBm
    Power,
}

impl OutputMask {
    /// Numeric mask argument
    pub fn bits(&self) -> u8 {
        match self {
            Self::Frequency => 1,
            Self::Power => 2,
        }
    }
}

/// tinySA shell command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumCommand {
    /// Device banner: `info`
    Info,
    /// Input path: `mode low input`
    Mode(InputMode),
    /// Automatic gain control: `agc auto`
    Agc(AutoValue),
    /// Input attenuation in dB: `attenuate auto`
    Attenuate(AutoValue),
    /// Resolution bandwidth in kHz: `rbw auto`
    Rbw(AutoValue),
    /// Trace averaging: `calc aver4`
    Calc(AveragingMode),
    /// Stop the continuous sweep: `pause`
    Pause,
    /// Restart the continuous sweep: `resume`
    Resume,
    /// Discrete acquisition: `hop 899500000 900500000 51 2`
    Hop {
        window: ScanWindow,
        points: u32,
        mask: OutputMask,
    },
    /// Continuous sweep: `scan 920000000 930000000 101 1`
    Scan {
        window: ScanWindow,
        points: u32,
        mask: OutputMask,
    },
}

impl SpectrumCommand {
    /// Command text without the terminator
    pub fn text(&self) -> String {
        match self {
            Self::Info => "info".to_string(),
            Self::Mode(mode) => format!("mode {}", mode.keyword()),
            Self::Agc(value) => format!("agc {}", value),
            Self::Attenuate(value) => format!("attenuate {}", value),
            Self::Rbw(value) => format!("rbw {}", value),
            Self::Calc(mode) => format!("calc {}", mode.keyword()),
            Self::Pause => "pause".to_string(),
            Self::Resume => "resume".to_string(),
            Self::Hop {
                window,
                points,
                mask,
            } => format!(
                "hop {} {} {} {}",
                window.start_hz,
                window.stop_hz,
                points,
                mask.bits()
            ),
            Self::Scan {
                window,
                points,
                mask,
            } => format!(
                "scan {} {} {} {}",
                window.start_hz,
                window.stop_hz,
                points,
                mask.bits()
            ),
        }
    }

    /// Command name (first word)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Mode(_) => "mode",
            Self::Agc(_) => "agc",
            Self::Attenuate(_) => "attenuate",
            Self::Rbw(_) => "rbw",
            Self::Calc(_) => "calc",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Hop { .. } => "hop",
            Self::Scan { .. } => "scan",
        }
    }
}

impl EncodeCommand for SpectrumCommand {
    fn encode(&self) -> Vec<u8> {
        let mut bytes = self.text().into_bytes();
        bytes.push(SHELL_TERMINATOR);
        bytes
    }
}

impl fmt::Display for SpectrumCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Integer Hz window for an acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanWindow {
    pub start_hz: i64,
    pub stop_hz: i64,
}

impl ScanWindow {
    /// Window of width `span_mhz` centred on `center_mhz`
    ///
    /// Centre and span are truncated to whole Hz first, then the half-span
    /// offsets are truncated toward zero.
    pub fn around(center_mhz: f64, span_mhz: f64) -> Self {
        let center_hz = (center_mhz * 1e6) as i64;
        let half_span = ((span_mhz * 1e6) as i64) as f64 / 2.0;
        Self {
            start_hz: (center_hz as f64 - half_span) as i64,
            stop_hz: (center_hz as f64 + half_span) as i64,
        }
    }

    /// Window between two MHz edges
    pub fn between(start_mhz: f64, stop_mhz: f64) -> Self {
        Self {
            start_hz: (start_mhz * 1e6) as i64,
            stop_hz: (stop_mhz * 1e6) as i64,
        }
    }

    /// Width in Hz
    pub fn width_hz(&self) -> i64 {
        self.stop_hz - self.start_hz
    }
}

/// Parse a payload of whitespace-separated floats
pub fn parse_values(payload: &[u8]) -> Result<Vec<f64>, ParseError> {
    let text = std::str::from_utf8(payload).map_err(|_| ParseError::InvalidUtf8)?;
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| ParseError::InvalidNumber(token.to_string()))
        })
        .collect()
}

/// Strip the command echo and trailing prompt from a raw shell reply
pub fn unwrap_shell_reply(command_text: &str, raw: &[u8]) -> Vec<u8> {
    let mut body = raw;
    if let Some(stripped) = body.strip_suffix(SHELL_PROMPT) {
        body = stripped;
    }

    // The echo is the first line, terminated by \r\n
    let first_line_end = body.iter().position(|&b| b == b'\n');
    if let Some(end) = first_line_end {
        let echo = String::from_utf8_lossy(&body[..end]);
        if echo.trim() == command_text {
            body = &body[end + 1..];
        }
    } else if String::from_utf8_lossy(body).trim() == command_text {
        body = &[];
    }

    body.to_vec()
}

/// Strongest bin of a scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Bin index
    pub index: usize,
    /// Bin frequency in MHz
    pub frequency_mhz: f64,
    /// Bin level in dBm
    pub power_dbm: f64,
}

/// Paired frequency/power arrays from one acquisition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanBuffer {
    /// Bin frequencies in MHz
    pub frequencies_mhz: Vec<f64>,
    /// Bin levels in dBm
    pub powers_dbm: Vec<f64>,
}

impl ScanBuffer {
    /// Pair up arrays that must have equal length
    pub fn new(frequencies_mhz: Vec<f64>, powers_dbm: Vec<f64>) -> Result<Self, ParseError> {
        if frequencies_mhz.len() != powers_dbm.len() {
            return Err(ParseError::LengthMismatch {
                frequencies: frequencies_mhz.len(),
                powers: powers_dbm.len(),
            });
        }
        Ok(Self {
            frequencies_mhz,
            powers_dbm,
        })
    }

    /// Decode the two payloads of a mask-1/mask-2 acquisition pair
    pub fn from_payloads(frequency_hz: &[u8], power_dbm: &[u8]) -> Result<Self, ParseError> {
        let frequencies = parse_values(frequency_hz)?
            .into_iter()
            .map(|hz| hz / 1e6)
            .collect();
        let powers = parse_values(power_dbm)?;
        Self::new(frequencies, powers)
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.powers_dbm.len()
    }

    /// True when the acquisition returned nothing
    pub fn is_empty(&self) -> bool {
        self.powers_dbm.is_empty()
    }

    /// Strongest bin; the first one wins on ties
    pub fn peak(&self) -> Option<Peak> {
        let mut best: Option<usize> = None;
        for (index, &power) in self.powers_dbm.iter().enumerate() {
            match best {
                Some(current) if power <= self.powers_dbm[current] => {}
                Some(current) if self.powers_dbm[current].is_nan() => {}
                _ => best = Some(index),
            }
        }

        best.map(|index| Peak {
            index,
            frequency_mhz: self.frequencies_mhz[index],
            power_dbm: self.powers_dbm[index],
        })
    }
}
