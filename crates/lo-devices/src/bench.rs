//! Instrument factory used by the sweep
//!
//! The orchestrator asks an [`InstrumentSet`] for its two connected proxies.
//! [`SerialInstruments`] opens real serial ports; the simulator crate
//! provides a virtual set.

use std::time::Duration;

use tracing::info;

use crate::channel::SerialChannel;
use crate::error::DeviceError;
use crate::instrument::{SpectrumInstrument, TinySa, DEFAULT_ANALYZER_TIMEOUT};
use crate::oscillator::{OscillatorConfig, OscillatorProxy, DEFAULT_OSCILLATOR_BAUD};
use crate::scanner::PortScanner;
use crate::spectrum::SpectrumProxy;
use crate::LineChannel;

/// Port name that asks for auto-detection
pub const AUTO_PORT: &str = "auto";

/// Source of the two connected instruments for one run
pub trait InstrumentSet {
    type Channel: LineChannel;
    type Analyzer: SpectrumInstrument;

    /// Open and connect the oscillator
    fn connect_oscillator(&mut self) -> Result<OscillatorProxy<Self::Channel>, DeviceError>;

    /// Open and connect the spectrum analyzer
    fn connect_analyzer(&mut self) -> Result<SpectrumProxy<Self::Analyzer>, DeviceError>;
}

/// Instruments on real serial ports
#[derive(Debug, Clone)]
pub struct SerialInstruments {
    pub oscillator_port: String,
    pub analyzer_port: String,
    pub oscillator: OscillatorConfig,
    pub analyzer_timeout: Duration,
}

impl SerialInstruments {
    pub fn new(oscillator_port: impl Into<String>, analyzer_port: impl Into<String>) -> Self {
        Self {
            oscillator_port: oscillator_port.into(),
            analyzer_port: analyzer_port.into(),
            oscillator: OscillatorConfig::default(),
            analyzer_timeout: DEFAULT_ANALYZER_TIMEOUT,
        }
    }

    /// Read timeout for the oscillator port
    ///
    /// Firmware may print one line in several bursts, so a line read waits
    /// for the whole reply timeout rather than the poll interval.
    fn oscillator_read_timeout(&self) -> Duration {
        self.oscillator.framing.timeout
    }

    fn resolve_analyzer_port(&self) -> Result<String, DeviceError> {
        if !self.analyzer_port.eq_ignore_ascii_case(AUTO_PORT) {
            return Ok(self.analyzer_port.clone());
        }
        let found = PortScanner::new().find_analyzer()?;
        info!("Auto-detected tinySA on {}", found.port);
        Ok(found.port)
    }
}

impl InstrumentSet for SerialInstruments {
    type Channel = SerialChannel;
    type Analyzer = TinySa<SerialChannel>;

    fn connect_oscillator(&mut self) -> Result<OscillatorProxy<SerialChannel>, DeviceError> {
        info!("Connecting to oscillator on {}", self.oscillator_port);
        let channel = SerialChannel::open(
            &self.oscillator_port,
            DEFAULT_OSCILLATOR_BAUD,
            self.oscillator_read_timeout(),
        )?;
        OscillatorProxy::connect(channel, self.oscillator)
    }

    fn connect_analyzer(&mut self) -> Result<SpectrumProxy<TinySa<SerialChannel>>, DeviceError> {
        let port = self.resolve_analyzer_port()?;
        info!("Connecting to tinySA on {}", port);
        SpectrumProxy::connect(TinySa::open(&port, self.analyzer_timeout)?)
    }
}
