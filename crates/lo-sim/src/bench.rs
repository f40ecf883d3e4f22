//! Virtual bench: a linked oscillator and analyzer pair

use lo_devices::{
    DeviceError, InstrumentSet, OscillatorConfig, OscillatorProxy, SpectrumProxy,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analyzer::{AnalyzerPort, PathModel, VirtualAnalyzer};
use crate::oscillator::{OscillatorModel, OscillatorPort, VirtualOscillator};

/// Configuration for a virtual bench
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub oscillator: OscillatorModel,
    pub path: PathModel,
}

/// Simulated instruments for offline runs and tests
///
/// Keeps a handle to each device so callers can inspect or fault-inject
/// them while the sweep owns the proxies.
#[derive(Debug, Clone)]
pub struct VirtualBench {
    oscillator: VirtualOscillator,
    analyzer: VirtualAnalyzer,
    oscillator_config: OscillatorConfig,
    /// Fail the next oscillator connect
    oscillator_offline: bool,
    /// Fail the next analyzer connect
    analyzer_offline: bool,
}

impl VirtualBench {
    pub fn new(config: SimConfig) -> Self {
        let oscillator = VirtualOscillator::new(config.oscillator);
        let analyzer = VirtualAnalyzer::linked(oscillator.clone(), config.path);
        Self {
            oscillator,
            analyzer,
            oscillator_config: OscillatorConfig::immediate(),
            oscillator_offline: false,
            analyzer_offline: false,
        }
    }

    pub fn oscillator(&self) -> &VirtualOscillator {
        &self.oscillator
    }

    pub fn analyzer(&self) -> &VirtualAnalyzer {
        &self.analyzer
    }

    /// Timing used when connecting the oscillator proxy
    pub fn set_oscillator_config(&mut self, config: OscillatorConfig) {
        self.oscillator_config = config;
    }

    /// Make the oscillator port fail to open
    pub fn take_oscillator_offline(&mut self) {
        self.oscillator_offline = true;
    }

    /// Make the analyzer port fail to open
    pub fn take_analyzer_offline(&mut self) {
        self.analyzer_offline = true;
    }
}

impl Default for VirtualBench {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl InstrumentSet for VirtualBench {
    type Channel = OscillatorPort;
    type Analyzer = AnalyzerPort;

    fn connect_oscillator(&mut self) -> Result<OscillatorProxy<OscillatorPort>, DeviceError> {
        if self.oscillator_offline {
            return Err(DeviceError::OpenFailed {
                port: "virtual-oscillator".to_string(),
                reason: "device offline".to_string(),
            });
        }
        info!("Connecting to virtual oscillator");
        OscillatorProxy::connect(self.oscillator.open_port(), self.oscillator_config)
    }

    fn connect_analyzer(&mut self) -> Result<SpectrumProxy<AnalyzerPort>, DeviceError> {
        if self.analyzer_offline {
            return Err(DeviceError::OpenFailed {
                port: "virtual-tinysa".to_string(),
                reason: "device offline".to_string(),
            });
        }
        info!("Connecting to virtual tinySA");
        SpectrumProxy::connect(self.analyzer.open_port())
    }
}
