//! Virtual tinySA
//!
//! Answers shell commands with payloads shaped like the real instrument's.
//! When linked to a [`VirtualOscillator`] the trace shows its carrier at the
//! oscillator's frequency, attenuated by a simple path-loss model.

use std::cell::RefCell;
use std::rc::Rc;

use lo_devices::{DeviceError, SpectrumInstrument};
use lo_protocol::spectrum::OutputMask;
use lo_protocol::{AutoValue, AveragingMode, ScanWindow, SpectrumCommand};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::oscillator::VirtualOscillator;

/// Signal chain seen by the virtual analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathModel {
    /// Loss between oscillator output and analyzer input at the reference
    pub loss_db: f64,
    /// Additional loss per MHz above the reference frequency
    pub slope_db_per_mhz: f64,
    pub reference_mhz: f64,
    /// Level of empty bins
    pub noise_floor_dbm: f64,
}

impl Default for PathModel {
    fn default() -> Self {
        Self {
            loss_db: 12.0,
            slope_db_per_mhz: 0.05,
            reference_mhz: 900.0,
            noise_floor_dbm: -95.0,
        }
    }
}

impl PathModel {
    /// Level the analyzer reads for a carrier
    pub fn received_dbm(&self, frequency_mhz: f64, power_dbm: i32) -> f64 {
        f64::from(power_dbm) - self.loss_db - self.slope_db_per_mhz * (frequency_mhz - self.reference_mhz)
    }
}

#[derive(Debug, Default)]
struct AnalyzerState {
    log: Vec<String>,
    paused: bool,
    pauses: usize,
    resumes: usize,
    averaging: AveragingMode,
    rbw: AutoValue,
    attenuation: AutoValue,
    /// Power hops centred within 1 kHz of these return garbage
    corrupt_mhz: Vec<f64>,
    /// Command names that time out
    failing: Vec<String>,
    port_open: bool,
}

/// Handle to a simulated tinySA
#[derive(Debug, Clone)]
pub struct VirtualAnalyzer {
    state: Rc<RefCell<AnalyzerState>>,
    source: Option<VirtualOscillator>,
    path: PathModel,
}

impl VirtualAnalyzer {
    /// Analyzer that only sees its noise floor
    pub fn new(path: PathModel) -> Self {
        Self {
            state: Rc::default(),
            source: None,
            path,
        }
    }

    /// Analyzer cabled to an oscillator
    pub fn linked(source: VirtualOscillator, path: PathModel) -> Self {
        Self {
            source: Some(source),
            ..Self::new(path)
        }
    }

    /// Commands executed so far, as shell text
    pub fn log(&self) -> Vec<String> {
        self.state.borrow().log.clone()
    }

    pub fn pause_count(&self) -> usize {
        self.state.borrow().pauses
    }

    pub fn resume_count(&self) -> usize {
        self.state.borrow().resumes
    }

    /// True while the continuous sweep is stopped
    pub fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    pub fn averaging(&self) -> AveragingMode {
        self.state.borrow().averaging
    }

    pub fn rbw(&self) -> AutoValue {
        self.state.borrow().rbw
    }

    pub fn attenuation(&self) -> AutoValue {
        self.state.borrow().attenuation
    }

    /// Return an unparseable power payload for hops centred on `mhz`
    pub fn corrupt_at(&self, mhz: f64) {
        self.state.borrow_mut().corrupt_mhz.push(mhz);
    }

    /// Make every command named `name` time out
    pub fn fail_command(&self, name: &str) {
        self.state.borrow_mut().failing.push(name.to_string());
    }

    /// Open the USB serial port
    pub fn open_port(&self) -> AnalyzerPort {
        self.state.borrow_mut().port_open = true;
        AnalyzerPort {
            device: self.clone(),
        }
    }

    /// True while an [`AnalyzerPort`] is held
    pub fn is_port_open(&self) -> bool {
        self.state.borrow().port_open
    }

    fn acquire(&self, window: &ScanWindow, points: u32, mask: OutputMask) -> Vec<u8> {
        let bins = bin_frequencies(window, points);
        let values: Vec<f64> = match mask {
            OutputMask::Frequency => bins,
            OutputMask::Power => {
                let center_mhz = (window.start_hz + window.width_hz() / 2) as f64 / 1e6;
                let corrupt = self
                    .state
                    .borrow()
                    .corrupt_mhz
                    .iter()
                    .any(|f| (f - center_mhz).abs() < 1e-3);
                if corrupt {
                    return b"-42.0 -4x.1 ERR\r\n".to_vec();
                }
                self.trace(&bins)
            }
        };

        let mut payload = String::new();
        for value in values {
            match mask {
                OutputMask::Frequency => payload.push_str(&format!("{:.0}\r\n", value)),
                OutputMask::Power => payload.push_str(&format!("{:.6}\r\n", value)),
            }
        }
        payload.into_bytes()
    }

    /// Noise floor with the carrier in its nearest bin
    fn trace(&self, bins_hz: &[f64]) -> Vec<f64> {
        let mut levels: Vec<f64> = bins_hz
            .iter()
            .enumerate()
            .map(|(i, _)| self.path.noise_floor_dbm + ripple(i))
            .collect();

        let Some((carrier_mhz, power_dbm)) = self.source.as_ref().and_then(|s| s.output()) else {
            return levels;
        };
        let carrier_hz = carrier_mhz * 1e6;
        let (Some(first), Some(last)) = (bins_hz.first(), bins_hz.last()) else {
            return levels;
        };
        if carrier_hz < *first || carrier_hz > *last {
            return levels;
        }

        let nearest = bins_hz
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (*a - carrier_hz)
                    .abs()
                    .total_cmp(&(*b - carrier_hz).abs())
            })
            .map(|(i, _)| i);
        if let Some(index) = nearest {
            levels[index] = self.path.received_dbm(carrier_mhz, power_dbm);
        }
        levels
    }
}

impl Default for VirtualAnalyzer {
    fn default() -> Self {
        Self::new(PathModel::default())
    }
}

/// Evenly spaced bin centres across the window, edges included
fn bin_frequencies(window: &ScanWindow, points: u32) -> Vec<f64> {
    let start = window.start_hz as f64;
    let stop = window.stop_hz as f64;
    match points {
        0 => Vec::new(),
        1 => vec![start],
        n => {
            let step = (stop - start) / f64::from(n - 1);
            (0..n).map(|i| start + step * f64::from(i)).collect()
        }
    }
}

/// Deterministic few-dB wobble on the noise floor
fn ripple(index: usize) -> f64 {
    ((index * 7919) % 13) as f64 * 0.25
}

impl SpectrumInstrument for VirtualAnalyzer {
    fn execute(&mut self, command: &SpectrumCommand) -> Result<Vec<u8>, DeviceError> {
        let text = command.text();
        debug!("virtual tinySA <- {:?}", text);
        {
            let mut state = self.state.borrow_mut();
            state.log.push(text.clone());
            if state.failing.iter().any(|name| name == command.name()) {
                return Err(DeviceError::Timeout {
                    device: "tinySA",
                    command: text,
                });
            }
        }

        let payload = match command {
            SpectrumCommand::Info => b"tinySA ULTRA (virtual)\r\nHW Version: sim\r\n".to_vec(),
            SpectrumCommand::Pause => {
                let mut state = self.state.borrow_mut();
                state.paused = true;
                state.pauses += 1;
                Vec::new()
            }
            SpectrumCommand::Resume => {
                let mut state = self.state.borrow_mut();
                state.paused = false;
                state.resumes += 1;
                Vec::new()
            }
            SpectrumCommand::Calc(mode) => {
                self.state.borrow_mut().averaging = *mode;
                Vec::new()
            }
            SpectrumCommand::Rbw(value) => {
                self.state.borrow_mut().rbw = *value;
                Vec::new()
            }
            SpectrumCommand::Attenuate(value) => {
                self.state.borrow_mut().attenuation = *value;
                Vec::new()
            }
            SpectrumCommand::Mode(_) | SpectrumCommand::Agc(_) => Vec::new(),
            SpectrumCommand::Hop {
                window,
                points,
                mask,
            }
            | SpectrumCommand::Scan {
                window,
                points,
                mask,
            } => self.acquire(window, *points, *mask),
        };
        Ok(payload)
    }
}

/// Open connection to a [`VirtualAnalyzer`]; closes on drop
#[derive(Debug)]
pub struct AnalyzerPort {
    device: VirtualAnalyzer,
}

impl SpectrumInstrument for AnalyzerPort {
    fn execute(&mut self, command: &SpectrumCommand) -> Result<Vec<u8>, DeviceError> {
        self.device.execute(command)
    }
}

impl Drop for AnalyzerPort {
    fn drop(&mut self) {
        self.device.state.borrow_mut().port_open = false;
    }
}

#[cfg(test)]
mod tests {
    use lo_protocol::ScanBuffer;

    use super::*;

    fn hop(center: f64, mask: OutputMask) -> SpectrumCommand {
        SpectrumCommand::Hop {
            window: ScanWindow::around(center, 1.0),
            points: 51,
            mask,
        }
    }

    #[test]
    fn test_bin_frequencies_cover_window() {
        let bins = bin_frequencies(&ScanWindow::around(900.0, 1.0), 51);
        assert_eq!(bins.len(), 51);
        assert_eq!(bins[0], 899_500_000.0);
        assert_eq!(bins[50], 900_500_000.0);
        assert_eq!(bins[25], 900_000_000.0);
        assert!(bin_frequencies(&ScanWindow::around(900.0, 1.0), 0).is_empty());
    }

    #[test]
    fn test_linked_trace_peaks_at_carrier() {
        let oscillator = VirtualOscillator::default();
        let mut analyzer = VirtualAnalyzer::linked(oscillator.clone(), PathModel::default());

        let freqs = analyzer.execute(&hop(900.0, OutputMask::Frequency)).unwrap();
        let powers = analyzer.execute(&hop(900.0, OutputMask::Power)).unwrap();
        let peak = ScanBuffer::from_payloads(&freqs, &powers).unwrap().peak().unwrap();

        assert_eq!(peak.frequency_mhz, 900.0);
        assert!((peak.power_dbm - (5.0 - 12.0)).abs() < 1e-6);
    }

    #[test]
    fn test_unlinked_trace_is_noise() {
        let mut analyzer = VirtualAnalyzer::default();
        let powers = analyzer.execute(&hop(900.0, OutputMask::Power)).unwrap();
        let levels = lo_protocol::spectrum::parse_values(&powers).unwrap();
        assert!(levels.iter().all(|&l| l < -90.0));
    }

    #[test]
    fn test_state_tracking_and_faults() {
        let mut analyzer = VirtualAnalyzer::default();
        analyzer.execute(&SpectrumCommand::Pause).unwrap();
        assert!(analyzer.is_paused());
        analyzer.execute(&SpectrumCommand::Calc(AveragingMode::Average16)).unwrap();
        analyzer.execute(&SpectrumCommand::Resume).unwrap();
        assert!(!analyzer.is_paused());
        assert_eq!(analyzer.averaging(), AveragingMode::Average16);
        assert_eq!((analyzer.pause_count(), analyzer.resume_count()), (1, 1));

        analyzer.corrupt_at(900.0);
        let garbage = analyzer.execute(&hop(900.0, OutputMask::Power)).unwrap();
        assert!(lo_protocol::spectrum::parse_values(&garbage).is_err());

        analyzer.fail_command("hop");
        assert!(analyzer.execute(&hop(901.0, OutputMask::Frequency)).is_err());
        assert_eq!(analyzer.log().len(), 5);
    }

    #[test]
    fn test_port_closes_on_drop() {
        let analyzer = VirtualAnalyzer::default();
        let mut port = analyzer.open_port();
        assert!(analyzer.is_port_open());
        port.execute(&SpectrumCommand::Resume).unwrap();
        drop(port);
        assert!(!analyzer.is_port_open());
        assert_eq!(analyzer.resume_count(), 1);
    }

    #[test]
    fn test_path_loss_slope() {
        let path = PathModel::default();
        assert!((path.received_dbm(960.0, 5) - (5.0 - 12.0 - 3.0)).abs() < 1e-9);
    }
}
