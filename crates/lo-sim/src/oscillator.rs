//! Virtual oscillator firmware
//!
//! Emulates the Arduino sketch driving the ADF4351: it reads newline
//! terminated commands written to the channel and queues text replies.
//! Handles are cheap clones sharing one device, so a test can keep one
//! handle while the proxy owns another.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use lo_devices::LineChannel;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Output levels the ADF4351 supports, in dBm
pub const SUPPORTED_POWERS: [i32; 4] = [-4, -1, 2, 5];

/// Synthesizer range in MHz
pub const FREQUENCY_RANGE_MHZ: (f64, f64) = (35.0, 4400.0);

/// Which of the two preset bands is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Band {
    A,
    B,
}

impl Band {
    fn label(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

/// Power-on state of the virtual oscillator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillatorModel {
    /// Start of band A in MHz
    pub band_a_start_mhz: f64,
    /// Start of band B in MHz
    pub band_b_start_mhz: f64,
    /// Power selected at boot
    pub initial_power_dbm: i32,
    /// Text printed when the port opens
    pub boot_banner: Vec<String>,
}

impl Default for OscillatorModel {
    fn default() -> Self {
        Self {
            band_a_start_mhz: 900.0,
            band_b_start_mhz: 2400.0,
            initial_power_dbm: 5,
            boot_banner: vec![
                "ADF4351 LO controller".to_string(),
                "Commands: s f p r a".to_string(),
            ],
        }
    }
}

#[derive(Debug)]
struct Firmware {
    model: OscillatorModel,
    band: Band,
    frequency_mhz: f64,
    power_dbm: i32,
    rf_enabled: bool,
    /// Bytes written but not yet terminated by `\n`
    input: Vec<u8>,
    output: VecDeque<u8>,
    received: Vec<String>,
    /// Frequencies answered with `ERR` regardless of range
    rejected_mhz: Vec<f64>,
    /// Apply set commands without printing anything
    silent: bool,
    unplugged: bool,
    port_open: bool,
    opens: usize,
}

impl Firmware {
    fn new(model: OscillatorModel) -> Self {
        let mut firmware = Self {
            band: Band::A,
            frequency_mhz: model.band_a_start_mhz,
            power_dbm: model.initial_power_dbm,
            rf_enabled: true,
            input: Vec::new(),
            output: VecDeque::new(),
            received: Vec::new(),
            rejected_mhz: Vec::new(),
            silent: false,
            unplugged: false,
            port_open: false,
            opens: 0,
            model,
        };
        firmware.boot();
        firmware
    }

    /// Opening the port resets the board
    fn boot(&mut self) {
        self.input.clear();
        self.output.clear();
        let banner = self.model.boot_banner.clone();
        for line in banner {
            self.print(&line);
        }
    }

    fn print(&mut self, line: &str) {
        self.output.extend(line.as_bytes());
        self.output.extend(b"\r\n");
    }

    fn print_status(&mut self) {
        self.print(&format!("Band: {}", self.band.label()));
        self.print(&format!("Freq: {:.3} MHz", self.frequency_mhz));
        self.print(&format!("Power: {:+} dBm", self.power_dbm));
        self.print(&format!("RF: {}", if self.rf_enabled { "on" } else { "off" }));
    }

    fn band_start(&self) -> f64 {
        match self.band {
            Band::A => self.model.band_a_start_mhz,
            Band::B => self.model.band_b_start_mhz,
        }
    }

    fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        debug!("virtual oscillator <- {:?}", line);
        self.received.push(line.to_string());

        let (command, argument) = match line.split_once(' ') {
            Some((command, argument)) => (command, argument.trim()),
            None => (line, ""),
        };

        match command {
            "s" => self.print_status(),
            "f" => self.handle_frequency(argument),
            "p" => self.handle_power(argument),
            "r" => {
                self.frequency_mhz = self.band_start();
                self.print(&format!("Band {} start", self.band.label()));
            }
            "a" => {
                self.band = match self.band {
                    Band::A => Band::B,
                    Band::B => Band::A,
                };
                self.frequency_mhz = self.band_start();
                self.print(&format!("Band {}", self.band.label()));
            }
            _ => self.print(&format!("ERR: unknown command '{}'", command)),
        }
    }

    fn handle_frequency(&mut self, argument: &str) {
        let Ok(mhz) = argument.parse::<f64>() else {
            self.print("ERR: bad frequency");
            return;
        };
        let (min, max) = FREQUENCY_RANGE_MHZ;
        let forced = self.rejected_mhz.iter().any(|f| (f - mhz).abs() < 1e-6);
        if forced || !(min..=max).contains(&mhz) {
            self.print(&format!("ERR: frequency {:.3} out of range", mhz));
            return;
        }

        self.frequency_mhz = mhz;
        if !self.silent {
            self.print(&format!("Set {:.3} MHz", mhz));
            self.print(&format!("Prog: R0=0x{:08X}", (mhz * 1000.0) as u32));
        }
    }

    fn handle_power(&mut self, argument: &str) {
        match argument.parse::<i32>() {
            Ok(dbm) if SUPPORTED_POWERS.contains(&dbm) => {
                self.power_dbm = dbm;
                if !self.silent {
                    self.print(&format!("Power: {:+} dBm", dbm));
                }
            }
            _ => self.print(&format!("ERR: power must be one of {:?}", SUPPORTED_POWERS)),
        }
    }
}

/// Handle to a simulated oscillator
#[derive(Debug, Clone)]
pub struct VirtualOscillator {
    inner: Rc<RefCell<Firmware>>,
}

impl VirtualOscillator {
    pub fn new(model: OscillatorModel) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Firmware::new(model))),
        }
    }

    /// Current output frequency in MHz
    pub fn frequency_mhz(&self) -> f64 {
        self.inner.borrow().frequency_mhz
    }

    /// Current output power in dBm
    pub fn power_dbm(&self) -> i32 {
        self.inner.borrow().power_dbm
    }

    pub fn band(&self) -> Band {
        self.inner.borrow().band
    }

    /// Frequency and level currently on the RF output, if enabled
    pub fn output(&self) -> Option<(f64, i32)> {
        let firmware = self.inner.borrow();
        firmware
            .rf_enabled
            .then_some((firmware.frequency_mhz, firmware.power_dbm))
    }

    /// Command lines received so far
    pub fn received(&self) -> Vec<String> {
        self.inner.borrow().received.clone()
    }

    /// Answer `f <mhz>` with `ERR`
    pub fn reject_frequency(&self, mhz: f64) {
        self.inner.borrow_mut().rejected_mhz.push(mhz);
    }

    /// Apply set commands without acknowledging them
    pub fn set_silent(&self, silent: bool) {
        self.inner.borrow_mut().silent = silent;
    }

    pub fn set_rf_enabled(&self, enabled: bool) {
        self.inner.borrow_mut().rf_enabled = enabled;
    }

    /// Make every further write fail as if the cable was pulled
    pub fn unplug(&self) {
        self.inner.borrow_mut().unplugged = true;
    }

    /// Open the serial port, rebooting the board
    pub fn open_port(&self) -> OscillatorPort {
        let mut firmware = self.inner.borrow_mut();
        firmware.port_open = true;
        firmware.opens += 1;
        firmware.boot();
        OscillatorPort {
            device: self.clone(),
        }
    }

    /// True while an [`OscillatorPort`] is held
    pub fn is_port_open(&self) -> bool {
        self.inner.borrow().port_open
    }

    /// Number of times the port was opened
    pub fn open_count(&self) -> usize {
        self.inner.borrow().opens
    }
}

impl Default for VirtualOscillator {
    fn default() -> Self {
        Self::new(OscillatorModel::default())
    }
}

/// Open serial connection to a [`VirtualOscillator`]; closes on drop
#[derive(Debug)]
pub struct OscillatorPort {
    device: VirtualOscillator,
}

impl OscillatorPort {
    pub fn device(&self) -> &VirtualOscillator {
        &self.device
    }
}

impl Drop for OscillatorPort {
    fn drop(&mut self) {
        self.device.inner.borrow_mut().port_open = false;
    }
}

impl LineChannel for OscillatorPort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut firmware = self.device.inner.borrow_mut();
        if firmware.unplugged {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "oscillator unplugged"));
        }
        trace!("virtual oscillator received {} bytes", data.len());

        firmware.input.extend_from_slice(data);
        while let Some(end) = firmware.input.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = firmware.input.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw).into_owned();
            firmware.handle_line(&line);
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.device.inner.borrow().output.len())
    }

    fn read_until(&mut self, terminator: &[u8]) -> io::Result<Vec<u8>> {
        let mut firmware = self.device.inner.borrow_mut();
        let mut line = Vec::new();
        while let Some(byte) = firmware.output.pop_front() {
            line.push(byte);
            if line.ends_with(terminator) {
                break;
            }
        }
        Ok(line)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.device.inner.borrow_mut().output.clear();
        Ok(())
    }
}
