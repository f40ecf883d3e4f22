//! LO Sweep Device Library
//!
//! Blocking I/O for the two instruments on the bench: the ADF4351 oscillator
//! behind an Arduino and the tinySA spectrum analyzer.
//!
//! Each proxy exclusively owns its channel. Every operation takes
//! `&mut self`, so there is never more than one writer per port.
//!
//! # Example
//!
//! ```rust,no_run
//! use lo_devices::{InstrumentSet, SerialInstruments};
//!
//! let mut bench = SerialInstruments::new("/dev/ttyUSB0", "auto");
//! let mut oscillator = bench.connect_oscillator()?;
//! let mut analyzer = bench.connect_analyzer()?;
//!
//! oscillator.set_frequency(925.0)?;
//! let peak = analyzer.measure_peak(925.0, 1.0, 51, 4)?;
//! println!("{:.2} dBm at {:.3} MHz", peak.power_dbm, peak.frequency_mhz);
//! # Ok::<(), lo_devices::DeviceError>(())
//! ```

pub mod bench;
pub mod channel;
pub mod codec;
pub mod error;
pub mod instrument;
pub mod oscillator;
pub mod scanner;
pub mod spectrum;
pub mod usb_ids;

#[cfg(test)]
mod mock;

pub use bench::{InstrumentSet, SerialInstruments, AUTO_PORT};
pub use channel::{LineChannel, SerialChannel};
pub use codec::CommandCodec;
pub use error::{DeviceError, FailureClass};
pub use instrument::{SpectrumInstrument, TinySa};
pub use oscillator::{DeviceState, OscillatorConfig, OscillatorProxy};
pub use scanner::{PortRole, PortScanner, SerialPortInfo};
pub use spectrum::{SpectrumProxy, DEFAULT_MEASUREMENT_POINTS};
