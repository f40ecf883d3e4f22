//! LO Sweep Simulation Library
//!
//! Stand-ins for the bench hardware so sweeps can run without a lab:
//!
//! - **VirtualOscillator**: the Arduino/ADF4351 firmware behind a line channel
//! - **VirtualAnalyzer**: a tinySA shell whose trace follows a linked oscillator
//! - **VirtualBench**: both of the above as an [`lo_devices::InstrumentSet`]
//!
//! # Example
//!
//! ```rust
//! use lo_devices::InstrumentSet;
//! use lo_sim::VirtualBench;
//!
//! let mut bench = VirtualBench::default();
//! let mut analyzer = bench.connect_analyzer().unwrap();
//!
//! // The carrier sits at the oscillator's power-on frequency
//! let peak = analyzer.measure_peak(900.0, 1.0, 51, 1).unwrap();
//! assert_eq!(peak.frequency_mhz, 900.0);
//! assert_eq!(bench.analyzer().resume_count(), 1);
//! ```

pub mod analyzer;
pub mod bench;
pub mod oscillator;

pub use analyzer::{AnalyzerPort, PathModel, VirtualAnalyzer};
pub use bench::{SimConfig, VirtualBench};
pub use oscillator::{Band, OscillatorModel, OscillatorPort, VirtualOscillator};
