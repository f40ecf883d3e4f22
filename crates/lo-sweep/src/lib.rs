//! LO Power Sweep Engine
//!
//! Steps an oscillator across a frequency range and records the peak level
//! the spectrum analyzer sees at each point.
//!
//! # Architecture
//!
//! The runner is a strict sequential loop on the calling thread: retune,
//! settle, measure, record, next. It never reorders or skips a point, and
//! a point that fails still gets a record, so a finished run always has one
//! record per planned frequency. Instruments come from an
//! [`lo_devices::InstrumentSet`], which is either real serial hardware or
//! the virtual bench from `lo-sim`.
//!
//! # Example
//!
//! ```rust,no_run
//! use lo_devices::SerialInstruments;
//! use lo_sweep::{MemorySink, NoopObserver, SweepConfig, SweepRunner};
//!
//! let config = SweepConfig {
//!     freq_start: 900.0,
//!     freq_stop: 901.0,
//!     freq_step: 0.5,
//!     ..Default::default()
//! };
//!
//! let mut instruments = SerialInstruments::new("/dev/ttyUSB0", "auto");
//! let mut sink = MemorySink::default();
//! let report = SweepRunner::new(config).run(&mut instruments, &mut sink, &mut NoopObserver)?;
//! assert_eq!(report.log.len(), 3);
//! # Ok::<(), lo_sweep::SweepError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod plan;
pub mod progress;
pub mod record;

pub use config::SweepConfig;
pub use engine::{RunReport, SweepPhase, SweepRunner};
pub use error::SweepError;
pub use events::{NoopObserver, SweepEvent, SweepObserver};
pub use plan::frequency_points;
pub use progress::{Progress, ProgressTracker};
pub use record::{LogSummary, MeasurementLog, MeasurementRecord, MeasurementSink, MemorySink};
