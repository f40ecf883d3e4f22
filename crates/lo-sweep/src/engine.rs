//! Sweep runner
//!
//! Drives one run through its phases:
//!
//! ```text
//! Idle -> Connecting -> Ready -> Running -> Saving -> Disconnecting -> Done
//!              \
//!               -> Failed
//! ```
//!
//! Setup failures end the run before any point is measured. Per-point
//! failures become error records and the loop moves on, so a completed run
//! always has exactly one record per planned point. An interrupt stops the
//! loop between points and skips the save. Both instruments are released on
//! every exit path, including a failed save or an unwind.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lo_devices::{
    DeviceError, InstrumentSet, LineChannel, OscillatorProxy, SpectrumInstrument, SpectrumProxy,
};
use lo_protocol::{AutoValue, SetOutcome};
use tracing::{error, info, warn};

use crate::config::SweepConfig;
use crate::error::SweepError;
use crate::events::{SweepEvent, SweepObserver};
use crate::plan::frequency_points;
use crate::progress::ProgressTracker;
use crate::record::{LogSummary, MeasurementLog, MeasurementRecord, MeasurementSink};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepPhase {
    Idle,
    Connecting,
    Ready,
    Running,
    Saving,
    Disconnecting,
    Done,
    Failed,
}

impl fmt::Display for SweepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Saving => "saving",
            Self::Disconnecting => "disconnecting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub log: MeasurementLog,
    /// Time spent in the point loop
    pub elapsed: Duration,
    pub summary: Option<LogSummary>,
}

/// Both connected instruments; released together when dropped
struct Bench<C: LineChannel, A: SpectrumInstrument> {
    oscillator: OscillatorProxy<C>,
    analyzer: SpectrumProxy<A>,
}

impl<C: LineChannel, A: SpectrumInstrument> Bench<C, A> {
    fn release(&mut self) {
        self.oscillator.disconnect();
        self.analyzer.disconnect();
    }
}

impl<C: LineChannel, A: SpectrumInstrument> Drop for Bench<C, A> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Runs a sweep for one config
#[derive(Debug)]
pub struct SweepRunner {
    config: SweepConfig,
    phase: SweepPhase,
    interrupt: Arc<AtomicBool>,
}

impl SweepRunner {
    pub fn new(config: SweepConfig) -> Self {
        Self {
            config,
            phase: SweepPhase::Idle,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop the sweep once `flag` is raised
    ///
    /// The flag is checked between points, so the point in flight finishes
    /// and the analyzer is resumed before the run winds down.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn phase(&self) -> SweepPhase {
        self.phase
    }

    /// Connect, sweep every point, save, disconnect
    ///
    /// On a save failure or an interrupt the instruments are still released
    /// before the error is returned. An interrupted run saves nothing.
    pub fn run<S, K, O>(
        &mut self,
        instruments: &mut S,
        sink: &mut K,
        observer: &mut O,
    ) -> Result<RunReport, SweepError>
    where
        S: InstrumentSet + ?Sized,
        K: MeasurementSink + ?Sized,
        O: SweepObserver + ?Sized,
    {
        if let Err(e) = self.config.validate() {
            self.transition(SweepPhase::Failed, observer);
            return Err(e);
        }

        self.transition(SweepPhase::Connecting, observer);
        let mut bench = match self.connect(instruments) {
            Ok(bench) => bench,
            Err(e) => {
                error!("Setup failed: {}", e);
                self.transition(SweepPhase::Failed, observer);
                return Err(e);
            }
        };
        self.transition(SweepPhase::Ready, observer);

        let points = frequency_points(
            self.config.freq_start,
            self.config.freq_stop,
            self.config.freq_step,
        );
        self.transition(SweepPhase::Running, observer);
        let (log, elapsed) = self.sweep(&mut bench, &points, observer);

        if self.interrupted() {
            warn!(
                "Sweep interrupted after {} of {} points",
                log.len(),
                points.len()
            );
            self.transition(SweepPhase::Disconnecting, observer);
            bench.release();
            drop(bench);
            self.transition(SweepPhase::Failed, observer);
            return Err(SweepError::Interrupted);
        }

        let summary = log.summary();
        observer.on_event(&SweepEvent::SweepFinished { elapsed, summary });

        self.transition(SweepPhase::Saving, observer);
        let saved = sink.save(&log);

        self.transition(SweepPhase::Disconnecting, observer);
        bench.release();
        drop(bench);

        match saved {
            Ok(()) => {
                self.transition(SweepPhase::Done, observer);
                Ok(RunReport {
                    log,
                    elapsed,
                    summary,
                })
            }
            Err(e) => {
                error!("Saving measurements failed: {}", e);
                self.transition(SweepPhase::Failed, observer);
                Err(SweepError::Save(e))
            }
        }
    }

    fn transition<O: SweepObserver + ?Sized>(&mut self, to: SweepPhase, observer: &mut O) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        info!("Sweep {} -> {}", from, to);
        observer.on_event(&SweepEvent::PhaseChanged { from, to });
    }

    /// Open both instruments and apply the run's fixed settings
    ///
    /// Whatever connected before a failure is released when it drops here.
    fn connect<S: InstrumentSet + ?Sized>(
        &self,
        instruments: &mut S,
    ) -> Result<Bench<S::Channel, S::Analyzer>, SweepError> {
        let mut oscillator = instruments
            .connect_oscillator()
            .map_err(SweepError::setup("oscillator"))?;

        let power = self.config.lo_power;
        info!("Setting LO power to {:+} dBm", power);
        match oscillator
            .set_power(power)
            .map_err(SweepError::setup("oscillator"))?
        {
            SetOutcome::Confirmed => {}
            SetOutcome::Unconfirmed => {
                warn!("Oscillator did not acknowledge p {:+}, assuming applied", power)
            }
            SetOutcome::Rejected { response } => {
                oscillator.disconnect();
                return Err(SweepError::Setup {
                    device: "oscillator",
                    source: DeviceError::Rejected {
                        command: format!("p {:+}", power),
                        response,
                    },
                });
            }
        }

        let analyzer = match instruments.connect_analyzer() {
            Ok(analyzer) => analyzer,
            Err(e) => {
                oscillator.disconnect();
                return Err(SweepError::Setup {
                    device: "tinySA",
                    source: e,
                });
            }
        };

        let mut bench = Bench {
            oscillator,
            analyzer,
        };
        if let AutoValue::Fixed(_) = self.config.rbw {
            bench
                .analyzer
                .set_rbw(self.config.rbw)
                .map_err(SweepError::setup("tinySA"))?;
        }
        if let AutoValue::Fixed(_) = self.config.attenuation {
            bench
                .analyzer
                .set_attenuation(self.config.attenuation)
                .map_err(SweepError::setup("tinySA"))?;
        }
        Ok(bench)
    }

    fn sweep<C, A, O>(
        &self,
        bench: &mut Bench<C, A>,
        points: &[f64],
        observer: &mut O,
    ) -> (MeasurementLog, Duration)
    where
        C: LineChannel,
        A: SpectrumInstrument,
        O: SweepObserver + ?Sized,
    {
        let total = points.len();
        info!(
            "Starting sweep: {:.1} - {:.1} MHz, {} points, step {:.3} MHz, {:+} dBm, span {} MHz, averaging {}x",
            self.config.freq_start,
            self.config.freq_stop,
            total,
            self.config.freq_step,
            self.config.lo_power,
            self.config.span,
            self.config.averaging
        );
        observer.on_event(&SweepEvent::SweepStarted { total });

        let mut log = MeasurementLog::with_capacity(total);
        let mut tracker = ProgressTracker::start(total);
        for (index, &frequency) in points.iter().enumerate() {
            if self.interrupted() {
                break;
            }
            let record = self.measure_point(bench, frequency);
            let progress = tracker.advance(Instant::now());

            match (&record.power_dbm, &record.error) {
                (Some(power), _) => info!(
                    "[{:3}/{}] {:8.3} MHz: {:7.2} dBm",
                    index + 1,
                    total,
                    frequency,
                    power
                ),
                (None, error) => warn!(
                    "[{:3}/{}] {:8.3} MHz failed: {}",
                    index + 1,
                    total,
                    frequency,
                    error.as_deref().unwrap_or("unknown error")
                ),
            }

            observer.on_event(&SweepEvent::PointCompleted {
                index,
                total,
                record: record.clone(),
                progress,
            });
            log.push(record);
        }

        let elapsed = tracker.elapsed();
        if log.len() < total {
            return (log, elapsed);
        }
        info!(
            "Sweep completed in {:.1} s, {} of {} points measured",
            elapsed.as_secs_f64(),
            total - log.failures(),
            total
        );
        (log, elapsed)
    }

    /// Retune, settle, measure; every outcome becomes a record
    fn measure_point<C: LineChannel, A: SpectrumInstrument>(
        &self,
        bench: &mut Bench<C, A>,
        frequency: f64,
    ) -> MeasurementRecord {
        let power = self.config.lo_power;

        match bench.oscillator.set_frequency(frequency) {
            Ok(SetOutcome::Confirmed) => {}
            Ok(SetOutcome::Unconfirmed) => {
                warn!("No acknowledgement for f {:.3}, assuming applied", frequency)
            }
            Ok(SetOutcome::Rejected { response }) => {
                return MeasurementRecord::failed(
                    frequency,
                    power,
                    format!("oscillator rejected frequency: {}", response),
                );
            }
            Err(e) => return MeasurementRecord::failed(frequency, power, e.to_string()),
        }

        thread::sleep(self.config.settling_duration());

        match bench.analyzer.measure_peak(
            frequency,
            self.config.span,
            self.config.points_per_measurement,
            self.config.averaging,
        ) {
            Ok(peak) => MeasurementRecord::measured(frequency, peak.power_dbm, power),
            Err(e) => MeasurementRecord::failed(frequency, power, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(SweepPhase::Disconnecting.to_string(), "disconnecting");
        assert_eq!(SweepPhase::Failed.to_string(), "failed");
    }

    #[test]
    fn test_invalid_config_fails_before_connecting() {
        struct Untouchable;

        impl InstrumentSet for Untouchable {
            type Channel = Box<dyn LineChannel>;
            type Analyzer = Box<dyn SpectrumInstrument>;

            fn connect_oscillator(
                &mut self,
            ) -> Result<OscillatorProxy<Self::Channel>, DeviceError> {
                panic!("oscillator touched")
            }

            fn connect_analyzer(
                &mut self,
            ) -> Result<SpectrumProxy<Self::Analyzer>, DeviceError> {
                panic!("analyzer touched")
            }
        }

        let mut runner = SweepRunner::new(SweepConfig {
            freq_step: 0.0,
            ..Default::default()
        });
        let mut phases = Vec::new();
        let result = runner.run(
            &mut Untouchable,
            &mut crate::record::MemorySink::default(),
            &mut |event: &SweepEvent| {
                if let SweepEvent::PhaseChanged { to, .. } = event {
                    phases.push(*to);
                }
            },
        );

        assert!(matches!(result, Err(SweepError::InvalidConfig(_))));
        assert_eq!(runner.phase(), SweepPhase::Failed);
        assert_eq!(phases, [SweepPhase::Failed]);
    }
}
