//! Events reported by the sweep runner
//!
//! The runner calls its observer synchronously, in order, from the sweep
//! thread. Observers must not block for long; a slow observer delays the
//! next point.

use std::time::Duration;

use crate::engine::SweepPhase;
use crate::progress::Progress;
use crate::record::{LogSummary, MeasurementRecord};

/// Sweep activity
#[derive(Debug, Clone, PartialEq)]
pub enum SweepEvent {
    /// The runner moved to a new phase
    PhaseChanged { from: SweepPhase, to: SweepPhase },

    /// Points planned; the loop is about to start
    SweepStarted { total: usize },

    /// One point finished, successfully or not
    PointCompleted {
        /// Zero-based position in the plan
        index: usize,
        total: usize,
        record: MeasurementRecord,
        progress: Progress,
    },

    /// Every point has a record
    SweepFinished {
        elapsed: Duration,
        /// `None` when no point produced a power value
        summary: Option<LogSummary>,
    },
}

/// Receiver of sweep events
pub trait SweepObserver {
    fn on_event(&mut self, event: &SweepEvent);
}

impl<F: FnMut(&SweepEvent)> SweepObserver for F {
    fn on_event(&mut self, event: &SweepEvent) {
        self(event)
    }
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SweepObserver for NoopObserver {
    fn on_event(&mut self, _event: &SweepEvent) {}
}
