//! Sweep progress accounting

use std::time::{Duration, Instant};

/// Snapshot after a point completes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
    /// Points per second so far
    pub rate: f64,
    /// Estimated time to finish; `None` before the rate is known
    pub eta: Option<Duration>,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 * 100.0 / self.total as f64
    }
}

/// Tracks elapsed time and throughput over a run
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started: Instant,
    total: usize,
    completed: usize,
}

impl ProgressTracker {
    pub fn start(total: usize) -> Self {
        Self::start_at(total, Instant::now())
    }

    pub fn start_at(total: usize, now: Instant) -> Self {
        Self {
            started: now,
            total,
            completed: 0,
        }
    }

    /// Count one more point done
    pub fn advance(&mut self, now: Instant) -> Progress {
        self.completed = (self.completed + 1).min(self.total);
        self.snapshot(now)
    }

    pub fn snapshot(&self, now: Instant) -> Progress {
        let elapsed = now.saturating_duration_since(self.started);
        let seconds = elapsed.as_secs_f64();
        let rate = if seconds > 0.0 {
            self.completed as f64 / seconds
        } else {
            0.0
        };
        let remaining = self.total - self.completed;
        let eta = if remaining == 0 {
            Some(Duration::ZERO)
        } else if rate > 0.0 {
            Duration::try_from_secs_f64(remaining as f64 / rate).ok()
        } else {
            None
        };

        Progress {
            completed: self.completed,
            total: self.total,
            elapsed,
            rate,
            eta,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_and_eta() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::start_at(10, start);

        tracker.advance(start + Duration::from_secs(1));
        let progress = tracker.advance(start + Duration::from_secs(2));

        assert_eq!(progress.completed, 2);
        assert!((progress.rate - 1.0).abs() < 1e-9);
        assert_eq!(progress.eta, Some(Duration::from_secs(8)));
        assert!((progress.percent() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_eta_unknown_without_elapsed_time() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::start_at(3, start);
        let progress = tracker.advance(start);
        assert_eq!(progress.eta, None);
        assert_eq!(progress.rate, 0.0);
    }

    #[test]
    fn test_completion_saturates() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::start_at(1, start);
        tracker.advance(start + Duration::from_millis(10));
        let progress = tracker.advance(start + Duration::from_millis(20));
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.eta, Some(Duration::ZERO));
    }
}
