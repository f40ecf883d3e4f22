//! Terminal output for a running sweep

use std::path::Path;
use std::time::Duration;

use lo_sweep::{LogSummary, Progress, RunReport, SweepEvent, SweepObserver, SweepPhase};
use tracing::info;

const BANNER: &str = "============================================================";

/// Percentage between progress lines
const PROGRESS_STEP: f64 = 10.0;

/// Prints setup banners and periodic progress
#[derive(Debug, Default)]
pub struct ConsoleObserver {
    next_report: f64,
}

impl SweepObserver for ConsoleObserver {
    fn on_event(&mut self, event: &SweepEvent) {
        match event {
            SweepEvent::PhaseChanged {
                to: SweepPhase::Connecting,
                ..
            } => {
                println!("{}\nLO Power Sweep Measurement Setup\n{}", BANNER, BANNER);
            }
            SweepEvent::PhaseChanged {
                to: SweepPhase::Ready,
                ..
            } => {
                println!("Setup complete. Ready for measurements.");
            }
            SweepEvent::SweepStarted { total } => {
                self.next_report = PROGRESS_STEP;
                println!("Sweeping {} points", total);
            }
            SweepEvent::PointCompleted { progress, .. } => {
                if progress.percent() >= self.next_report || progress.completed == progress.total
                {
                    info!("{}", progress_line(progress));
                    self.next_report =
                        (progress.percent() / PROGRESS_STEP).floor() * PROGRESS_STEP + PROGRESS_STEP;
                }
            }
            SweepEvent::SweepFinished { elapsed, .. } => {
                println!("Sweep completed in {:.1} seconds", elapsed.as_secs_f64());
            }
            SweepEvent::PhaseChanged { .. } => {}
        }
    }
}

fn progress_line(progress: &Progress) -> String {
    let eta = progress
        .eta
        .map(format_duration)
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "Progress {:.0}% ({}/{}), {:.2} points/s, ETA {}",
        progress.percent(),
        progress.completed,
        progress.total,
        progress.rate,
        eta
    )
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Statistics block printed after a run is saved
pub fn summary_text(path: &Path, report: &RunReport) -> String {
    let mut text = format!("Results saved to: {}\n", path.display());
    let total = report.log.len();
    if total > 0 {
        text.push_str(&format!(
            "Average rate: {:.2} points/second\n",
            total as f64 / report.elapsed.as_secs_f64().max(f64::EPSILON)
        ));
    }
    match &report.summary {
        Some(summary) => text.push_str(&statistics(summary)),
        None => text.push_str(&format!("No valid measurements (0/{})\n", total)),
    }
    text
}

fn statistics(summary: &LogSummary) -> String {
    format!(
        "Measurement Statistics:\n  Valid measurements: {}/{}\n  Power range: {:.2} to {:.2} dBm\n  Mean power: {:.2} dBm\n  Std deviation: {:.2} dB\n",
        summary.valid,
        summary.total,
        summary.min_dbm,
        summary.max_dbm,
        summary.mean_dbm,
        summary.std_dev_db
    )
}

#[cfg(test)]
mod tests {
    use lo_sweep::{MeasurementLog, MeasurementRecord};

    use super::*;

    fn report(powers: &[Option<f64>]) -> RunReport {
        let mut log = MeasurementLog::new();
        for (i, power) in powers.iter().enumerate() {
            let freq = 900.0 + i as f64;
            log.push(match power {
                Some(p) => MeasurementRecord::measured(freq, *p, 5),
                None => MeasurementRecord::failed(freq, 5, "timeout"),
            });
        }
        let summary = log.summary();
        RunReport {
            log,
            elapsed: Duration::from_secs(2),
            summary,
        }
    }

    #[test]
    fn test_summary_text() {
        let text = summary_text(Path::new("out.csv"), &report(&[Some(-7.0), None, Some(-9.0)]));
        assert!(text.starts_with("Results saved to: out.csv\n"));
        assert!(text.contains("Average rate: 1.50 points/second"));
        assert!(text.contains("Valid measurements: 2/3"));
        assert!(text.contains("Power range: -9.00 to -7.00 dBm"));
        assert!(text.contains("Mean power: -8.00 dBm"));
    }

    #[test]
    fn test_summary_without_valid_points() {
        let text = summary_text(Path::new("out.csv"), &report(&[None, None]));
        assert!(text.contains("No valid measurements (0/2)"));
    }

    #[test]
    fn test_progress_line() {
        let progress = Progress {
            completed: 30,
            total: 301,
            elapsed: Duration::from_secs(15),
            rate: 2.0,
            eta: Some(Duration::from_secs(135)),
        };
        assert_eq!(
            progress_line(&progress),
            "Progress 10% (30/301), 2.00 points/s, ETA 2:15"
        );
    }

    #[test]
    fn test_progress_reported_in_steps() {
        let mut observer = ConsoleObserver::default();
        observer.on_event(&SweepEvent::SweepStarted { total: 20 });
        for completed in 1..=20 {
            let before = observer.next_report;
            observer.on_event(&SweepEvent::PointCompleted {
                index: completed - 1,
                total: 20,
                record: MeasurementRecord::measured(900.0, -7.0, 5),
                progress: Progress {
                    completed,
                    total: 20,
                    elapsed: Duration::from_secs(completed as u64),
                    rate: 1.0,
                    eta: None,
                },
            });
            // Every second point crosses a 10% boundary
            assert_eq!(observer.next_report > before, completed % 2 == 0);
        }
    }
}
