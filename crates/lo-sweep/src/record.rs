//! Measurement records and the run log

use std::io;

use chrono::{DateTime, Local};

/// Outcome of one planned point
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub timestamp: DateTime<Local>,
    /// Planned oscillator frequency in MHz
    pub frequency_mhz: f64,
    /// Peak level in dBm; `None` when the point failed
    pub power_dbm: Option<f64>,
    /// Oscillator power setting for the run
    pub lo_power_setting: i32,
    pub error: Option<String>,
}

impl MeasurementRecord {
    /// Successful measurement
    pub fn measured(frequency_mhz: f64, power_dbm: f64, lo_power_setting: i32) -> Self {
        Self {
            timestamp: Local::now(),
            frequency_mhz,
            power_dbm: Some(power_dbm),
            lo_power_setting,
            error: None,
        }
    }

    /// Failed point; power is missing
    pub fn failed(frequency_mhz: f64, lo_power_setting: i32, error: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            frequency_mhz,
            power_dbm: None,
            lo_power_setting,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.power_dbm.is_some()
    }
}

/// Statistics over the valid powers of a log
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogSummary {
    /// Records with a power value
    pub valid: usize,
    pub total: usize,
    pub min_dbm: f64,
    pub max_dbm: f64,
    pub mean_dbm: f64,
    /// Sample standard deviation; zero with fewer than two values
    pub std_dev_db: f64,
}

/// Ordered records of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementLog {
    records: Vec<MeasurementRecord>,
}

impl MeasurementLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: MeasurementRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records carrying an error
    pub fn failures(&self) -> usize {
        self.records.iter().filter(|r| !r.is_success()).count()
    }

    /// Summary statistics; `None` when no record has a power value
    pub fn summary(&self) -> Option<LogSummary> {
        let powers: Vec<f64> = self.records.iter().filter_map(|r| r.power_dbm).collect();
        let first = *powers.first()?;

        let n = powers.len() as f64;
        let mean = powers.iter().sum::<f64>() / n;
        let std_dev = if powers.len() > 1 {
            let variance = powers.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        } else {
            0.0
        };

        Some(LogSummary {
            valid: powers.len(),
            total: self.records.len(),
            min_dbm: powers.iter().copied().fold(first, f64::min),
            max_dbm: powers.iter().copied().fold(first, f64::max),
            mean_dbm: mean,
            std_dev_db: std_dev,
        })
    }
}

impl<'a> IntoIterator for &'a MeasurementLog {
    type Item = &'a MeasurementRecord;
    type IntoIter = std::slice::Iter<'a, MeasurementRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Destination for a finished log
pub trait MeasurementSink {
    /// Persist the whole log in order
    fn save(&mut self, log: &MeasurementLog) -> io::Result<()>;
}

/// Sink that keeps a copy in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub saved: Vec<MeasurementLog>,
}

impl MeasurementSink for MemorySink {
    fn save(&mut self, log: &MeasurementLog) -> io::Result<()> {
        self.saved.push(log.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(powers: &[Option<f64>]) -> MeasurementLog {
        let mut log = MeasurementLog::new();
        for (i, power) in powers.iter().enumerate() {
            let freq = 900.0 + i as f64;
            log.push(match power {
                Some(p) => MeasurementRecord::measured(freq, *p, 5),
                None => MeasurementRecord::failed(freq, 5, "ERR"),
            });
        }
        log
    }

    #[test]
    fn test_summary_ignores_missing_powers() {
        let summary = log(&[Some(-10.0), None, Some(-14.0), Some(-12.0)])
            .summary()
            .unwrap();
        assert_eq!(summary.valid, 3);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.min_dbm, -14.0);
        assert_eq!(summary.max_dbm, -10.0);
        assert!((summary.mean_dbm + 12.0).abs() < 1e-12);
        assert!((summary.std_dev_db - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_summary_edge_cases() {
        assert!(log(&[None, None]).summary().is_none());
        assert!(MeasurementLog::new().summary().is_none());

        let single = log(&[Some(-7.5)]).summary().unwrap();
        assert_eq!(single.std_dev_db, 0.0);
        assert_eq!(single.mean_dbm, -7.5);
    }

    #[test]
    fn test_failures_counted() {
        let log = log(&[Some(-1.0), None, None]);
        assert_eq!(log.failures(), 2);
        assert_eq!(log.records()[1].error.as_deref(), Some("ERR"));
        assert_eq!((&log).into_iter().count(), 3);
    }
}
