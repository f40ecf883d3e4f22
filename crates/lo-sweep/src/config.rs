//! Sweep configuration

use std::time::Duration;

use lo_devices::DEFAULT_MEASUREMENT_POINTS;
use lo_protocol::AutoValue;
use serde::{Deserialize, Serialize};

use crate::error::SweepError;

/// Upper bound on planned points; guards against a typo in the step size
pub const MAX_POINTS: usize = 1_000_000;

/// Parameters of one sweep, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// First frequency in MHz
    pub freq_start: f64,
    /// Last frequency in MHz, inclusive
    pub freq_stop: f64,
    /// Step in MHz
    pub freq_step: f64,
    /// Oscillator output power in dBm
    pub lo_power: i32,
    /// Seconds to wait after retuning before measuring
    pub settling_time: f64,
    /// Peak search window in MHz
    pub span: f64,
    /// Acquisitions averaged by the analyzer: 1, 4 or 16
    pub averaging: u32,
    /// Resolution bandwidth in kHz
    pub rbw: AutoValue,
    /// Input attenuation in dB
    pub attenuation: AutoValue,
    /// Discrete positions per peak measurement
    pub points_per_measurement: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            freq_start: 900.0,
            freq_stop: 960.0,
            freq_step: 0.2,
            lo_power: 5,
            settling_time: 0.1,
            span: 1.0,
            averaging: 4,
            rbw: AutoValue::Auto,
            attenuation: AutoValue::Auto,
            points_per_measurement: DEFAULT_MEASUREMENT_POINTS,
        }
    }
}

impl SweepConfig {
    /// Check the config before any hardware is touched
    pub fn validate(&self) -> Result<(), SweepError> {
        let finite = [
            ("freq_start", self.freq_start),
            ("freq_stop", self.freq_stop),
            ("freq_step", self.freq_step),
            ("settling_time", self.settling_time),
            ("span", self.span),
        ];
        if let Some((name, _)) = finite.iter().find(|(_, value)| !value.is_finite()) {
            return Err(invalid(format!("{} must be a finite number", name)));
        }

        if self.freq_step <= 0.0 {
            return Err(invalid(format!(
                "step must be positive, got {} MHz",
                self.freq_step
            )));
        }
        if self.freq_stop < self.freq_start {
            return Err(invalid(format!(
                "stop {} MHz is below start {} MHz",
                self.freq_stop, self.freq_start
            )));
        }
        if self.span <= 0.0 {
            return Err(invalid(format!("span must be positive, got {} MHz", self.span)));
        }
        if self.settling_time < 0.0 {
            return Err(invalid("settling time cannot be negative".to_string()));
        }
        if self.points_per_measurement == 0 {
            return Err(invalid("points per measurement must be at least 1".to_string()));
        }

        let count = ((self.freq_stop - self.freq_start) / self.freq_step).floor() + 1.0;
        if count > MAX_POINTS as f64 {
            return Err(invalid(format!(
                "{} points exceeds the limit of {}",
                count, MAX_POINTS
            )));
        }
        Ok(())
    }

    /// Settling time as a duration; zero if unset or invalid
    pub fn settling_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.settling_time).unwrap_or_default()
    }
}

fn invalid(reason: String) -> SweepError {
    SweepError::InvalidConfig(reason)
}
