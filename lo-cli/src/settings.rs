//! Run settings

use std::path::{Path, PathBuf};

use lo_sim::SimConfig;
use lo_sweep::SweepConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CliError;

/// Everything one invocation needs, loaded from JSON and overridden by flags
///
/// The sweep parameters sit at the top level of the file next to the port
/// names, so a settings file reads as one flat option set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunSettings {
    /// Serial port of the Arduino driving the oscillator
    pub arduino_port: String,
    /// Serial port of the tinySA, or `auto`
    pub tinysa_port: String,
    #[serde(flatten)]
    pub sweep: SweepConfig,
    /// Directory for generated CSV files
    pub output_dir: PathBuf,
    /// strftime pattern used in generated file names
    pub timestamp_format: String,
    /// Virtual bench used by `--simulate`
    pub simulation: SimConfig,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            arduino_port: "/dev/ttyUSB0".to_string(),
            tinysa_port: lo_devices::AUTO_PORT.to_string(),
            sweep: SweepConfig::default(),
            output_dir: PathBuf::from("results"),
            timestamp_format: "%Y%m%d_%H%M%S".to_string(),
            simulation: SimConfig::default(),
        }
    }
}

impl RunSettings {
    /// Get the XDG config directory for lo-sweep
    /// Uses $XDG_CONFIG_HOME/lo-sweep on Linux/macOS, falls back to ~/.config/lo-sweep
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("lo-sweep"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("lo-sweep"))
    }

    /// Default settings file location
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load from an explicit file, or from the default location
    ///
    /// An explicit file must exist. A missing default file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CliError> {
        if let Some(path) = explicit {
            return Self::read(path);
        }

        match Self::settings_path() {
            Some(path) if path.is_file() => Self::read(&path),
            Some(path) => {
                debug!("No settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    fn read(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadSettings {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::parse(&text).map_err(|source| CliError::ParseSettings {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Parse settings JSON; absent keys keep their defaults
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_sweep_config(&self) -> SweepConfig {
        self.sweep.clone()
    }
}

#[cfg(test)]
mod tests {
    use lo_protocol::AutoValue;

    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RunSettings::default();
        assert_eq!(settings.arduino_port, "/dev/ttyUSB0");
        assert_eq!(settings.tinysa_port, "auto");
        assert_eq!(settings.output_dir, PathBuf::from("results"));
        assert_eq!(settings.timestamp_format, "%Y%m%d_%H%M%S");

        let sweep = settings.to_sweep_config();
        assert_eq!((sweep.freq_start, sweep.freq_stop, sweep.freq_step), (900.0, 960.0, 0.2));
        assert_eq!(sweep.lo_power, 5);
        assert_eq!(sweep.averaging, 4);
        assert_eq!(sweep.rbw, AutoValue::Auto);
    }

    #[test]
    fn test_flat_file_overrides_selected_keys() {
        let settings = RunSettings::parse(
            r#"{
                "arduino_port": "COM4",
                "freq_start": 850.0,
                "lo_power": -4,
                "rbw": 30,
                "attenuation": "auto",
                "output_dir": "/tmp/sweeps"
            }"#,
        )
        .unwrap();

        assert_eq!(settings.arduino_port, "COM4");
        assert_eq!(settings.tinysa_port, "auto");
        assert_eq!(settings.sweep.freq_start, 850.0);
        assert_eq!(settings.sweep.freq_stop, 960.0);
        assert_eq!(settings.sweep.lo_power, -4);
        assert_eq!(settings.sweep.rbw, AutoValue::Fixed(30));
        assert_eq!(settings.sweep.attenuation, AutoValue::Auto);
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/sweeps"));
    }

    #[test]
    fn test_round_trip_keeps_flat_layout() {
        let json = serde_json::to_value(RunSettings::default()).unwrap();
        assert_eq!(json["freq_step"], 0.2);
        assert_eq!(json["rbw"], "auto");
        assert!(json.get("sweep").is_none());
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(RunSettings::parse(r#"{"rbw": "wide"}"#).is_err());
        assert!(RunSettings::parse(r#"{"lo_power": "high"}"#).is_err());
    }

    #[test]
    fn test_explicit_file() {
        let path = std::env::temp_dir().join(format!("lo-sweep-settings-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"span": 2.5, "simulation": {"path": {"loss_db": 3.0}}}"#).unwrap();

        let settings = RunSettings::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.sweep.span, 2.5);
        assert_eq!(settings.simulation.path.loss_db, 3.0);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("lo-sweep-settings-does-not-exist.json");
        assert!(matches!(
            RunSettings::load(Some(&path)),
            Err(CliError::ReadSettings { .. })
        ));
    }
}
