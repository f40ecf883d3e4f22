//! CSV export of measurement logs

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use lo_sweep::{MeasurementLog, MeasurementRecord, MeasurementSink};
use tracing::info;

use crate::error::CliError;
use crate::settings::RunSettings;

pub const CSV_HEADER: &str = "timestamp,frequency_mhz,power_dbm,lo_power_setting,error";

/// Writes a log to one CSV file, creating parent directories
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MeasurementSink for CsvSink {
    fn save(&mut self, log: &MeasurementLog) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(&self.path)?);
        write_csv(log, &mut writer)?;
        writer.flush()?;
        info!("Results saved to {}", self.path.display());
        Ok(())
    }
}

/// Header plus one row per record, in log order
pub fn write_csv<W: Write>(log: &MeasurementLog, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for record in log {
        writeln!(writer, "{}", format_row(record))?;
    }
    Ok(())
}

fn format_row(record: &MeasurementRecord) -> String {
    let power = record
        .power_dbm
        .map(|p| p.to_string())
        .unwrap_or_default();
    let error = record.error.as_deref().map(quote).unwrap_or_default();
    format!(
        "{},{},{},{},{}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
        record.frequency_mhz,
        power,
        record.lo_power_setting,
        error
    )
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Format `now` with a user supplied strftime pattern
pub fn format_timestamp(now: &DateTime<Local>, pattern: &str) -> Result<String, CliError> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(CliError::InvalidArgument(format!(
            "bad timestamp format {:?}",
            pattern
        )));
    }
    Ok(now.format_with_items(items.iter()).to_string())
}

/// `lo_power_sweep_<timestamp>_<power>dBm.csv`
pub fn default_file_name(timestamp: &str, power: i32) -> String {
    format!("lo_power_sweep_{}_{:+}dBm.csv", timestamp, power)
}

/// `run.csv` becomes `run_+5dBm.csv`
pub fn with_power_suffix(path: &Path, power: i32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{:+}dBm.{}", stem, power, ext.to_string_lossy()),
        None => format!("{}_{:+}dBm", stem, power),
    };
    path.with_file_name(name)
}

/// Where one run's CSV goes
///
/// An explicit path is used as given, with the power inserted when several
/// power levels share it. Otherwise a timestamped name is generated in the
/// configured output directory.
pub fn output_path(
    settings: &RunSettings,
    explicit: Option<&Path>,
    power: i32,
    multiple_powers: bool,
    now: &DateTime<Local>,
) -> Result<PathBuf, CliError> {
    match explicit {
        Some(path) if multiple_powers => Ok(with_power_suffix(path, power)),
        Some(path) => Ok(path.to_path_buf()),
        None => {
            let timestamp = format_timestamp(now, &settings.timestamp_format)?;
            Ok(settings
                .output_dir
                .join(default_file_name(&timestamp, power)))
        }
    }
}
