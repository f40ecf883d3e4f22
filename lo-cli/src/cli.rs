use std::path::PathBuf;

use clap::Parser;
use lo_protocol::{AutoValue, AveragingMode};

use crate::settings::RunSettings;

#[derive(Parser, Debug)]
#[clap(
    name = "lo-power-sweep",
    version,
    about = "Measure ADF4351 LO output power across a frequency range with a tinySA",
    after_help = "Examples:\n  lo-power-sweep --list-ports\n  lo-power-sweep --arduino /dev/ttyUSB0 --tinysa auto\n  lo-power-sweep --freq-start 900 --freq-stop 960 --freq-step 0.1\n  lo-power-sweep --dual-power +5 -4 --simulate"
)]
pub struct Cli {
    /// Arduino serial port
    #[clap(long)]
    pub arduino: Option<String>,

    /// tinySA serial port (or "auto")
    #[clap(long)]
    pub tinysa: Option<String>,

    /// List serial ports and exit
    #[clap(long, action)]
    pub list_ports: bool,

    /// Start frequency (MHz)
    #[clap(long)]
    pub freq_start: Option<f64>,

    /// Stop frequency (MHz)
    #[clap(long)]
    pub freq_stop: Option<f64>,

    /// Frequency step (MHz)
    #[clap(long)]
    pub freq_step: Option<f64>,

    /// LO output power (dBm)
    #[clap(long, allow_negative_numbers = true)]
    pub power: Option<i32>,

    /// Run one sweep per power level, each saved to its own file
    #[clap(
        long,
        num_args = 2,
        value_names = ["P1", "P2"],
        allow_negative_numbers = true,
        conflicts_with = "power"
    )]
    pub dual_power: Option<Vec<i32>>,

    /// Settling time after each frequency change (seconds)
    #[clap(long)]
    pub settling_time: Option<f64>,

    /// Measurement span (MHz)
    #[clap(long)]
    pub span: Option<f64>,

    /// Number of averages: 1, 4 or 16
    #[clap(long, value_parser = parse_averaging)]
    pub averaging: Option<u32>,

    /// Resolution bandwidth (kHz or "auto")
    #[clap(long)]
    pub rbw: Option<AutoValue>,

    /// Input attenuation (dB or "auto")
    #[clap(long)]
    pub attenuation: Option<AutoValue>,

    /// Output file path
    #[clap(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Output directory for generated file names
    #[clap(long)]
    pub output_dir: Option<PathBuf>,

    /// Settings file (JSON)
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Run against simulated instruments
    #[clap(long, action)]
    pub simulate: bool,

    /// Log level for this program's crates (overrides RUST_LOG)
    #[clap(long)]
    pub log_level: Option<String>,
}

fn parse_averaging(value: &str) -> Result<u32, String> {
    let count: u32 = value
        .parse()
        .map_err(|_| format!("{:?} is not a number", value))?;
    if AveragingMode::is_supported_count(count) {
        Ok(count)
    } else {
        Err(format!("{} is not one of 1, 4, 16", count))
    }
}

impl Cli {
    /// Apply every flag that was given on top of loaded settings
    pub fn apply(&self, settings: &mut RunSettings) {
        if let Some(port) = &self.arduino {
            settings.arduino_port = port.clone();
        }
        if let Some(port) = &self.tinysa {
            settings.tinysa_port = port.clone();
        }

        let sweep = &mut settings.sweep;
        if let Some(start) = self.freq_start {
            sweep.freq_start = start;
        }
        if let Some(stop) = self.freq_stop {
            sweep.freq_stop = stop;
        }
        if let Some(step) = self.freq_step {
            sweep.freq_step = step;
        }
        if let Some(power) = self.power {
            sweep.lo_power = power;
        }
        if let Some(settling) = self.settling_time {
            sweep.settling_time = settling;
        }
        if let Some(span) = self.span {
            sweep.span = span;
        }
        if let Some(averaging) = self.averaging {
            sweep.averaging = averaging;
        }
        if let Some(rbw) = self.rbw {
            sweep.rbw = rbw;
        }
        if let Some(attenuation) = self.attenuation {
            sweep.attenuation = attenuation;
        }

        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
    }

    /// Power levels to sweep, one run each
    pub fn power_levels(&self, settings: &RunSettings) -> Vec<i32> {
        match &self.dual_power {
            Some(levels) => levels.clone(),
            None => vec![settings.sweep.lo_power],
        }
    }
}
