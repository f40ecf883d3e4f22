//! LO power sweep
//!
//! Steps an ADF4351 oscillator across a frequency range and records the
//! output level seen by a tinySA at every point, one CSV file per run.

mod cli;
mod console;
mod error;
mod export;
mod ports;
mod settings;

use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use lo_devices::{InstrumentSet, SerialInstruments};
use lo_sim::VirtualBench;
use lo_sweep::{SweepError, SweepRunner};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use console::ConsoleObserver;
use error::CliError;
use export::CsvSink;
use settings::RunSettings;

const CRATES: [&str; 5] = ["lo_power_sweep", "lo_protocol", "lo_devices", "lo_sim", "lo_sweep"];

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let interrupt = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(&interrupt);

    match run(&cli, &interrupt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Sweep(SweepError::Interrupted)) => {
            warn!("Measurement interrupted by user");
            eprintln!("\nMeasurement interrupted by user");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("\nERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// `--log-level` wins over `RUST_LOG`; without either our crates log at info
fn init_logging(level: Option<&str>) {
    let filter_for = |level: &str| {
        CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, level))
            .collect::<Vec<_>>()
            .join(",")
    };

    let filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::try_new(filter_for(level))
            .unwrap_or_else(|_| filter_for("info").into()),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| filter_for("info").into()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// First Ctrl-C stops the sweep after the current point; a second one exits
fn install_interrupt_handler(interrupt: &Arc<AtomicBool>) {
    let flag = Arc::clone(interrupt);
    let installed = ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            std::process::exit(1);
        }
        eprintln!("\nInterrupt received, stopping after the current point");
    });
    if let Err(e) = installed {
        warn!("Could not install Ctrl-C handler: {}", e);
    }
}

fn run(cli: &Cli, interrupt: &Arc<AtomicBool>) -> Result<(), CliError> {
    if cli.list_ports {
        return ports::list_ports();
    }

    let mut settings = RunSettings::load(cli.config.as_deref())?;
    cli.apply(&mut settings);
    let powers = cli.power_levels(&settings);

    if cli.simulate {
        info!("Running against the virtual bench");
        let mut bench = VirtualBench::new(settings.simulation.clone());
        sweep_each(&mut bench, &settings, &powers, cli.output.as_deref(), interrupt)
    } else {
        let mut instruments =
            SerialInstruments::new(&settings.arduino_port, &settings.tinysa_port);
        sweep_each(
            &mut instruments,
            &settings,
            &powers,
            cli.output.as_deref(),
            interrupt,
        )
    }
}

/// One full sweep per power level, each saved to its own file
fn sweep_each<S: InstrumentSet>(
    instruments: &mut S,
    settings: &RunSettings,
    powers: &[i32],
    output: Option<&Path>,
    interrupt: &Arc<AtomicBool>,
) -> Result<(), CliError> {
    let multiple = powers.len() > 1;
    if multiple {
        println!("Dual power measurement mode");
    }

    for &power in powers {
        let mut config = settings.to_sweep_config();
        config.lo_power = power;
        if multiple {
            println!("\n{}\nMeasurement at {:+} dBm\n{}\n", "=".repeat(60), power, "=".repeat(60));
        }

        let path = export::output_path(settings, output, power, multiple, &Local::now())?;
        let mut sink = CsvSink::new(&path);
        let report = SweepRunner::new(config)
            .with_interrupt(Arc::clone(interrupt))
            .run(instruments, &mut sink, &mut ConsoleObserver::default())?;
        print!("\n{}", console::summary_text(sink.path(), &report));
    }

    println!("\nAll measurements complete!");
    Ok(())
}
