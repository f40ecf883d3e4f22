//! Errors reported by the command line front end

use std::io;
use std::path::PathBuf;

use lo_devices::DeviceError;
use lo_sweep::SweepError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read settings from {path}: {source}")]
    ReadSettings {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid settings in {path}: {source}")]
    ParseSettings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("port listing failed: {0}")]
    Ports(#[from] DeviceError),

    #[error(transparent)]
    Sweep(#[from] SweepError),
}
