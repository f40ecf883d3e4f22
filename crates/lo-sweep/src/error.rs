//! Error types for the sweep

use lo_devices::DeviceError;
use thiserror::Error;

/// Errors that end a sweep run
///
/// Per-point failures never appear here; they become error records.
#[derive(Debug, Error)]
pub enum SweepError {
    /// Config rejected before any hardware was touched
    #[error("invalid sweep config: {0}")]
    InvalidConfig(String),

    /// Connecting or configuring an instrument failed
    #[error("setup failed on {device}: {source}")]
    Setup {
        device: &'static str,
        #[source]
        source: DeviceError,
    },

    /// Writing the log failed; instruments were already released
    #[error("failed to save measurements: {0}")]
    Save(#[from] std::io::Error),

    /// Stopped between points; instruments released, nothing saved
    #[error("measurement interrupted by user")]
    Interrupted,
}

impl SweepError {
    pub(crate) fn setup(device: &'static str) -> impl FnOnce(DeviceError) -> Self {
        move |source| Self::Setup { device, source }
    }
}
