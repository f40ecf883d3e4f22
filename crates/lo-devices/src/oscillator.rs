//! ADF4351 oscillator proxy
//!
//! Owns the channel to the Arduino running the oscillator firmware and keeps
//! a last-known-good cache of frequency and power.

use std::thread;
use std::time::Duration;

use lo_protocol::{FramingConfig, OscillatorCommand, Response, SetOutcome, StatusReport};
use tracing::{debug, info, warn};

use crate::channel::LineChannel;
use crate::codec::CommandCodec;
use crate::error::DeviceError;

/// Baud rate of the oscillator firmware
pub const DEFAULT_OSCILLATOR_BAUD: u32 = 115_200;

const DEVICE: &str = "oscillator";

/// Timing used when connecting and talking to the oscillator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OscillatorConfig {
    /// Wait after opening; the Arduino resets when the port opens
    pub reset_delay: Duration,
    /// Wait before discarding boot chatter
    pub flush_delay: Duration,
    /// Reply framing
    pub framing: FramingConfig,
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        Self {
            reset_delay: Duration::from_secs(2),
            flush_delay: Duration::from_millis(100),
            framing: FramingConfig::default(),
        }
    }
}

impl OscillatorConfig {
    /// No connect delays, for devices that do not reset on open
    pub fn immediate() -> Self {
        Self {
            reset_delay: Duration::ZERO,
            flush_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Last-known-good oscillator settings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeviceState {
    pub frequency_mhz: Option<f64>,
    pub power_dbm: Option<i32>,
}

impl DeviceState {
    fn absorb(&mut self, report: &StatusReport) {
        if let Some(frequency) = report.frequency_mhz {
            self.frequency_mhz = Some(frequency);
        }
        if let Some(power) = report.power_dbm {
            self.power_dbm = Some(power);
        }
    }
}

/// Connected oscillator
///
/// The channel is `None` once disconnected; every operation that needs the
/// wire then fails with [`DeviceError::NotConnected`].
pub struct OscillatorProxy<C: LineChannel> {
    channel: Option<C>,
    codec: CommandCodec,
    state: DeviceState,
}

impl<C: LineChannel> OscillatorProxy<C> {
    /// Take an opened channel, let the board boot and seed the cache
    pub fn connect(mut channel: C, config: OscillatorConfig) -> Result<Self, DeviceError> {
        debug!("Waiting {:?} for oscillator reset", config.reset_delay);
        thread::sleep(config.reset_delay);
        thread::sleep(config.flush_delay);
        channel.clear_input()?;

        let mut proxy = Self {
            channel: Some(channel),
            codec: CommandCodec::new(config.framing),
            state: DeviceState::default(),
        };

        let report = proxy.refresh_status()?;
        if report.is_empty() {
            warn!("Oscillator status reply had no frequency or power");
        }
        info!(
            "Oscillator connected: {} MHz, {} dBm",
            display_opt(proxy.state.frequency_mhz),
            display_opt(proxy.state.power_dbm)
        );
        Ok(proxy)
    }

    /// Returns whether the channel is still held
    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Drop the channel; calling again is a no-op
    pub fn disconnect(&mut self) {
        if self.channel.take().is_some() {
            info!("Oscillator disconnected");
        }
    }

    /// Send a raw command and return its reply
    pub fn send(&mut self, command: &OscillatorCommand) -> Result<Response, DeviceError> {
        let channel = self.channel.as_mut().ok_or(DeviceError::NotConnected(DEVICE))?;
        self.codec.send(channel, command)
    }

    /// Query status and fold any parsed fields into the cache
    pub fn refresh_status(&mut self) -> Result<StatusReport, DeviceError> {
        let response = self.send(&OscillatorCommand::Status)?;
        let report = StatusReport::parse(&response);
        self.state.absorb(&report);
        Ok(report)
    }

    /// Program the output frequency in MHz
    pub fn set_frequency(&mut self, mhz: f64) -> Result<SetOutcome, DeviceError> {
        let outcome = self.apply(OscillatorCommand::SetFrequency { mhz })?;
        if outcome.is_accepted() {
            self.state.frequency_mhz = Some(mhz);
        }
        Ok(outcome)
    }

    /// Select the output power in dBm
    pub fn set_power(&mut self, dbm: i32) -> Result<SetOutcome, DeviceError> {
        let outcome = self.apply(OscillatorCommand::SetPower { dbm })?;
        if outcome.is_accepted() {
            self.state.power_dbm = Some(dbm);
        }
        Ok(outcome)
    }

    /// Jump to the start of the current band; returns false on `ERR`
    pub fn reset_to_band_start(&mut self) -> Result<bool, DeviceError> {
        self.band_command(OscillatorCommand::ResetBand)
    }

    /// Switch between band A and B; returns false on `ERR`
    pub fn toggle_band(&mut self) -> Result<bool, DeviceError> {
        self.band_command(OscillatorCommand::ToggleBand)
    }

    /// Cached frequency, without touching the wire
    pub fn get_frequency(&self) -> Option<f64> {
        self.state.frequency_mhz
    }

    /// Cached power, without touching the wire
    pub fn get_power(&self) -> Option<i32> {
        self.state.power_dbm
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Underlying channel, if still connected
    pub fn channel(&self) -> Option<&C> {
        self.channel.as_ref()
    }

    fn apply(&mut self, command: OscillatorCommand) -> Result<SetOutcome, DeviceError> {
        let response = self.send(&command)?;
        let outcome = SetOutcome::classify(&response, command.ack_tokens());
        match &outcome {
            SetOutcome::Confirmed => debug!("{} confirmed", command),
            SetOutcome::Unconfirmed => debug!("{} not acknowledged", command),
            SetOutcome::Rejected { response } => warn!("{} rejected: {}", command, response),
        }
        Ok(outcome)
    }

    fn band_command(&mut self, command: OscillatorCommand) -> Result<bool, DeviceError> {
        let response = self.send(&command)?;
        let ok = !response.contains(lo_protocol::oscillator::ERROR_TOKEN);
        if !ok {
            warn!("{} rejected: {}", command, response);
        }
        // The firmware picks the new frequency itself
        self.refresh_status()?;
        Ok(ok)
    }
}

fn display_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "?".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedChannel;

    fn fast_config() -> OscillatorConfig {
        OscillatorConfig {
            framing: FramingConfig {
                timeout: Duration::from_millis(30),
                quiescence: Duration::from_millis(3),
                poll_interval: Duration::from_millis(1),
            },
            ..OscillatorConfig::immediate()
        }
    }

    fn connected(script: &[&[u8]]) -> OscillatorProxy<ScriptedChannel> {
        let mut channel = ScriptedChannel::new();
        channel.preload(b"ADF4351 boot banner\n");
        channel.reply(b"Freq: 900.000 MHz\nPower: +2 dBm\n");
        for reply in script {
            channel.reply(reply);
        }
        OscillatorProxy::connect(channel, fast_config()).unwrap()
    }

    #[test]
    fn test_connect_seeds_cache_and_flushes_boot_text() {
        let proxy = connected(&[]);
        assert_eq!(proxy.get_frequency(), Some(900.0));
        assert_eq!(proxy.get_power(), Some(2));

        let channel = proxy.channel().unwrap();
        assert_eq!(channel.clears(), 1);
        assert_eq!(channel.written(), [b"s\n".to_vec()]);
    }

    #[test]
    fn test_set_frequency_confirmed() {
        let mut proxy = connected(&[b"925.000 MHz\n"]);
        let outcome = proxy.set_frequency(925.0).unwrap();
        assert_eq!(outcome, SetOutcome::Confirmed);
        assert_eq!(proxy.get_frequency(), Some(925.0));
        assert_eq!(proxy.channel().unwrap().written()[1], b"f 925.000\n");
    }

    #[test]
    fn test_set_frequency_rejected_keeps_cache() {
        let mut proxy = connected(&[b"ERR: out of range\n"]);
        let outcome = proxy.set_frequency(5000.0).unwrap();
        assert!(!outcome.is_accepted());
        assert_eq!(proxy.get_frequency(), Some(900.0));
    }

    #[test]
    fn test_set_frequency_unconfirmed_updates_cache() {
        let mut proxy = connected(&[b""]);
        let outcome = proxy.set_frequency(910.5).unwrap();
        assert_eq!(outcome, SetOutcome::Unconfirmed);
        assert_eq!(proxy.get_frequency(), Some(910.5));
    }

    #[test]
    fn test_set_power_confirmed() {
        let mut proxy = connected(&[b"Power: +5 dBm\n"]);
        assert_eq!(proxy.set_power(5).unwrap(), SetOutcome::Confirmed);
        assert_eq!(proxy.get_power(), Some(5));
        assert_eq!(proxy.channel().unwrap().written()[1], b"p +5\n");
    }

    #[test]
    fn test_toggle_band_resyncs_cache() {
        let mut proxy = connected(&[b"Band B\n", b"Freq: 2400.000 MHz\nPower: +2 dBm\n"]);
        assert!(proxy.toggle_band().unwrap());
        assert_eq!(proxy.get_frequency(), Some(2400.0));
    }

    #[test]
    fn test_reset_band_error_reported() {
        let mut proxy = connected(&[b"ERR\n", b"Freq: 900.000 MHz\n"]);
        assert!(!proxy.reset_to_band_start().unwrap());
    }

    #[test]
    fn test_garbled_status_keeps_previous_cache() {
        let mut proxy = connected(&[b"Freq: ??? MHz\n"]);
        let report = proxy.refresh_status().unwrap();
        assert!(report.is_empty());
        assert_eq!(proxy.get_frequency(), Some(900.0));
    }

    #[test]
    fn test_disconnected_operations_fail() {
        let mut proxy = connected(&[]);
        proxy.disconnect();
        proxy.disconnect();
        assert!(!proxy.is_connected());
        assert!(matches!(
            proxy.set_frequency(901.0),
            Err(DeviceError::NotConnected("oscillator"))
        ));
        // Cache reads still work
        assert_eq!(proxy.get_frequency(), Some(900.0));
    }

    #[test]
    fn test_io_failure_is_connection_error() {
        let mut proxy = connected(&[]);
        if let Some(channel) = proxy.channel.as_mut() {
            channel.fail_writes();
        }
        let err = proxy.set_power(5).unwrap_err();
        assert_eq!(err.class(), crate::FailureClass::Connection);
    }
}
